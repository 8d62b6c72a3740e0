//! # Efficient Frontier
//!
//! $$
//! \max_{w}\frac{\mu^\top w-r_f}{\sqrt{w^\top\Sigma w}}
//! \;\Longleftrightarrow\;
//! \min_{y,\kappa}\ y^\top\Sigma y\ \ \text{s.t.}\ (\mu-r_f)^\top y=1,\ \mathbf 1^\top y=\kappa,\
//! \kappa\,l\le y\le\kappa\,u,\ \kappa\ge0,\qquad w=y/\kappa
//! $$
//!
//! Mean-variance objectives over long/short box constraints, each posed as a
//! convex QP and solved with Clarabel's interior-point method.

use clarabel::algebra::CscMatrix;
use clarabel::solver::DefaultSettingsBuilder;
use clarabel::solver::DefaultSolver;
use clarabel::solver::IPSolver;
use clarabel::solver::NonnegativeConeT;
use clarabel::solver::SolverStatus;
use clarabel::solver::SupportedConeT;
use clarabel::solver::ZeroConeT;
use nalgebra::DMatrix;
use nalgebra::DVector;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::types::OptimizationMethod;
use super::types::PortfolioPerformance;
use super::types::Weights;
use super::types::dot;
use crate::error::QuantError;
use crate::error::Result;

/// Per-asset weight limits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightBounds {
  /// Same `(lower, upper)` for every asset.
  Uniform(f64, f64),
  PerAsset(Vec<(f64, f64)>),
}

impl Default for WeightBounds {
  fn default() -> Self {
    Self::Uniform(0.0, 1.0)
  }
}

impl WeightBounds {
  /// Expand to one pair per asset, checking that a fully invested portfolio exists.
  pub fn resolve(&self, n: usize) -> Result<Vec<(f64, f64)>> {
    let pairs = match self {
      Self::Uniform(lo, hi) => vec![(*lo, *hi); n],
      Self::PerAsset(pairs) if pairs.len() == n => pairs.clone(),
      Self::PerAsset(pairs) => {
        return Err(QuantError::DimensionMismatch(format!(
          "{} weight bounds for {n} assets",
          pairs.len()
        )));
      }
    };
    if let Some((lo, hi)) = pairs.iter().find(|(lo, hi)| !(lo <= hi)) {
      return Err(QuantError::InvalidParameter(format!(
        "lower bound {lo} exceeds upper bound {hi}"
      )));
    }
    let lo_sum: f64 = pairs.iter().map(|p| p.0).sum();
    let hi_sum: f64 = pairs.iter().map(|p| p.1).sum();
    if lo_sum > 1.0 + 1e-12 || hi_sum < 1.0 - 1e-12 {
      return Err(QuantError::Infeasible(format!(
        "bounds cannot sum to one (lower {lo_sum}, upper {hi_sum})"
      )));
    }
    Ok(pairs)
  }
}

/// Linear constraints in Clarabel's `Ax + s = b` form: equality rows go to
/// the zero cone, `row·x <= b` rows to the nonnegative cone.
struct Constraints {
  n: usize,
  equalities: Vec<(Vec<f64>, f64)>,
  inequalities: Vec<(Vec<f64>, f64)>,
}

impl Constraints {
  fn new(n: usize) -> Self {
    Self {
      n,
      equalities: Vec::new(),
      inequalities: Vec::new(),
    }
  }

  fn equal(&mut self, row: Vec<f64>, b: f64) {
    debug_assert_eq!(row.len(), self.n);
    self.equalities.push((row, b));
  }

  fn at_most(&mut self, row: Vec<f64>, b: f64) {
    debug_assert_eq!(row.len(), self.n);
    if b.is_finite() {
      self.inequalities.push((row, b));
    }
  }

  fn at_least(&mut self, row: Vec<f64>, b: f64) {
    self.at_most(row.into_iter().map(|v| -v).collect(), -b);
  }
}

/// Column-compressed copy of the entries `entry(i, j)` kept by `keep`.
fn to_csc(
  nrows: usize,
  ncols: usize,
  entry: impl Fn(usize, usize) -> f64,
  keep: impl Fn(usize, usize) -> bool,
) -> CscMatrix<f64> {
  let mut colptr = vec![0];
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();
  for j in 0..ncols {
    for i in 0..nrows {
      let v = entry(i, j);
      if keep(i, j) && v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(nzval.len());
  }
  CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Minimise `½ xᵀPx + qᵀx` under `constraints`. Any terminal status other than
/// [`SolverStatus::Solved`] is reported as [`QuantError::Infeasible`].
fn solve_qp(p: &DMatrix<f64>, q: &[f64], constraints: Constraints) -> Result<Vec<f64>> {
  let n = constraints.n;
  let p_csc = to_csc(n, n, |i, j| p[(i, j)], |i, j| i <= j);

  let n_eq = constraints.equalities.len();
  let n_ineq = constraints.inequalities.len();
  let rows: Vec<&(Vec<f64>, f64)> = constraints
    .equalities
    .iter()
    .chain(&constraints.inequalities)
    .collect();
  let a = to_csc(rows.len(), n, |i, j| rows[i].0[j], |_, _| true);
  let b: Vec<f64> = rows.iter().map(|r| r.1).collect();

  let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
  if n_eq > 0 {
    cones.push(ZeroConeT(n_eq));
  }
  if n_ineq > 0 {
    cones.push(NonnegativeConeT(n_ineq));
  }

  let settings = DefaultSettingsBuilder::default()
    .verbose(false)
    .build()
    .map_err(|e| QuantError::InvalidParameter(format!("solver settings: {e}")))?;
  let mut solver = DefaultSolver::new(&p_csc, q, &a, &b, &cones, settings)
    .map_err(|e| QuantError::InvalidParameter(format!("solver setup: {e:?}")))?;
  solver.solve();

  let status = &solver.solution.status;
  if !matches!(status, SolverStatus::Solved) {
    return Err(QuantError::Infeasible(format!(
      "optimization finished with status {status:?}"
    )));
  }
  debug!(iterations = solver.solution.iterations, "qp solved");
  Ok(solver.solution.x.clone())
}

/// Mean-variance optimizer over expected returns `mu` and covariance `cov`.
#[derive(Clone, Debug)]
pub struct EfficientFrontier {
  tickers: Vec<String>,
  mu: Vec<f64>,
  cov: DMatrix<f64>,
  bounds: Vec<(f64, f64)>,
  weights: Option<Vec<f64>>,
}

impl EfficientFrontier {
  pub fn new(
    tickers: Vec<String>,
    mu: Vec<f64>,
    cov: DMatrix<f64>,
    bounds: &WeightBounds,
  ) -> Result<Self> {
    let n = tickers.len();
    if n == 0 {
      return Err(QuantError::EmptyInput);
    }
    if mu.len() != n || cov.nrows() != n || cov.ncols() != n {
      return Err(QuantError::DimensionMismatch(format!(
        "{n} tickers, {} expected returns, {}x{} covariance",
        mu.len(),
        cov.nrows(),
        cov.ncols()
      )));
    }
    if mu.iter().chain(cov.iter()).any(|v| !v.is_finite()) {
      return Err(QuantError::NonFinite);
    }
    let bounds = bounds.resolve(n)?;
    Ok(Self {
      tickers,
      mu,
      cov,
      bounds,
      weights: None,
    })
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn expected_returns(&self) -> &[f64] {
    &self.mu
  }

  pub fn covariance(&self) -> &DMatrix<f64> {
    &self.cov
  }

  /// Weights of the last optimization, if any.
  pub fn weights(&self) -> Option<Weights> {
    self
      .weights
      .as_ref()
      .and_then(|w| Weights::new(self.tickers.clone(), w.clone()).ok())
  }

  fn budget_and_box(&self) -> Constraints {
    let n = self.n_assets();
    let mut c = Constraints::new(n);
    c.equal(vec![1.0; n], 1.0);
    for (i, (lo, hi)) in self.bounds.iter().enumerate() {
      let mut row = vec![0.0; n];
      row[i] = 1.0;
      c.at_least(row.clone(), *lo);
      c.at_most(row, *hi);
    }
    c
  }

  fn clip(&self, x: &[f64]) -> Vec<f64> {
    x.iter()
      .zip(&self.bounds)
      .map(|(w, (lo, hi))| w.clamp(*lo, *hi))
      .collect()
  }

  fn portfolio_return(&self, w: &[f64]) -> f64 {
    dot(w, &self.mu)
  }

  fn portfolio_volatility(&self, w: &[f64]) -> f64 {
    let wv = DVector::from_column_slice(w);
    wv.dot(&(&self.cov * &wv)).max(0.0).sqrt()
  }

  fn finish(&mut self, w: Vec<f64>) -> Result<Weights> {
    let out = Weights::new(self.tickers.clone(), w.clone())?;
    self.weights = Some(w);
    Ok(out)
  }

  fn solve_min_volatility(&self) -> Result<Vec<f64>> {
    let n = self.n_assets();
    let x = solve_qp(&(&self.cov * 2.0), &vec![0.0; n], self.budget_and_box())?;
    Ok(self.clip(&x))
  }

  fn solve_quadratic_utility(&self, risk_aversion: f64) -> Result<Vec<f64>> {
    let q: Vec<f64> = self.mu.iter().map(|m| -m).collect();
    let x = solve_qp(&(&self.cov * risk_aversion), &q, self.budget_and_box())?;
    Ok(self.clip(&x))
  }

  fn solve_efficient_return(&self, target: f64) -> Result<Vec<f64>> {
    let n = self.n_assets();
    let mut c = self.budget_and_box();
    c.at_least(self.mu.clone(), target);
    let x = solve_qp(&(&self.cov * 2.0), &vec![0.0; n], c)?;
    Ok(self.clip(&x))
  }

  /// Highest attainable return: fill lower bounds, then the best assets up to their caps.
  fn max_return_weights(&self) -> Vec<f64> {
    let mut w: Vec<f64> = self.bounds.iter().map(|b| b.0).collect();
    let mut remaining = 1.0 - w.iter().sum::<f64>();
    let mut order: Vec<usize> = (0..self.n_assets()).collect();
    order.sort_by(|&a, &b| self.mu[b].total_cmp(&self.mu[a]));
    for i in order {
      if remaining <= 0.0 {
        break;
      }
      let add = (self.bounds[i].1 - w[i]).min(remaining);
      w[i] += add;
      remaining -= add;
    }
    w
  }

  /// Global minimum-variance portfolio.
  pub fn min_volatility(&mut self) -> Result<Weights> {
    let w = self.solve_min_volatility()?;
    self.finish(w)
  }

  /// Tangency portfolio for the annual `risk_free_rate`.
  pub fn max_sharpe(&mut self, risk_free_rate: f64) -> Result<Weights> {
    let n = self.n_assets();
    if self.mu.iter().all(|m| *m <= risk_free_rate) {
      return Err(QuantError::Infeasible(
        "at least one asset must have an expected return exceeding the risk-free rate".into(),
      ));
    }

    // variables: y (n) and kappa
    let dim = n + 1;
    let mut c = Constraints::new(dim);
    let mut excess: Vec<f64> = self.mu.iter().map(|m| m - risk_free_rate).collect();
    excess.push(0.0);
    c.equal(excess, 1.0);

    let mut budget = vec![1.0; n];
    budget.push(-1.0);
    c.equal(budget, 0.0);

    for (i, (lo, hi)) in self.bounds.iter().enumerate() {
      let mut lower_row = vec![0.0; dim];
      lower_row[i] = 1.0;
      lower_row[n] = -lo;
      c.at_least(lower_row, 0.0);

      let mut upper_row = vec![0.0; dim];
      upper_row[i] = 1.0;
      upper_row[n] = -hi;
      c.at_most(upper_row, 0.0);
    }

    let mut kappa_row = vec![0.0; dim];
    kappa_row[n] = 1.0;
    c.at_least(kappa_row, 0.0);

    let mut p = DMatrix::zeros(dim, dim);
    p.view_mut((0, 0), (n, n)).copy_from(&(&self.cov * 2.0));
    let x = solve_qp(&p, &vec![0.0; dim], c)?;

    let kappa = x[n];
    if kappa <= 1e-12 {
      return Err(QuantError::Infeasible("max Sharpe scaling collapsed to zero".into()));
    }
    debug!(kappa, "max sharpe");
    let y: Vec<f64> = x[..n].iter().map(|v| v / kappa).collect();
    let w = self.clip(&y);
    self.finish(w)
  }

  /// Maximise `μᵀw - ½ δ wᵀΣw`.
  pub fn max_quadratic_utility(&mut self, risk_aversion: f64) -> Result<Weights> {
    if risk_aversion <= 0.0 {
      return Err(QuantError::InvalidParameter(format!(
        "risk aversion must be positive, got {risk_aversion}"
      )));
    }
    let w = self.solve_quadratic_utility(risk_aversion)?;
    self.finish(w)
  }

  /// Minimum variance subject to `μᵀw >= target_return`.
  pub fn efficient_return(&mut self, target_return: f64) -> Result<Weights> {
    let max_ret = self.portfolio_return(&self.max_return_weights());
    if target_return > max_ret + 1e-12 {
      return Err(QuantError::Infeasible(format!(
        "target return {target_return} must be lower than the maximum possible return {max_ret}"
      )));
    }
    let w = self.solve_efficient_return(target_return)?;
    self.finish(w)
  }

  /// Maximum return subject to `sqrt(wᵀΣw) <= target_volatility`.
  ///
  /// Bisects on the return target along the frontier.
  pub fn efficient_risk(&mut self, target_volatility: f64) -> Result<Weights> {
    let w_min = self.solve_min_volatility()?;
    let vol_min = self.portfolio_volatility(&w_min);
    if target_volatility < vol_min - 1e-9 {
      return Err(QuantError::Infeasible(format!(
        "the minimum volatility is {vol_min:.4}; use a higher target volatility than {target_volatility}"
      )));
    }

    let w_max = self.max_return_weights();
    if self.portfolio_volatility(&w_max) <= target_volatility {
      return self.finish(w_max);
    }

    let mut lo = self.portfolio_return(&w_min);
    let mut hi = self.portfolio_return(&w_max);
    let mut best = w_min;
    for _ in 0..60 {
      if hi - lo < 1e-10 {
        break;
      }
      let mid = 0.5 * (lo + hi);
      let w = self.solve_efficient_return(mid)?;
      if self.portfolio_volatility(&w) <= target_volatility {
        lo = mid;
        best = w;
      } else {
        hi = mid;
      }
    }
    self.finish(best)
  }

  /// Dispatch on an [`OptimizationMethod`].
  pub fn optimize(&mut self, method: OptimizationMethod) -> Result<Weights> {
    match method {
      OptimizationMethod::MaxSharpe { risk_free_rate } => self.max_sharpe(risk_free_rate),
      OptimizationMethod::MinVolatility => self.min_volatility(),
      OptimizationMethod::MaxQuadraticUtility { risk_aversion } => {
        self.max_quadratic_utility(risk_aversion)
      }
      OptimizationMethod::EfficientRisk { target_volatility } => {
        self.efficient_risk(target_volatility)
      }
      OptimizationMethod::EfficientReturn { target_return } => {
        self.efficient_return(target_return)
      }
    }
  }

  /// Expected return, volatility and Sharpe ratio of the last optimized weights.
  pub fn portfolio_performance(&self, risk_free_rate: f64) -> Result<PortfolioPerformance> {
    let w = self
      .weights
      .as_ref()
      .ok_or_else(|| QuantError::InvalidParameter("weights not yet computed".into()))?;
    Ok(self.performance_of(w, risk_free_rate))
  }

  pub fn performance_of(&self, w: &[f64], risk_free_rate: f64) -> PortfolioPerformance {
    let expected_return = self.portfolio_return(w);
    let volatility = self.portfolio_volatility(w);
    let sharpe = if volatility > 1e-15 {
      (expected_return - risk_free_rate) / volatility
    } else {
      0.0
    };
    PortfolioPerformance {
      expected_return,
      volatility,
      sharpe,
    }
  }

  /// Zero out weights below `cutoff` in magnitude and round to `rounding` decimals.
  pub fn clean_weights(&self, cutoff: f64, rounding: Option<u32>) -> Result<Weights> {
    let w = self
      .weights
      .as_ref()
      .ok_or_else(|| QuantError::InvalidParameter("weights not yet computed".into()))?;
    let cleaned = w
      .iter()
      .map(|v| {
        let v = if v.abs() < cutoff { 0.0 } else { *v };
        match rounding {
          Some(d) => {
            let scale = 10f64.powi(d as i32);
            (v * scale).round() / scale
          }
          None => v,
        }
      })
      .collect();
    Weights::new(self.tickers.clone(), cleaned)
  }

  /// `(volatility, return)` pairs along the frontier from the minimum-variance
  /// portfolio towards the maximum-return corner.
  pub fn efficient_frontier_curve(&self, points: usize) -> Result<Vec<(f64, f64)>> {
    if points < 2 {
      return Err(QuantError::InvalidParameter("need at least two frontier points".into()));
    }
    let w_min = self.solve_min_volatility()?;
    let r_min = self.portfolio_return(&w_min);
    let r_max = self.portfolio_return(&self.max_return_weights());
    let span = (r_max - r_min).max(0.0) * 0.999;

    (0..points)
      .map(|i| {
        let target = r_min + span * i as f64 / (points - 1) as f64;
        let w = if i == 0 {
          w_min.clone()
        } else {
          self.solve_efficient_return(target)?
        };
        Ok((self.portfolio_volatility(&w), self.portfolio_return(&w)))
      })
      .collect()
  }
}
