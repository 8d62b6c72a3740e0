//! # Visualization
//!
//! $$
//! \{(\sigma_p(\mathbf w),\ \mu^\top\mathbf w)\ :\ \mathbf w\in\mathcal W\}
//! $$
//!
//! Plotly charts for weights, the efficient frontier, covariance/correlation
//! heatmaps and time series. Every builder returns a [`Plot`]; use
//! [`save_html`] or `Plot::write_html` to render it.

use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use nalgebra::DMatrix;
use plotly::Bar;
use plotly::HeatMap;
use plotly::Layout;
use plotly::Plot;
use plotly::Scatter;
use plotly::common::ColorScale;
use plotly::common::ColorScalePalette;
use plotly::common::Line;
use plotly::common::Marker;
use plotly::common::MarkerSymbol;
use plotly::common::Mode;
use plotly::common::Orientation;
use plotly::common::Title;
use plotly::layout::Axis;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Dirichlet;
use rand_distr::Distribution;

use crate::error::QuantError;
use crate::error::Result;
use crate::quant::portfolio::efficient_frontier::EfficientFrontier;
use crate::quant::portfolio::types::Weights;

/// Horizontal bar chart of portfolio weights.
pub fn plot_weights(weights: &Weights) -> Plot {
  let labels: Vec<String> = weights.tickers().to_vec();
  let values: Vec<f64> = weights.values().to_vec();

  let mut plot = Plot::new();
  plot.add_trace(
    Bar::new(values, labels)
      .orientation(Orientation::Horizontal)
      .name("weight"),
  );
  plot.set_layout(
    Layout::new()
      .title(Title::from("Portfolio Weights"))
      .x_axis(Axis::new().title(Title::from("Weight")))
      .show_legend(false),
  );
  plot
}

/// Frontier curve with optional asset points and random portfolios.
///
/// The max-Sharpe portfolio (at `risk_free_rate`) is marked with a star.
/// Random portfolios are drawn from a flat Dirichlet and coloured by their
/// Sharpe ratio.
pub fn plot_efficient_frontier(
  ef: &EfficientFrontier,
  points: usize,
  risk_free_rate: f64,
  show_assets: bool,
  random_portfolios: usize,
) -> Result<Plot> {
  let curve = ef.efficient_frontier_curve(points)?;
  let (vols, rets): (Vec<f64>, Vec<f64>) = curve.into_iter().unzip();

  let mut plot = Plot::new();

  if random_portfolios > 0 {
    let n = ef.n_assets();
    let dirichlet = Dirichlet::new(&vec![1.0; n.max(2)])
      .map_err(|e| QuantError::InvalidParameter(format!("dirichlet: {e}")))?;
    let mut rng = StdRng::seed_from_u64(42);
    let mut rv = Vec::with_capacity(random_portfolios);
    let mut rr = Vec::with_capacity(random_portfolios);
    let mut sharpe = Vec::with_capacity(random_portfolios);
    for _ in 0..random_portfolios {
      let w: Vec<f64> = if n == 1 {
        vec![1.0]
      } else {
        dirichlet.sample(&mut rng)
      };
      let perf = ef.performance_of(&w, risk_free_rate);
      rv.push(perf.volatility);
      rr.push(perf.expected_return);
      sharpe.push(perf.sharpe);
    }
    plot.add_trace(
      Scatter::new(rv, rr)
        .mode(Mode::Markers)
        .name("random portfolios")
        .marker(
          Marker::new()
            .size(4)
            .color_array(sharpe)
            .color_scale(ColorScale::Palette(ColorScalePalette::Viridis))
            .show_scale(true),
        ),
    );
  }

  plot.add_trace(
    Scatter::new(vols, rets)
      .mode(Mode::Lines)
      .name("efficient frontier")
      .line(Line::new().width(2.0)),
  );

  if show_assets {
    let n = ef.n_assets();
    let cov = ef.covariance();
    let asset_vols: Vec<f64> = (0..n).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
    plot.add_trace(
      Scatter::new(asset_vols, ef.expected_returns().to_vec())
        .mode(Mode::MarkersText)
        .text_array(ef.tickers().to_vec())
        .name("assets")
        .marker(Marker::new().size(8)),
    );
  }

  let mut tangency = ef.clone();
  if let Ok(w) = tangency.max_sharpe(risk_free_rate) {
    let perf = tangency.performance_of(w.values(), risk_free_rate);
    plot.add_trace(
      Scatter::new(vec![perf.volatility], vec![perf.expected_return])
        .mode(Mode::Markers)
        .name("max sharpe")
        .marker(Marker::new().size(14).symbol(MarkerSymbol::Star)),
    );
  }

  plot.set_layout(
    Layout::new()
      .title(Title::from("Efficient Frontier"))
      .x_axis(Axis::new().title(Title::from("Volatility")))
      .y_axis(Axis::new().title(Title::from("Expected Return"))),
  );
  Ok(plot)
}

fn matrix_heatmap(matrix: &DMatrix<f64>, tickers: &[String], title: &str) -> Plot {
  let z: Vec<Vec<f64>> = matrix
    .row_iter()
    .map(|row| row.iter().copied().collect())
    .collect();
  let trace = HeatMap::new(tickers.to_vec(), tickers.to_vec(), z)
    .color_scale(ColorScale::Palette(ColorScalePalette::RdBu));

  let mut plot = Plot::new();
  plot.add_trace(trace);
  plot.set_layout(Layout::new().title(Title::from(title)));
  plot
}

pub fn covariance_heatmap(cov: &DMatrix<f64>, tickers: &[String]) -> Plot {
  matrix_heatmap(cov, tickers, "Covariance")
}

pub fn correlation_heatmap(corr: &DMatrix<f64>, tickers: &[String]) -> Plot {
  matrix_heatmap(corr, tickers, "Correlation")
}

/// Dated line chart, e.g. a portfolio value or drawdown path.
pub fn plot_series(name: &str, dates: &[NaiveDate], values: &[f64]) -> Plot {
  let x: Vec<String> = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();

  let mut plot = Plot::new();
  plot.add_trace(
    Scatter::new(x, values.to_vec())
      .mode(Mode::Lines)
      .name(name),
  );
  plot.set_layout(
    Layout::new()
      .title(Title::from(name))
      .x_axis(Axis::new().title(Title::from("Date"))),
  );
  plot
}

/// Write `plot` as standalone HTML, creating parent directories.
pub fn save_html<P: AsRef<Path>>(plot: &Plot, path: P) -> anyhow::Result<()> {
  let path = path.as_ref();
  if let Some(parent) = path.parent() {
    if !parent.as_os_str().is_empty() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed creating plot output directory {:?}", parent))?;
    }
  }
  plot.write_html(path);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::quant::portfolio::efficient_frontier::WeightBounds;

  fn frontier() -> EfficientFrontier {
    let cov = DMatrix::from_row_slice(
      3,
      3,
      &[0.04, 0.006, 0.0, 0.006, 0.09, 0.018, 0.0, 0.018, 0.16],
    );
    EfficientFrontier::new(
      vec!["A".into(), "B".into(), "C".into()],
      vec![0.08, 0.12, 0.15],
      cov,
      &WeightBounds::default(),
    )
    .unwrap()
  }

  #[test]
  fn weights_chart_is_a_bar() {
    let w = Weights::new(vec!["A".into(), "B".into()], vec![0.4, 0.6]).unwrap();
    let json = plot_weights(&w).to_json();
    assert!(json.contains("\"type\":\"bar\""));
    assert!(json.contains("Portfolio Weights"));
  }

  #[test]
  fn frontier_chart_has_every_layer() {
    let json = plot_efficient_frontier(&frontier(), 10, 0.02, true, 50)
      .unwrap()
      .to_json();
    for name in ["random portfolios", "efficient frontier", "assets", "max sharpe"] {
      assert!(json.contains(name), "missing {name}");
    }
  }

  #[test]
  fn heatmaps_and_series_render() {
    let ef = frontier();
    let tickers = ef.tickers().to_vec();
    assert!(covariance_heatmap(ef.covariance(), &tickers).to_json().contains("heatmap"));

    let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("value.html");
    save_html(&plot_series("Value", &[d], &[1.0]), &path).unwrap();
    assert!(path.exists());
  }
}
