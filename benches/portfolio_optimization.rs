use std::hint::black_box;

use criterion::criterion_group;
use criterion::criterion_main;
use criterion::BenchmarkId;
use criterion::Criterion;
use nalgebra::DMatrix;
use quant_risk::quant::portfolio::risk_parity_portfolio;
use quant_risk::quant::portfolio::EfficientFrontier;
use quant_risk::quant::portfolio::WeightBounds;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Normal;

fn market(n: usize) -> (Vec<String>, Vec<f64>, DMatrix<f64>) {
  let mut rng = StdRng::seed_from_u64(7);
  let z = Normal::new(0.0, 0.01).expect("standard normal parameters are valid");
  let periods = 500;
  let returns = DMatrix::from_fn(periods, n, |_, _| z.sample(&mut rng));
  let cov = returns.transpose() * &returns * (252.0 / periods as f64)
    + DMatrix::identity(n, n) * 1e-4;
  let mu = (0..n).map(|i| 0.04 + 0.01 * i as f64).collect();
  let tickers = (0..n).map(|i| format!("A{i}")).collect();
  (tickers, mu, cov)
}

fn bench_frontier(c: &mut Criterion) {
  let mut group = c.benchmark_group("EfficientFrontier");
  for n in [5, 20, 50] {
    let (tickers, mu, cov) = market(n);
    let ef = EfficientFrontier::new(tickers, mu, cov, &WeightBounds::default())
      .expect("valid frontier inputs");

    group.bench_with_input(BenchmarkId::new("min_volatility", n), &ef, |b, ef| {
      b.iter(|| {
        let mut ef = ef.clone();
        black_box(ef.min_volatility().ok())
      });
    });
    group.bench_with_input(BenchmarkId::new("max_sharpe", n), &ef, |b, ef| {
      b.iter(|| {
        let mut ef = ef.clone();
        black_box(ef.max_sharpe(0.02).ok())
      });
    });
  }
  group.finish();
}

fn bench_risk_parity(c: &mut Criterion) {
  let mut group = c.benchmark_group("RiskParity");
  for n in [5, 10, 20] {
    let (_, _, cov) = market(n);
    group.bench_with_input(BenchmarkId::from_parameter(n), &cov, |b, cov| {
      b.iter(|| black_box(risk_parity_portfolio(cov, &WeightBounds::default()).ok()));
    });
  }
  group.finish();
}

criterion_group!(benches, bench_frontier, bench_risk_parity);
criterion_main!(benches);
