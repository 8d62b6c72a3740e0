use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use prettytable::Table;
use prettytable::row;
use quant_risk::data::PriceFrame;
use quant_risk::quant::portfolio::MeanVariance;
use quant_risk::quant::portfolio::MeanVarianceConfig;
use quant_risk::quant::portfolio::OptimizationMethod;
use quant_risk::quant::portfolio::RegimeConfig;
use quant_risk::quant::portfolio::RegimeSignalModel;
use quant_risk::quant::portfolio::WeightBounds;
use quant_risk::quant::portfolio::Weights;
use quant_risk::quant::portfolio::ledoit_wolf;
use quant_risk::quant::portfolio::regime::load_signals;
use quant_risk::quant::portfolio::risk_contribution;
use quant_risk::quant::portfolio::risk_parity_portfolio;
use quant_risk::stats::causality::GrangerConfig;
use quant_risk::stats::causality::granger_causality;
use quant_risk::stats::stationarity::adf::AdfConfig;
use quant_risk::stats::stationarity::adf::adf_test;
use quant_risk::stats::summary::SummaryConfig;
use quant_risk::stats::summary::summarize_frame;
use quant_risk::visualization::plot_efficient_frontier;
use quant_risk::visualization::plot_series;
use quant_risk::visualization::plot_weights;
use quant_risk::visualization::save_html;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quant-risk")]
#[command(about = "Portfolio optimization, risk statistics and time-series diagnostics")]
#[command(version)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Performance and tail-risk report for every column of a price CSV
  Summary {
    /// CSV with a date column followed by one column per ticker
    #[arg(short, long)]
    prices: PathBuf,
    /// JSON file with a SummaryConfig
    #[arg(long)]
    config: Option<PathBuf>,
    /// Annual risk-free rate (overrides the config)
    #[arg(long)]
    risk_free: Option<f64>,
  },

  /// Mean-variance optimization
  Optimize {
    #[arg(short, long)]
    prices: PathBuf,
    /// max_sharpe, min_volatility, max_quadratic_utility, efficient_risk or efficient_return
    #[arg(short, long, default_value = "max_sharpe")]
    method: String,
    /// Method parameter: risk aversion, target volatility or target return
    #[arg(long)]
    target: Option<f64>,
    #[arg(long, default_value_t = 0.02)]
    risk_free: f64,
    /// Smallest weight kept by clean_weights
    #[arg(long, default_value_t = 1e-4)]
    cutoff: f64,
    /// Write weight and frontier charts to this directory
    #[arg(long)]
    plot_dir: Option<PathBuf>,
  },

  /// Equal risk contribution weights from the Ledoit-Wolf covariance
  RiskParity {
    #[arg(short, long)]
    prices: PathBuf,
    #[arg(long, default_value_t = 252.0)]
    frequency: f64,
  },

  /// Augmented Dickey-Fuller unit-root test on one column
  Adf {
    #[arg(short, long)]
    prices: PathBuf,
    #[arg(short, long)]
    column: String,
    /// Test log prices instead of levels
    #[arg(long)]
    log: bool,
  },

  /// Does `x` Granger-cause `y`? Tested on simple returns.
  Granger {
    #[arg(short, long)]
    prices: PathBuf,
    #[arg(short, long)]
    y: String,
    #[arg(short, long)]
    x: String,
    #[arg(long, default_value_t = 4)]
    max_lag: usize,
  },

  /// Regime-signal rolling-window backtest
  Regime {
    #[arg(short, long)]
    prices: PathBuf,
    /// CSV with `date,signal` rows, signal in {-1, 0, 1}
    #[arg(short, long)]
    signals: PathBuf,
    /// JSON file with a RegimeConfig
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the portfolio value chart here
    #[arg(long)]
    plot: Option<PathBuf>,
  },

  /// Download daily closes from Yahoo Finance into a CSV
  #[cfg(feature = "yahoo")]
  Fetch {
    #[arg(short, long, value_delimiter = ',')]
    tickers: Vec<String>,
    /// Start date (YYYY-MM-DD); defaults to one year ago
    #[arg(long)]
    start: Option<chrono::NaiveDate>,
    #[arg(long)]
    end: Option<chrono::NaiveDate>,
    #[arg(short, long)]
    out: PathBuf,
  },
}

fn load_prices(path: &PathBuf) -> Result<PriceFrame> {
  PriceFrame::from_csv(path).with_context(|| format!("failed to read prices from {path:?}"))
}

fn column<'a>(frame: &'a PriceFrame, ticker: &str) -> Result<&'a [f64]> {
  match frame.column(ticker) {
    Some(c) => Ok(c),
    None => bail!("column '{ticker}' not found; available: {:?}", frame.tickers()),
  }
}

fn with_parameter(method: OptimizationMethod, risk_free: f64, target: Option<f64>) -> OptimizationMethod {
  match method {
    OptimizationMethod::MaxSharpe { .. } => OptimizationMethod::MaxSharpe {
      risk_free_rate: risk_free,
    },
    OptimizationMethod::MaxQuadraticUtility { risk_aversion } => {
      OptimizationMethod::MaxQuadraticUtility {
        risk_aversion: target.unwrap_or(risk_aversion),
      }
    }
    OptimizationMethod::EfficientRisk { target_volatility } => OptimizationMethod::EfficientRisk {
      target_volatility: target.unwrap_or(target_volatility),
    },
    OptimizationMethod::EfficientReturn { target_return } => OptimizationMethod::EfficientReturn {
      target_return: target.unwrap_or(target_return),
    },
    OptimizationMethod::MinVolatility => OptimizationMethod::MinVolatility,
  }
}

fn read_json<T: serde::de::DeserializeOwned + Default>(path: Option<&PathBuf>) -> Result<T> {
  match path {
    Some(p) => {
      let raw = std::fs::read_to_string(p).with_context(|| format!("failed to read {p:?}"))?;
      serde_json::from_str(&raw).with_context(|| format!("invalid config in {p:?}"))
    }
    None => Ok(T::default()),
  }
}

fn weights_table(weights: &Weights) -> Table {
  let mut table = Table::new();
  table.add_row(row!["Ticker", "Weight"]);
  for (ticker, w) in weights.iter() {
    table.add_row(row![ticker, format!("{w:.5}")]);
  }
  table
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let cli = Cli::parse();
  match cli.command {
    Commands::Summary {
      prices,
      config,
      risk_free,
    } => {
      let frame = load_prices(&prices)?;
      let mut cfg: SummaryConfig = read_json(config.as_ref())?;
      if let Some(rf) = risk_free {
        cfg.risk_free = rf;
      }
      summarize_frame(&frame, &cfg)?.printstd();
    }

    Commands::Optimize {
      prices,
      method,
      target,
      risk_free,
      cutoff,
      plot_dir,
    } => {
      let method = with_parameter(method.parse()?, risk_free, target);
      let cfg = MeanVarianceConfig {
        risk_free_rate: Some(risk_free),
        ..Default::default()
      };
      let mut mv = MeanVariance::new(load_prices(&prices)?, cfg)?;
      info!(%method, "optimizing");
      mv.fit(method)?;
      let cleaned = mv.frontier().clean_weights(cutoff, Some(5))?;
      weights_table(&cleaned).printstd();
      println!("{}", mv.stats()?);

      if let Some(dir) = plot_dir {
        save_html(&plot_weights(&cleaned), dir.join("weights.html"))?;
        let frontier = plot_efficient_frontier(mv.frontier(), 50, mv.risk_free_rate(), true, 2000)?;
        save_html(&frontier, dir.join("efficient_frontier.html"))?;
        info!(?dir, "charts written");
      }
    }

    Commands::RiskParity { prices, frequency } => {
      let frame = load_prices(&prices)?;
      let cov = ledoit_wolf(&frame, frequency)?.matrix;
      let w = risk_parity_portfolio(&cov, &WeightBounds::default())?;
      let rc = risk_contribution(&w, &cov)?;

      let mut table = Table::new();
      table.add_row(row!["Ticker", "Weight", "Risk contribution"]);
      for ((ticker, wi), rci) in frame.tickers().iter().zip(&w).zip(&rc) {
        table.add_row(row![ticker, format!("{wi:.5}"), format!("{rci:.5}")]);
      }
      table.printstd();
    }

    Commands::Adf {
      prices,
      column: name,
      log,
    } => {
      let frame = load_prices(&prices)?;
      let series = column(&frame, &name)?;
      let series: Vec<f64> = if log {
        series.iter().map(|p| p.ln()).collect()
      } else {
        series.to_vec()
      };
      let res = adf_test(&series, AdfConfig::default())?;
      println!("{res}");
      println!(
        "{name}: {}",
        if res.reject_unit_root {
          "stationary (unit root rejected)"
        } else {
          "non-stationary (unit root not rejected)"
        }
      );
    }

    Commands::Granger {
      prices,
      y,
      x,
      max_lag,
    } => {
      let frame = load_prices(&prices)?;
      let ry = quant_risk::data::pct_change(column(&frame, &y)?);
      let rx = quant_risk::data::pct_change(column(&frame, &x)?);
      let cfg = GrangerConfig {
        max_lag,
        ..Default::default()
      };

      let mut table = Table::new();
      table.add_row(row!["Lag", "F", "p (F)", "Chi2", "p (Chi2)", "Reject"]);
      for r in granger_causality(&ry, &rx, cfg)? {
        table.add_row(row![
          r.lag,
          format!("{:.4}", r.f_statistic),
          format!("{:.4}", r.f_p_value),
          format!("{:.4}", r.chi2_statistic),
          format!("{:.4}", r.chi2_p_value),
          r.rejects_null
        ]);
      }
      println!("H0: {x} does not Granger-cause {y}");
      table.printstd();
    }

    Commands::Regime {
      prices,
      signals,
      config,
      plot,
    } => {
      let cfg: RegimeConfig = read_json(config.as_ref())?;
      let signals = load_signals(&signals)
        .with_context(|| format!("failed to read signals from {signals:?}"))?;
      let mut model = RegimeSignalModel::new(signals, load_prices(&prices)?, cfg)?;

      for (regime, w) in &model.get_weights()?.average {
        println!("Average weights, regime {regime}");
        weights_table(w).printstd();
      }

      let portfolio = model.get_portfolio(Some(&SummaryConfig::default()))?;
      if let Some(summary) = &portfolio.summary {
        let mut table = Table::new();
        for (label, value) in summary.rows() {
          table.add_row(row![label, format!("{value:.4}")]);
        }
        table.printstd();
      }
      if let Some(path) = plot {
        save_html(&plot_series("Regime portfolio value", &portfolio.dates, &portfolio.values), &path)?;
      }
    }

    #[cfg(feature = "yahoo")]
    Commands::Fetch {
      tickers,
      start,
      end,
      out,
    } => {
      let refs: Vec<&str> = tickers.iter().map(String::as_str).collect();
      let frame = quant_risk::data::fetch::fetch_prices_blocking(&refs, start, end)?;
      frame.to_csv(&out)?;
      info!(rows = frame.len(), ?out, "prices saved");
    }
  }

  Ok(())
}
