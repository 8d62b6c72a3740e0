//! # quant-risk
//!
//! $$
//! \max_{\mathbf w}\ \frac{\mu^\top\mathbf w-r_f}{\sqrt{\mathbf w^\top\Sigma\mathbf w}}
//! $$
//!
//! Portfolio construction (mean-variance, risk parity, regime backtests),
//! performance and tail-risk statistics, time-series diagnostics and plotting.

pub mod data;
pub mod error;
pub mod models;
pub mod quant;
pub mod stats;
pub mod visualization;

pub use error::QuantError;
pub use error::Result;
