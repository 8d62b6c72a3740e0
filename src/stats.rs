//! # Stats
//!
//! $$
//! r_t=\frac{P_t}{P_{t-1}}-1
//! $$
//!
//! Financial ratios, moments, tail risk and time-series diagnostics.
pub mod annualize;
pub mod causality;
pub mod correlogram;
pub mod hurst;
pub mod moments;
pub mod ols;
pub mod ratios;
pub mod sample;
pub mod stationarity;
pub mod summary;
pub mod var;

use crate::data::frame::PriceFrame;
use crate::error::Result;

/// Apply a single-series metric to every column of a frame.
pub(crate) fn per_column<F>(frame: &PriceFrame, f: F) -> Result<Vec<(String, f64)>>
where
  F: Fn(&[f64]) -> Result<f64>,
{
  frame
    .tickers()
    .iter()
    .zip(frame.columns())
    .map(|(ticker, prices)| Ok((ticker.clone(), f(prices)?)))
    .collect()
}
