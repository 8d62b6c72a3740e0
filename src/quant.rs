//! # Quant
//!
//! $$
//! V_t=\sum_i w_{i,t} P_{i,t}
//! $$
//!
//! Portfolio construction and backtesting.

pub mod backtest;
pub mod portfolio;
