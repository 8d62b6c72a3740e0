//! # Data
//!
//! $$
//! r_t = \frac{P_t}{P_{t-1}} - 1
//! $$
//!
//! Price containers, return transforms and (optionally) market data fetching.

#[cfg(feature = "yahoo")]
pub mod fetch;
pub mod frame;
pub mod returns;

pub use frame::business_days;
pub use frame::PriceFrame;
pub use returns::log_returns;
pub use returns::pct_change;
