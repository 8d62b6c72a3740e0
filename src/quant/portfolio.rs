//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Mean-variance optimization, risk parity and the regime-signal backtest.

pub mod efficient_frontier;
pub mod expected_returns;
pub mod mean_variance;
pub mod regime;
pub mod risk_models;
pub mod risk_parity;
pub mod types;

pub use efficient_frontier::EfficientFrontier;
pub use efficient_frontier::WeightBounds;
pub use expected_returns::mean_historical_return;
pub use mean_variance::MeanVariance;
pub use mean_variance::MeanVarianceConfig;
pub use regime::RegimeConfig;
pub use regime::RegimeSignal;
pub use regime::RegimeSignalModel;
pub use risk_models::correlation_from_covariance;
pub use risk_models::ledoit_wolf;
pub use risk_models::sample_covariance;
pub use risk_parity::risk_contribution;
pub use risk_parity::risk_parity_portfolio;
pub use risk_parity::target_risk_contribution;
pub use types::OptimizationMethod;
pub use types::PortfolioPerformance;
pub use types::Weights;
