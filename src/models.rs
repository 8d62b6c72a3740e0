//! # Models
//!
//! $$
//! y=X\beta+\varepsilon,\qquad \phi(B)(1-B)^d y_t=c+\theta(B)\varepsilon_t
//! $$
//!
pub mod arima;
pub mod regression;
