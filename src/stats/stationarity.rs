//! Stationarity and unit-root tests.

mod common;

pub mod adf;

pub use common::CriticalValues;
pub use common::DeterministicTerm;
pub use common::LagSelection;
pub use common::mackinnon_p_value;
