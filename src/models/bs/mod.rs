//! Black-Scholes pricing module
//!
//! Closed-form European option prices and Greeks under Black-Scholes assumptions
//! (log-normal underlying, constant volatility and rate, no dividends), plus the
//! inversion of the pricing formula for implied volatility.

pub mod implied;
pub mod pricer;
pub mod types;

pub use implied::*;
pub use pricer::*;
pub use types::*;
