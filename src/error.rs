//! Error types for the pricing and calibration engine.
//!
//! Malformed inputs are rejected eagerly with [`PricingError::InvalidArgument`].
//! A volatility that cannot be recovered from a price is *not* an error: the
//! solver returns [`ImpliedVol::NotFound`](crate::ImpliedVol::NotFound) instead.

use thiserror::Error;

/// Convenience type alias for results in this crate.
pub type Result<T> = std::result::Result<T, PricingError>;

/// Errors raised by the pricer, the implied-volatility solver and the surface fitter.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum PricingError {
    /// Input is malformed: unknown option kind, negative expiry, mismatched
    /// array lengths, too few points for a surface fit.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A linear-algebra step failed (e.g. the spline system could not be solved).
    #[error("numerical error: {message}")]
    NumericalError { message: String },
}

impl PricingError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PricingError::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn numerical(message: impl Into<String>) -> Self {
        PricingError::NumericalError {
            message: message.into(),
        }
    }

    /// True for [`PricingError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, PricingError::InvalidArgument { .. })
    }
}
