//! Implied volatility by inversion of the Black-Scholes formula.
//!
//! The model price is strictly increasing in volatility for `T > 0`, so the
//! volatility reproducing a market price is unique whenever it exists. The
//! solver brackets the search in `[min_vol, max_vol]` and runs Brent's method;
//! a price outside the achievable range yields [`ImpliedVol::NotFound`].

use roots::{find_root_brent, SimpleConvergency};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::calibration::config::SolverConfig;
use crate::error::{PricingError, Result};

use super::pricer::price;
use super::types::OptionKind;

/// Outcome of an implied-volatility search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ImpliedVol {
    /// Volatility reproducing the market price within tolerance
    Converged(f64),
    /// No volatility in the search domain reproduces the market price
    NotFound,
}

impl ImpliedVol {
    pub fn is_defined(&self) -> bool {
        matches!(self, ImpliedVol::Converged(_))
    }

    pub fn value(&self) -> Option<f64> {
        match *self {
            ImpliedVol::Converged(sigma) => Some(sigma),
            ImpliedVol::NotFound => None,
        }
    }

    pub fn unwrap_or(&self, default: f64) -> f64 {
        self.value().unwrap_or(default)
    }

    /// The solved volatility, or NaN when no solution exists.
    pub fn to_f64(&self) -> f64 {
        self.unwrap_or(f64::NAN)
    }
}

impl From<ImpliedVol> for Option<f64> {
    fn from(iv: ImpliedVol) -> Self {
        iv.value()
    }
}

/// Implied volatility with the default [`SolverConfig`].
///
/// # Example
///
/// ```rust
/// use volsurface_lib::{implied_volatility, OptionKind};
///
/// let iv = implied_volatility(10.45, 100.0, 100.0, 1.0, 0.05, OptionKind::Call)?;
/// assert!((iv.value().unwrap() - 0.20).abs() < 0.005);
///
/// let none = implied_volatility(1000.0, 100.0, 100.0, 1.0, 0.05, OptionKind::Call)?;
/// assert!(!none.is_defined());
/// # Ok::<(), volsurface_lib::PricingError>(())
/// ```
#[allow(non_snake_case)]
pub fn implied_volatility(
    price_market: f64,
    S: f64,
    K: f64,
    T: f64,
    r: f64,
    kind: OptionKind,
) -> Result<ImpliedVol> {
    implied_volatility_with_config(price_market, S, K, T, r, kind, &SolverConfig::default())
}

/// Implied volatility with explicit search bounds, tolerance and iteration budget.
///
/// A market price within `tolerance` of the model price at `min_vol` (or
/// `max_vol`) returns that bracket end as [`ImpliedVol::Converged`] without
/// searching. Near-worthless far out-of-the-money quotes therefore report
/// `min_vol` rather than [`ImpliedVol::NotFound`].
///
/// # Errors
///
/// [`PricingError::InvalidArgument`] for inputs the pricer rejects, a
/// non-finite market price, or an empty search bracket.
#[allow(non_snake_case)]
pub fn implied_volatility_with_config(
    price_market: f64,
    S: f64,
    K: f64,
    T: f64,
    r: f64,
    kind: OptionKind,
    config: &SolverConfig,
) -> Result<ImpliedVol> {
    if !price_market.is_finite() {
        return Err(PricingError::invalid(format!(
            "Market price must be finite, got {price_market}"
        )));
    }
    config.validate()?;

    // Validates S, K, T, r and gives the low end of the bracket
    let low_price = price(S, K, T, r, config.min_vol, kind)?;

    if T == 0.0 {
        debug!(price_market, "option expired, volatility is not identifiable");
        return Ok(ImpliedVol::NotFound);
    }

    let high_price = price(S, K, T, r, config.max_vol, kind)?;
    let f_low = low_price - price_market;
    let f_high = high_price - price_market;

    if f_low.abs() <= config.tolerance {
        return Ok(ImpliedVol::Converged(config.min_vol));
    }
    if f_high.abs() <= config.tolerance {
        return Ok(ImpliedVol::Converged(config.max_vol));
    }
    if f_low * f_high > 0.0 {
        debug!(
            price_market,
            low_price, high_price, "market price outside achievable model prices"
        );
        return Ok(ImpliedVol::NotFound);
    }

    // Inputs were validated above, so the closure cannot fail
    let objective = |sigma: f64| -> f64 {
        price(S, K, T, r, sigma, kind).unwrap_or(f64::NAN) - price_market
    };

    let mut convergency = SimpleConvergency {
        eps: config.tolerance,
        max_iter: config.max_iterations,
    };

    match find_root_brent(config.min_vol, config.max_vol, &objective, &mut convergency) {
        Ok(sigma) if sigma.is_finite() => {
            trace!(price_market, sigma, "implied volatility converged");
            Ok(ImpliedVol::Converged(sigma))
        }
        Ok(sigma) => {
            debug!(price_market, sigma, "solver returned a non-finite volatility");
            Ok(ImpliedVol::NotFound)
        }
        Err(e) => {
            debug!(price_market, error = ?e, "root finding failed");
            Ok(ImpliedVol::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn nan_sentinel_for_interop() {
        let iv = ImpliedVol::NotFound;
        let x = iv.to_f64();
        assert!(x != x);
        assert_eq!(Option::<f64>::from(ImpliedVol::Converged(0.3)), Some(0.3));
    }

    #[test]
    fn price_below_intrinsic_has_no_solution() {
        // Deep ITM call quoted below S - K e^{-rT}
        let iv = implied_volatility(30.0, 150.0, 100.0, 1.0, 0.05, OptionKind::Call).unwrap();
        assert_eq!(iv, ImpliedVol::NotFound);
    }

    #[test]
    fn expired_option_has_no_solution() {
        let iv = implied_volatility(5.0, 105.0, 100.0, 0.0, 0.05, OptionKind::Call).unwrap();
        assert_eq!(iv, ImpliedVol::NotFound);
    }

    #[test]
    fn recovers_high_volatility() {
        let p = price(100.0, 120.0, 0.5, 0.01, 2.5, OptionKind::Put).unwrap();
        let iv = implied_volatility(p, 100.0, 120.0, 0.5, 0.01, OptionKind::Put).unwrap();
        assert_abs_diff_eq!(iv.value().unwrap(), 2.5, epsilon = 1e-6);
    }

    #[test]
    fn worthless_quote_pins_to_bracket_floor() {
        let config = SolverConfig::default();
        let iv = implied_volatility_with_config(
            1e-14,
            100.0,
            200.0,
            0.5,
            0.05,
            OptionKind::Call,
            &config,
        )
        .unwrap();
        assert_eq!(iv, ImpliedVol::Converged(config.min_vol));
    }

    #[test]
    fn rejects_non_finite_price() {
        let err =
            implied_volatility(f64::NAN, 100.0, 100.0, 1.0, 0.05, OptionKind::Call).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn rejects_negative_expiry() {
        let err = implied_volatility(5.0, 100.0, 100.0, -1.0, 0.05, OptionKind::Call).unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
