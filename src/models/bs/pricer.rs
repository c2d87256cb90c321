use crate::error::{PricingError, Result};
use crate::models::utils::{intrinsic_value, norm_cdf, norm_pdf};

use super::types::{Greeks, OptionKind};

const DAYS_PER_YEAR: f64 = 365.0;

/// Reject inputs the closed form is undefined for.
#[allow(non_snake_case)]
fn validate_inputs(S: f64, K: f64, T: f64, r: f64, sigma: f64) -> Result<()> {
    if !(S.is_finite() && S > 0.0) {
        return Err(PricingError::invalid(format!(
            "Spot price (S) must be positive and finite, got {S}"
        )));
    }
    if !(K.is_finite() && K > 0.0) {
        return Err(PricingError::invalid(format!(
            "Strike price (K) must be positive and finite, got {K}"
        )));
    }
    if T < 0.0 {
        return Err(PricingError::invalid("Time to expiry (T) cannot be negative"));
    }
    if !T.is_finite() {
        return Err(PricingError::invalid(format!(
            "Time to expiry (T) must be finite, got {T}"
        )));
    }
    if !r.is_finite() {
        return Err(PricingError::invalid(format!(
            "Risk-free rate (r) must be finite, got {r}"
        )));
    }
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(PricingError::invalid(format!(
            "Volatility (sigma) must be non-negative and finite, got {sigma}"
        )));
    }
    Ok(())
}

#[allow(non_snake_case)]
fn d1_d2(S: f64, K: f64, T: f64, r: f64, sigma: f64) -> (f64, f64) {
    let sig_sqrt_t = sigma * T.sqrt();
    let d1 = ((S / K).ln() + (r + 0.5 * sigma * sigma) * T) / sig_sqrt_t;
    (d1, d1 - sig_sqrt_t)
}

/// Price of a European option under Black-Scholes assumptions.
///
/// At `T = 0` the intrinsic value is returned. With `sigma = 0` and `T > 0`
/// the option carries no time value and is worth its discounted intrinsic value.
///
/// # Errors
///
/// [`PricingError::InvalidArgument`] when `T < 0`, `S` or `K` are not positive,
/// or any input is not finite.
///
/// # Example
///
/// ```rust
/// use volsurface_lib::{price, OptionKind};
///
/// let call = price(100.0, 100.0, 1.0, 0.05, 0.2, OptionKind::Call)?;
/// assert!((call - 10.45).abs() < 0.01);
/// # Ok::<(), volsurface_lib::PricingError>(())
/// ```
#[allow(non_snake_case)]
pub fn price(S: f64, K: f64, T: f64, r: f64, sigma: f64, kind: OptionKind) -> Result<f64> {
    validate_inputs(S, K, T, r, sigma)?;

    if T == 0.0 {
        return Ok(intrinsic_value(kind, S, K));
    }

    let df = (-r * T).exp();
    if sigma == 0.0 {
        return Ok(match kind {
            OptionKind::Call => (S - K * df).max(0.0),
            OptionKind::Put => (K * df - S).max(0.0),
        });
    }

    let (d1, d2) = d1_d2(S, K, T, r, sigma);
    let value = match kind {
        OptionKind::Call => S * norm_cdf(d1) - K * df * norm_cdf(d2),
        OptionKind::Put => K * df * norm_cdf(-d2) - S * norm_cdf(-d1),
    };

    // Cancellation in the two-term formula can leave a tiny negative residue
    Ok(value.max(0.0))
}

/// Analytic Black-Scholes Greeks.
///
/// Theta is per calendar day, vega and rho per percentage point. At expiry or
/// with zero volatility only delta survives, as the slope of the payoff.
#[allow(non_snake_case)]
pub fn greeks(S: f64, K: f64, T: f64, r: f64, sigma: f64, kind: OptionKind) -> Result<Greeks> {
    validate_inputs(S, K, T, r, sigma)?;

    if T == 0.0 || sigma == 0.0 {
        let forward_strike = K * (-r * T).exp();
        let delta = match kind {
            OptionKind::Call if S > forward_strike => 1.0,
            OptionKind::Put if S < forward_strike => -1.0,
            _ => 0.0,
        };
        return Ok(Greeks {
            delta,
            ..Greeks::default()
        });
    }

    let sqrt_t = T.sqrt();
    let df = (-r * T).exp();
    let (d1, d2) = d1_d2(S, K, T, r, sigma);
    let pdf_d1 = norm_pdf(d1);

    let gamma = pdf_d1 / (S * sigma * sqrt_t);
    let vega = S * pdf_d1 * sqrt_t / 100.0;
    let decay = -S * pdf_d1 * sigma / (2.0 * sqrt_t);

    let greeks = match kind {
        OptionKind::Call => Greeks {
            delta: norm_cdf(d1),
            gamma,
            theta: (decay - r * K * df * norm_cdf(d2)) / DAYS_PER_YEAR,
            vega,
            rho: K * T * df * norm_cdf(d2) / 100.0,
        },
        OptionKind::Put => Greeks {
            delta: norm_cdf(d1) - 1.0,
            gamma,
            theta: (decay + r * K * df * norm_cdf(-d2)) / DAYS_PER_YEAR,
            vega,
            rho: -K * T * df * norm_cdf(-d2) / 100.0,
        },
    };

    Ok(greeks)
}
