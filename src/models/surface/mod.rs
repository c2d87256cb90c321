//! Implied-volatility surface fitting
//!
//! Turns a scattered cloud of `(strike, expiry, iv)` observations into a
//! continuous surface σ(K, T). The representation is chosen once, at
//! construction time:
//!
//! - [`VolatilitySurface::Spline`]: a bivariate smoothing spline whose degree
//!   follows the sample-count policy in [`SurfaceConfig`];
//! - [`VolatilitySurface::ExpiryOnly`] / [`VolatilitySurface::StrikeOnly`]:
//!   a 1-D linear interpolant when every observation shares one strike or one
//!   expiry. These carry a [`SurfaceAdvisory`], which is also logged.
//!
//! # Example
//!
//! ```rust
//! use volsurface_lib::{fit_surface, SurfaceModel};
//!
//! let strikes = [90.0, 100.0, 110.0, 95.0, 105.0, 115.0];
//! let expiries = [0.5, 0.5, 0.5, 1.0, 1.0, 1.0];
//! let ivs = [0.22, 0.20, 0.21, 0.25, 0.22, 0.23];
//!
//! let surface = fit_surface(&strikes, &expiries, &ivs, 0.1)?;
//! let iv = surface.evaluate(102.0, 0.75);
//! assert!(iv > 0.20 && iv < 0.25);
//! assert!(surface.advisory().is_none());
//! # Ok::<(), volsurface_lib::PricingError>(())
//! ```

pub mod linear;
pub mod spline;

use std::fmt;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

use crate::calibration::config::SurfaceConfig;
use crate::error::{PricingError, Result};
use crate::models::traits::SurfaceModel;

pub use linear::LinearSlice;
pub use spline::BivariateSpline;

/// Non-fatal notice that the fit fell back to a lower-dimensional interpolant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SurfaceAdvisory {
    /// Every observation shares this strike; the surface varies with expiry only
    SingleStrike { strike: f64 },
    /// Every observation shares this expiry; the surface varies with strike only
    SingleExpiry { expiry: f64 },
}

impl fmt::Display for SurfaceAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceAdvisory::SingleStrike { .. } => f.write_str(
                "Only one unique strike price detected. Defaulting to 1D interpolation.",
            ),
            SurfaceAdvisory::SingleExpiry { .. } => {
                f.write_str("Only one unique expiry detected. Defaulting to 1D interpolation.")
            }
        }
    }
}

/// Goodness-of-fit summary computed on the input observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub points: usize,
    /// Spline degree per axis (strike, expiry); `(1, 0)` or `(0, 1)` for 1-D fallbacks
    pub degree: (usize, usize),
    /// Interior knots per axis (strike, expiry)
    pub interior_knots: (usize, usize),
    pub residual_sum_squares: f64,
    pub rms_residual: f64,
    pub max_abs_residual: f64,
}

/// A fitted implied-volatility surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VolatilitySurface {
    /// Bivariate smoothing spline over (strike, expiry)
    Spline {
        spline: BivariateSpline,
        report: FitReport,
    },
    /// Single observed strike: linear in expiry, constant in strike
    ExpiryOnly {
        strike: f64,
        slice: LinearSlice,
        report: FitReport,
    },
    /// Single observed expiry: linear in strike, constant in expiry
    StrikeOnly {
        expiry: f64,
        slice: LinearSlice,
        report: FitReport,
    },
}

impl VolatilitySurface {
    /// The degenerate-input advisory, if the fit fell back to 1-D interpolation.
    pub fn advisory(&self) -> Option<SurfaceAdvisory> {
        match self {
            VolatilitySurface::Spline { .. } => None,
            VolatilitySurface::ExpiryOnly { strike, .. } => {
                Some(SurfaceAdvisory::SingleStrike { strike: *strike })
            }
            VolatilitySurface::StrikeOnly { expiry, .. } => {
                Some(SurfaceAdvisory::SingleExpiry { expiry: *expiry })
            }
        }
    }

    pub fn report(&self) -> &FitReport {
        match self {
            VolatilitySurface::Spline { report, .. }
            | VolatilitySurface::ExpiryOnly { report, .. }
            | VolatilitySurface::StrikeOnly { report, .. } => report,
        }
    }

    pub fn is_spline(&self) -> bool {
        matches!(self, VolatilitySurface::Spline { .. })
    }
}

impl SurfaceModel for VolatilitySurface {
    fn evaluate(&self, strike: f64, expiry: f64) -> f64 {
        match self {
            VolatilitySurface::Spline { spline, .. } => spline.evaluate(strike, expiry),
            VolatilitySurface::ExpiryOnly { slice, .. } => slice.evaluate(expiry),
            VolatilitySurface::StrikeOnly { slice, .. } => slice.evaluate(strike),
        }
    }
}

/// Fit a surface with the default policy and the given smoothing factor.
///
/// Larger `smoothing` gives a smoother surface that follows the data less
/// closely; `0.1` is the customary default.
///
/// # Errors
///
/// [`PricingError::InvalidArgument`] if the sequences differ in length, hold
/// fewer than 4 points, or contain non-finite values.
pub fn fit_surface(
    strikes: &[f64],
    expiries: &[f64],
    market_ivs: &[f64],
    smoothing: f64,
) -> Result<VolatilitySurface> {
    let config = SurfaceConfig {
        smoothing,
        ..SurfaceConfig::default()
    };
    fit_surface_with_config(strikes, expiries, market_ivs, &config)
}

/// Fit a surface with an explicit [`SurfaceConfig`].
pub fn fit_surface_with_config(
    strikes: &[f64],
    expiries: &[f64],
    market_ivs: &[f64],
    config: &SurfaceConfig,
) -> Result<VolatilitySurface> {
    if !(strikes.len() == expiries.len() && expiries.len() == market_ivs.len()) {
        return Err(PricingError::invalid(
            r#"Input arrays "strikes", "expiries", and "market_ivs" must have the same length."#,
        ));
    }
    config.validate()?;

    let num_points = strikes.len();
    if num_points < config.min_points {
        return Err(PricingError::invalid(format!(
            "At least {} data points are required to fit a volatility surface.",
            config.min_points
        )));
    }
    let all_finite = strikes
        .iter()
        .chain(expiries)
        .chain(market_ivs)
        .all(|v| v.is_finite());
    if !all_finite {
        return Err(PricingError::invalid(
            "strikes, expiries and market_ivs must all be finite",
        ));
    }

    let unique_strikes = count_unique(strikes);
    let unique_expiries = count_unique(expiries);

    if unique_strikes == 1 {
        let slice = LinearSlice::new(expiries, market_ivs)?;
        let surface = VolatilitySurface::ExpiryOnly {
            strike: strikes[0],
            report: report_for(strikes, expiries, market_ivs, (0, 1), (0, 0), |_, t| {
                slice.evaluate(t)
            }),
            slice,
        };
        warn_advisory(&surface);
        return Ok(surface);
    }

    if unique_expiries == 1 {
        let slice = LinearSlice::new(strikes, market_ivs)?;
        let surface = VolatilitySurface::StrikeOnly {
            expiry: expiries[0],
            report: report_for(strikes, expiries, market_ivs, (1, 0), (0, 0), |k, _| {
                slice.evaluate(k)
            }),
            slice,
        };
        warn_advisory(&surface);
        return Ok(surface);
    }

    let degree = config.degree_for(num_points);
    // An axis with u distinct values supports at most degree u - 1
    let kx = degree.min(unique_strikes - 1);
    let ky = degree.min(unique_expiries - 1);
    debug!(
        num_points,
        degree, kx, ky, smoothing = config.smoothing, "fitting bivariate spline"
    );

    let spline = BivariateSpline::fit(
        strikes,
        expiries,
        market_ivs,
        kx,
        ky,
        config.smoothing,
        config.max_knot_insertions,
    )?;
    let report = report_for(
        strikes,
        expiries,
        market_ivs,
        spline.degrees(),
        spline.interior_knots(),
        |k, t| spline.evaluate(k, t),
    );

    Ok(VolatilitySurface::Spline { spline, report })
}

fn warn_advisory(surface: &VolatilitySurface) {
    if let Some(advisory) = surface.advisory() {
        warn!(?advisory, "{}", advisory);
    }
}

fn count_unique(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

fn report_for(
    strikes: &[f64],
    expiries: &[f64],
    market_ivs: &[f64],
    degree: (usize, usize),
    interior_knots: (usize, usize),
    eval: impl Fn(f64, f64) -> f64,
) -> FitReport {
    let residuals: Vec<f64> = strikes
        .iter()
        .zip(expiries)
        .zip(market_ivs)
        .map(|((&k, &t), &iv)| eval(k, t) - iv)
        .collect();

    FitReport {
        points: residuals.len(),
        degree,
        interior_knots,
        residual_sum_squares: residuals.iter().map(|r| r * r).sum(),
        rms_residual: residuals.iter().quadratic_mean(),
        max_abs_residual: residuals.iter().abs_max(),
    }
}
