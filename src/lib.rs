//! # Volsurface-Lib: Option Pricing, Implied Volatility and Volatility Surfaces
//!
//! `volsurface-lib` is the quantitative core of an options analytics platform. It prices
//! European options under Black-Scholes, computes their Greeks, recovers implied
//! volatilities from market prices and fits a smooth implied-volatility surface over
//! strike and expiry.
//!
//! ## Core Features
//!
//! - **Black-Scholes Pricing**: closed-form call/put prices and Delta, Gamma, Theta, Vega, Rho
//! - **Implied Volatility**: bracketed Brent root finding with an explicit "no solution" outcome
//! - **Surface Fitting**: bivariate smoothing splines with a data-driven degree policy and
//!   1-D fallbacks for degenerate inputs
//! - **Chain Calibration**: from a per-date option chain sample to a fitted surface
//!
//! ## Quick Start
//!
//! ```rust
//! use volsurface_lib::{fit_surface, implied_volatility, price, OptionKind, SurfaceModel};
//!
//! // Price a one-year at-the-money call
//! let premium = price(100.0, 100.0, 1.0, 0.05, 0.2, OptionKind::Call)?;
//! assert!((premium - 10.4506).abs() < 1e-3);
//!
//! // Back out the volatility
//! let sigma = implied_volatility(premium, 100.0, 100.0, 1.0, 0.05, OptionKind::Call)?;
//! assert!((sigma.value().unwrap() - 0.2).abs() < 1e-6);
//!
//! // Fit a surface to scattered observations
//! let surface = fit_surface(
//!     &[90.0, 100.0, 110.0, 95.0, 105.0, 115.0],
//!     &[0.5, 0.5, 0.5, 1.0, 1.0, 1.0],
//!     &[0.22, 0.20, 0.21, 0.25, 0.22, 0.23],
//!     0.1,
//! )?;
//! let iv = surface.evaluate(102.0, 0.75);
//! assert!(iv > 0.2 && iv < 0.25);
//! # Ok::<(), volsurface_lib::PricingError>(())
//! ```
//!
//! ## Configuration Presets
//!
//! The library provides several engine configuration presets:
//! - `production()`: Tight solver tolerance, generous knot budget
//! - `fast()`: Balanced speed/accuracy for development
//! - `research()`: Wide volatility bracket, near-interpolating surfaces
//! - `minimal()`: Quick validation settings

// ================================================================================================
// MODULES
// ================================================================================================

pub mod calibration;
pub mod error;
pub mod models;

// ================================================================================================
// IMPORTS
// ================================================================================================

use std::path::Path;

use anyhow::{Context, Result};

// ================================================================================================
// PUBLIC RE-EXPORTS
// ================================================================================================

// Errors
pub use error::PricingError;

// Configuration and market data
pub use calibration::{
    config::{EngineConfig, SolverConfig, SurfaceConfig},
    pipeline::{calibrate_surface, collect_implied_vols, price_with_surface, CalibratedSurface},
    sample::{year_fraction, ChainSample, OptionSample},
    types::{CalibrationSet, PricingResult},
};

// Black-Scholes pricer and implied-volatility solver
pub use models::bs::{
    greeks, implied_volatility, implied_volatility_with_config, price, Greek, Greeks, ImpliedVol,
    Observation, OptionKind, OptionQuote,
};

// Volatility surface
pub use models::surface::{
    fit_surface, fit_surface_with_config, BivariateSpline, FitReport, LinearSlice,
    SurfaceAdvisory, VolatilitySurface,
};
pub use models::traits::SurfaceModel;

// ================================================================================================
// DEFAULT CONFIGURATIONS
// ================================================================================================

/// Pre-configured engine settings for common use cases.
///
/// # Available Configurations
///
/// - [`production()`]: Production-grade settings for live pricing
/// - [`fast()`]: Development-optimized settings
/// - [`research()`]: High-precision settings for research
/// - [`minimal()`]: Quick validation settings
pub mod default_configs {
    use crate::calibration::config::EngineConfig;

    /// Production-grade configuration for live pricing systems.
    ///
    /// **Characteristics:**
    /// - Solver tolerance: 1e-12, up to 200 Brent iterations
    /// - Up to 64 knot insertions per surface
    ///
    /// # Example
    ///
    /// ```rust
    /// use volsurface_lib::default_configs;
    ///
    /// let config = default_configs::production();
    /// assert_eq!(config.solver.max_iterations, 200);
    /// ```
    pub fn production() -> EngineConfig {
        EngineConfig::production()
    }

    /// Fast configuration for development and testing.
    ///
    /// **Characteristics:**
    /// - Solver tolerance: 1e-8, up to 60 Brent iterations
    /// - Up to 16 knot insertions per surface
    pub fn fast() -> EngineConfig {
        EngineConfig::fast()
    }

    /// High-precision configuration for research and backtesting.
    ///
    /// **Characteristics:**
    /// - Volatility bracket [1e-8, 10.0], solver tolerance 1e-14
    /// - Smoothing 1e-4 with up to 128 knot insertions, so surfaces nearly interpolate
    pub fn research() -> EngineConfig {
        EngineConfig::research()
    }

    /// Minimal configuration for quick validation and debugging.
    ///
    /// **Characteristics:**
    /// - Solver tolerance: 1e-6, up to 30 Brent iterations
    /// - No knot insertion: surfaces stay tensor-product polynomials
    pub fn minimal() -> EngineConfig {
        EngineConfig::minimal()
    }
}

/// Load a chain sample from a JSON file and calibrate a surface to it.
///
/// # Errors
///
/// * `anyhow::Error` if the file cannot be read or parsed
/// * `anyhow::Error` wrapping [`PricingError`] if the configuration is invalid or too few
///   quotes yield an implied volatility to fit a surface
///
/// # Example
///
/// ```rust,no_run
/// use volsurface_lib::{calibrate_surface_from_path, default_configs, SurfaceModel};
///
/// let calibrated = calibrate_surface_from_path("AAPL_2023-09-19.json", &default_configs::fast())?;
/// println!("{} points, {} rejected", calibrated.points.len(), calibrated.rejected);
/// println!("ATM 1y IV: {:.4}", calibrated.surface.evaluate(180.0, 1.0));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn calibrate_surface_from_path(
    path: impl AsRef<Path>,
    config: &EngineConfig,
) -> Result<CalibratedSurface> {
    let path = path.as_ref();
    let sample = ChainSample::from_path(path)?;
    calibrate_surface(&sample, config)
        .with_context(|| format!("failed to calibrate surface for {}", path.display()))
}
