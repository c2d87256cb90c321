use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};

/// Implied-volatility solver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Lower end of the volatility search bracket
    #[serde(default = "default_min_vol")]
    pub min_vol: f64,
    /// Upper end of the volatility search bracket (5.0 = 500% annualised)
    #[serde(default = "default_max_vol")]
    pub max_vol: f64,
    /// Convergence tolerance on both the price residual and the bracket width
    #[serde(default = "default_solver_tolerance")]
    pub tolerance: f64,
    /// Iteration budget for Brent's method
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            min_vol: default_min_vol(),
            max_vol: default_max_vol(),
            tolerance: default_solver_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_vol > 0.0 && self.min_vol < self.max_vol && self.max_vol.is_finite()) {
            return Err(PricingError::invalid(format!(
                "solver bracket must satisfy 0 < min_vol < max_vol, got [{}, {}]",
                self.min_vol, self.max_vol
            )));
        }
        if !(self.tolerance > 0.0) {
            return Err(PricingError::invalid(format!(
                "solver tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(PricingError::invalid("solver needs at least one iteration"));
        }
        Ok(())
    }
}

/// Surface fitting policy
///
/// The degree thresholds are a heuristic: linear below `quadratic_min_points`
/// observations, quadratic below `cubic_min_points`, cubic above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Smoothing factor: upper bound on the residual sum of squares
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
    #[serde(default = "default_min_points")]
    pub min_points: usize,
    #[serde(default = "default_quadratic_min_points")]
    pub quadratic_min_points: usize,
    #[serde(default = "default_cubic_min_points")]
    pub cubic_min_points: usize,
    /// Cap on interior knots added while the fit is rougher than `smoothing`
    #[serde(default = "default_max_knot_insertions")]
    pub max_knot_insertions: usize,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            smoothing: default_smoothing(),
            min_points: default_min_points(),
            quadratic_min_points: default_quadratic_min_points(),
            cubic_min_points: default_cubic_min_points(),
            max_knot_insertions: default_max_knot_insertions(),
        }
    }
}

impl SurfaceConfig {
    /// Spline degree used on both axes for `num_points` observations
    pub fn degree_for(&self, num_points: usize) -> usize {
        if num_points < self.quadratic_min_points {
            1
        } else if num_points < self.cubic_min_points {
            2
        } else {
            3
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.smoothing >= 0.0 && self.smoothing.is_finite()) {
            return Err(PricingError::invalid(format!(
                "smoothing must be non-negative and finite, got {}",
                self.smoothing
            )));
        }
        // A degree-d tensor spline has (d + 1)^2 coefficients
        if self.min_points < 4 || self.quadratic_min_points < 9 || self.cubic_min_points < 16 {
            return Err(PricingError::invalid(format!(
                "point thresholds ({}, {}, {}) cannot determine their spline degrees",
                self.min_points, self.quadratic_min_points, self.cubic_min_points
            )));
        }
        if self.quadratic_min_points > self.cubic_min_points {
            return Err(PricingError::invalid(
                "quadratic_min_points must not exceed cubic_min_points",
            ));
        }
        Ok(())
    }
}

/// Top-level engine configuration, loadable from TOML
///
/// ```rust
/// use volsurface_lib::EngineConfig;
///
/// let config = EngineConfig::from_toml_str(r#"
///     risk_free_rate = 0.055
///
///     [surface]
///     smoothing = 0.05
/// "#)?;
/// assert_eq!(config.surface.smoothing, 0.05);
/// assert_eq!(config.solver.max_vol, 5.0);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Flat continuously compounded risk-free rate
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    #[serde(default)]
    pub solver: SolverConfig,

    #[serde(default)]
    pub surface: SurfaceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: default_risk_free_rate(),
            solver: SolverConfig::default(),
            surface: SurfaceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Tight solver tolerance and a generous knot budget for live use
    pub fn production() -> Self {
        Self {
            solver: SolverConfig {
                tolerance: 1e-12,
                max_iterations: 200,
                ..SolverConfig::default()
            },
            surface: SurfaceConfig {
                max_knot_insertions: 64,
                ..SurfaceConfig::default()
            },
            ..Self::default()
        }
    }

    /// Balanced settings for development
    pub fn fast() -> Self {
        Self {
            solver: SolverConfig {
                tolerance: 1e-8,
                max_iterations: 60,
                ..SolverConfig::default()
            },
            surface: SurfaceConfig {
                max_knot_insertions: 16,
                ..SurfaceConfig::default()
            },
            ..Self::default()
        }
    }

    /// Wide volatility bracket and near-interpolating surfaces
    pub fn research() -> Self {
        Self {
            solver: SolverConfig {
                min_vol: 1e-8,
                max_vol: 10.0,
                tolerance: 1e-14,
                max_iterations: 500,
            },
            surface: SurfaceConfig {
                smoothing: 1e-4,
                max_knot_insertions: 128,
                ..SurfaceConfig::default()
            },
            ..Self::default()
        }
    }

    /// Quick validation settings
    pub fn minimal() -> Self {
        Self {
            solver: SolverConfig {
                tolerance: 1e-6,
                max_iterations: 30,
                ..SolverConfig::default()
            },
            surface: SurfaceConfig {
                max_knot_insertions: 0,
                ..SurfaceConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(PricingError::invalid(format!(
                "risk_free_rate must be finite, got {}",
                self.risk_free_rate
            )));
        }
        self.solver.validate()?;
        self.surface.validate()
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to serialise engine config")
    }
}

fn default_min_vol() -> f64 {
    1e-6
}

fn default_max_vol() -> f64 {
    5.0
}

fn default_solver_tolerance() -> f64 {
    1e-10
}

fn default_max_iterations() -> usize {
    100
}

fn default_smoothing() -> f64 {
    0.1
}

fn default_min_points() -> usize {
    4
}

fn default_quadratic_min_points() -> usize {
    9
}

fn default_cubic_min_points() -> usize {
    16
}

fn default_max_knot_insertions() -> usize {
    32
}

fn default_risk_free_rate() -> f64 {
    0.05
}
