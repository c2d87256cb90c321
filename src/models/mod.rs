pub mod bs;
pub mod surface;

/// Common traits used by all surface models
pub mod traits {
    /// A fitted implied-volatility surface σ(K, T).
    ///
    /// Implementations are immutable once built, so a single surface can be
    /// evaluated from many threads at once.
    pub trait SurfaceModel: Send + Sync {
        /// Implied volatility at `strike` and `expiry` (years).
        fn evaluate(&self, strike: f64, expiry: f64) -> f64;

        /// Evaluate a batch of `(strike, expiry)` points.
        fn evaluate_many(&self, points: &[(f64, f64)]) -> Vec<f64> {
            points
                .iter()
                .map(|&(strike, expiry)| self.evaluate(strike, expiry))
                .collect()
        }
    }
}

/// Utility functions for option pricing and calculations
pub mod utils {
    use crate::models::bs::OptionKind;

    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

    /// Standard normal cumulative distribution function.
    pub fn norm_cdf(x: f64) -> f64 {
        // 0.5 * [1 + erf(x / sqrt(2))]
        0.5 * (1.0 + libm::erf(x / std::f64::consts::SQRT_2))
    }

    /// Standard normal probability density function.
    pub fn norm_pdf(x: f64) -> f64 {
        INV_SQRT_2PI * (-0.5 * x * x).exp()
    }

    /// Payoff of the option if exercised now.
    pub fn intrinsic_value(kind: OptionKind, spot: f64, strike: f64) -> f64 {
        match kind {
            OptionKind::Call => (spot - strike).max(0.0),
            OptionKind::Put => (strike - spot).max(0.0),
        }
    }

}
