use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calibration::config::SolverConfig;
use crate::error::{PricingError, Result};
use crate::models::utils::intrinsic_value;

use super::implied::{implied_volatility_with_config, ImpliedVol};
use super::pricer::{greeks, price};

/// Option type: call or put
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKind::Call => "call",
            OptionKind::Put => "put",
        }
    }
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKind {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" => Ok(OptionKind::Call),
            "put" => Ok(OptionKind::Put),
            _ => Err(PricingError::invalid(r#"option kind must be "call" or "put""#)),
        }
    }
}

/// What was observed in the market for a quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Observation {
    /// Option premium (e.g. bid/ask midpoint)
    Price(f64),
    /// Annualised implied volatility (as decimal, e.g. 0.25 for 25%)
    Volatility(f64),
}

/// A single option quote, valued transiently by the pricer or the solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    /// Underlying price
    pub spot: f64,
    /// Strike price
    pub strike: f64,
    /// Time to expiration in years (0 means expiring now)
    pub expiry: f64,
    /// Continuously compounded risk-free rate
    pub rate: f64,
    pub kind: OptionKind,
    pub observation: Observation,
}

impl OptionQuote {
    pub fn with_price(
        kind: OptionKind,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        market_price: f64,
    ) -> Self {
        Self {
            spot,
            strike,
            expiry,
            rate,
            kind,
            observation: Observation::Price(market_price),
        }
    }

    pub fn with_volatility(
        kind: OptionKind,
        spot: f64,
        strike: f64,
        expiry: f64,
        rate: f64,
        volatility: f64,
    ) -> Self {
        Self {
            spot,
            strike,
            expiry,
            rate,
            kind,
            observation: Observation::Volatility(volatility),
        }
    }

    /// Payoff if exercised immediately.
    pub fn intrinsic_value(&self) -> f64 {
        intrinsic_value(self.kind, self.spot, self.strike)
    }

    /// Market price if observed, otherwise the model price at the observed volatility.
    pub fn model_price(&self) -> Result<f64> {
        match self.observation {
            Observation::Price(p) => Ok(p),
            Observation::Volatility(sigma) => price(
                self.spot,
                self.strike,
                self.expiry,
                self.rate,
                sigma,
                self.kind,
            ),
        }
    }

    /// Observed volatility, or the one solved from the observed price.
    pub fn implied_volatility(&self, config: &SolverConfig) -> Result<ImpliedVol> {
        match self.observation {
            Observation::Volatility(sigma) => Ok(ImpliedVol::Converged(sigma)),
            Observation::Price(p) => implied_volatility_with_config(
                p,
                self.spot,
                self.strike,
                self.expiry,
                self.rate,
                self.kind,
                config,
            ),
        }
    }

    /// Greeks at the observed (or implied) volatility. `None` when the
    /// volatility cannot be recovered from the observed price.
    pub fn greeks(&self, config: &SolverConfig) -> Result<Option<Greeks>> {
        match self.implied_volatility(config)?.value() {
            Some(sigma) => greeks(
                self.spot,
                self.strike,
                self.expiry,
                self.rate,
                sigma,
                self.kind,
            )
            .map(Some),
            None => Ok(None),
        }
    }
}

/// Names of the five first/second-order sensitivities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Greek {
    Delta,
    Gamma,
    Theta,
    Vega,
    Rho,
}

impl Greek {
    pub const ALL: [Greek; 5] = [
        Greek::Delta,
        Greek::Gamma,
        Greek::Theta,
        Greek::Vega,
        Greek::Rho,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Greek::Delta => "Delta",
            Greek::Gamma => "Gamma",
            Greek::Theta => "Theta",
            Greek::Vega => "Vega",
            Greek::Rho => "Rho",
        }
    }
}

impl fmt::Display for Greek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Black-Scholes sensitivities of a single option.
///
/// Theta is per calendar day, vega per volatility point (1%) and rho per rate
/// point (1%), matching how option chains are usually quoted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    pub fn get(&self, greek: Greek) -> f64 {
        match greek {
            Greek::Delta => self.delta,
            Greek::Gamma => self.gamma,
            Greek::Theta => self.theta,
            Greek::Vega => self.vega,
            Greek::Rho => self.rho,
        }
    }

    /// `(name, value)` pairs in `Greek::ALL` order.
    pub fn iter(&self) -> impl Iterator<Item = (Greek, f64)> + '_ {
        Greek::ALL.into_iter().map(move |g| (g, self.get(g)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn option_kind_parsing() {
        assert_eq!("call".parse::<OptionKind>().unwrap(), OptionKind::Call);
        assert_eq!(" PUT ".parse::<OptionKind>().unwrap(), OptionKind::Put);

        let err = "invalid".parse::<OptionKind>().unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains(r#"option kind must be "call" or "put""#));
    }

    #[test]
    fn option_kind_serde_is_lowercase() {
        let json = serde_json::to_string(&OptionKind::Put).unwrap();
        assert_eq!(json, "\"put\"");
    }

    #[test]
    fn quote_dispatches_on_observation() {
        let cfg = SolverConfig::default();
        let by_vol = OptionQuote::with_volatility(OptionKind::Call, 100.0, 100.0, 1.0, 0.05, 0.2);
        let premium = by_vol.model_price().unwrap();
        assert_abs_diff_eq!(premium, 10.4506, epsilon = 1e-4);

        let by_price = OptionQuote::with_price(OptionKind::Call, 100.0, 100.0, 1.0, 0.05, premium);
        let sigma = by_price.implied_volatility(&cfg).unwrap().value().unwrap();
        assert_abs_diff_eq!(sigma, 0.2, epsilon = 1e-6);

        let g = by_price.greeks(&cfg).unwrap().unwrap();
        assert_abs_diff_eq!(g.delta, by_vol.greeks(&cfg).unwrap().unwrap().delta, epsilon = 1e-6);
    }

    #[test]
    fn quote_greeks_absent_without_solution() {
        let quote = OptionQuote::with_price(OptionKind::Call, 100.0, 100.0, 1.0, 0.05, 1000.0);
        assert!(quote.greeks(&SolverConfig::default()).unwrap().is_none());
    }

    #[test]
    fn greeks_mapping_access() {
        let g = Greeks {
            delta: 0.5,
            gamma: 0.01,
            theta: -0.02,
            vega: 0.3,
            rho: 0.4,
        };
        let names: Vec<&str> = g.iter().map(|(greek, _)| greek.name()).collect();
        assert_eq!(names, vec!["Delta", "Gamma", "Theta", "Vega", "Rho"]);
        assert_eq!(g.get(Greek::Theta), -0.02);
    }
}
