use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::models::bs::OptionKind;

/// Scattered `(strike, expiry, implied volatility)` observations fed to the surface fitter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSet {
    pub strikes: Vec<f64>,
    /// Time to expiration in years
    pub expiries: Vec<f64>,
    /// Implied volatilities (as decimal, e.g., 0.25 for 25%)
    pub ivs: Vec<f64>,
}

/// One CSV row: `strike,expiry,iv`
#[derive(Debug, Deserialize)]
struct CsvRow {
    strike: f64,
    expiry: f64,
    iv: f64,
}

impl CalibrationSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strikes: Vec::with_capacity(capacity),
            expiries: Vec::with_capacity(capacity),
            ivs: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, strike: f64, expiry: f64, iv: f64) {
        self.strikes.push(strike);
        self.expiries.push(expiry);
        self.ivs.push(iv);
    }

    pub fn len(&self) -> usize {
        self.strikes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strikes.is_empty()
    }

    /// Iterate `(strike, expiry, iv)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.strikes
            .iter()
            .zip(&self.expiries)
            .zip(&self.ivs)
            .map(|((&k, &t), &iv)| (k, t, iv))
    }

    /// Load a headed CSV file with columns `strike,expiry,iv`.
    pub fn from_csv_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let mut set = Self::default();
        for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = result
                .with_context(|| format!("bad record {} in {}", line + 1, path.display()))?;
            set.push(row.strike, row.expiry, row.iv);
        }
        Ok(set)
    }
}

impl FromIterator<(f64, f64, f64)> for CalibrationSet {
    fn from_iter<I: IntoIterator<Item = (f64, f64, f64)>>(iter: I) -> Self {
        let mut set = Self::default();
        for (k, t, iv) in iter {
            set.push(k, t, iv);
        }
        set
    }
}

/// Lightweight struct to hold the essential pricing results for each option
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResult {
    pub kind: OptionKind,
    pub strike: f64,
    pub spot: f64,
    /// Time to expiration in years
    pub expiry: f64,
    /// Model option price
    pub model_price: f64,
    /// Surface implied volatility (as decimal)
    pub model_iv: f64,
}
