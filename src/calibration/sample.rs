//! Per-symbol, per-date option chain sample
//!
//! This is the record handed over by the market-data layer: one snapshot of
//! every listed call and put for an underlying on an as-of date, together with
//! the underlying's open and close. The engine reads strikes, expiries,
//! bid/ask midpoints and the close; quoted IVs and Greeks are kept for
//! comparison with the model.
//!
//! ```json
//! {
//!   "symbol": "AAPL",
//!   "date": "2023-09-19",
//!   "symbol_open": 177.52,
//!   "symbol_close": 179.07,
//!   "calls": [{ "expiration": "2023-10-20", "strike": 180.0, "bid": 4.1, "ask": 4.2,
//!               "implied_volatility": 0.22, "Delta": 0.48, "Gamma": 0.036,
//!               "Theta": -0.08, "Vega": 0.2, "Rho": 0.07 }],
//!   "puts": []
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::bs::{Greeks, OptionKind, OptionQuote};

const DAYS_PER_YEAR: f64 = 365.0;

/// Year fraction between two dates on an actual/365 basis.
pub fn year_fraction(as_of: NaiveDate, expiration: NaiveDate) -> f64 {
    (expiration - as_of).num_days() as f64 / DAYS_PER_YEAR
}

/// One listed contract in a chain sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSample {
    pub expiration: NaiveDate,
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    /// Vendor-quoted implied volatility (as decimal)
    pub implied_volatility: f64,
    #[serde(rename = "Delta")]
    pub delta: f64,
    #[serde(rename = "Gamma")]
    pub gamma: f64,
    #[serde(rename = "Theta")]
    pub theta: f64,
    #[serde(rename = "Vega")]
    pub vega: f64,
    #[serde(rename = "Rho")]
    pub rho: f64,
}

impl OptionSample {
    pub fn mid_price(&self) -> f64 {
        0.5 * (self.bid + self.ask)
    }

    pub fn time_to_expiry(&self, as_of: NaiveDate) -> f64 {
        year_fraction(as_of, self.expiration)
    }

    /// Vendor-quoted Greeks
    pub fn greeks(&self) -> Greeks {
        Greeks {
            delta: self.delta,
            gamma: self.gamma,
            theta: self.theta,
            vega: self.vega,
            rho: self.rho,
        }
    }
}

/// Snapshot of an option chain for one symbol on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSample {
    pub symbol: String,
    /// As-of date of the snapshot
    pub date: NaiveDate,
    pub symbol_open: f64,
    pub symbol_close: f64,
    #[serde(default)]
    pub calls: Vec<OptionSample>,
    #[serde(default)]
    pub puts: Vec<OptionSample>,
}

impl ChainSample {
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        serde_json::from_str(s).context("failed to parse chain sample")
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read chain sample {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("invalid sample in {}", path.display()))
    }

    pub fn ncalls(&self) -> usize {
        self.calls.len()
    }

    pub fn nputs(&self) -> usize {
        self.puts.len()
    }

    /// Spot used for pricing: the underlying's close on the sample date
    pub fn spot(&self) -> f64 {
        self.symbol_close
    }

    /// Contracts of one kind
    pub fn options(&self, kind: OptionKind) -> &[OptionSample] {
        match kind {
            OptionKind::Call => &self.calls,
            OptionKind::Put => &self.puts,
        }
    }

    /// Quote for one contract, observed at its bid/ask midpoint.
    pub fn quote(&self, kind: OptionKind, option: &OptionSample, rate: f64) -> OptionQuote {
        OptionQuote::with_price(
            kind,
            self.spot(),
            option.strike,
            option.time_to_expiry(self.date),
            rate,
            option.mid_price(),
        )
    }

    /// Every call then every put as a price-observed quote.
    pub fn quotes(&self, rate: f64) -> Vec<OptionQuote> {
        [OptionKind::Call, OptionKind::Put]
            .into_iter()
            .flat_map(|kind| {
                self.options(kind)
                    .iter()
                    .map(move |option| self.quote(kind, option, rate))
            })
            .collect()
    }
}
