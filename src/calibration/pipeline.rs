use std::cmp::Ordering;

use tracing::{debug, info, warn};

use crate::calibration::config::{EngineConfig, SolverConfig};
use crate::calibration::sample::ChainSample;
use crate::calibration::types::{CalibrationSet, PricingResult};
use crate::error::Result;
use crate::models::bs::{price, ImpliedVol, Observation, OptionQuote};
use crate::models::surface::{fit_surface_with_config, VolatilitySurface};
use crate::models::traits::SurfaceModel;

/// A surface fitted to a chain, with the points it was fitted on
#[derive(Debug, Clone)]
pub struct CalibratedSurface {
    pub surface: VolatilitySurface,
    pub points: CalibrationSet,
    /// Quotes dropped before fitting (expired, unpriced, or without an implied volatility)
    pub rejected: usize,
}

/// Solve the implied volatility of every quote.
///
/// Expired contracts, non-positive prices and quotes outside the model's price
/// range are skipped and counted rather than failing the batch.
///
/// # Errors
///
/// Propagates [`PricingError::InvalidArgument`](crate::PricingError) for
/// malformed quotes (negative expiry, non-positive spot or strike).
pub fn collect_implied_vols(
    quotes: &[OptionQuote],
    solver: &SolverConfig,
) -> Result<(CalibrationSet, usize)> {
    let mut set = CalibrationSet::with_capacity(quotes.len());
    let mut rejected = 0;

    for quote in quotes {
        if quote.expiry <= 0.0 {
            rejected += 1;
            continue;
        }
        if let Observation::Price(p) = quote.observation {
            if p <= 0.0 {
                rejected += 1;
                continue;
            }
        }

        match quote.implied_volatility(solver)? {
            ImpliedVol::Converged(sigma) => set.push(quote.strike, quote.expiry, sigma),
            ImpliedVol::NotFound => {
                debug!(
                    kind = %quote.kind,
                    strike = quote.strike,
                    expiry = quote.expiry,
                    "no implied volatility for quote"
                );
                rejected += 1;
            }
        }
    }

    if rejected > 0 {
        warn!(
            rejected,
            kept = set.len(),
            "quotes rejected while solving implied volatilities"
        );
    }
    Ok((set, rejected))
}

/// Implied volatilities for a whole chain sample, then a fitted surface.
pub fn calibrate_surface(sample: &ChainSample, config: &EngineConfig) -> Result<CalibratedSurface> {
    config.validate()?;

    let quotes = sample.quotes(config.risk_free_rate);
    let (points, rejected) = collect_implied_vols(&quotes, &config.solver)?;
    let surface = fit_surface_with_config(
        &points.strikes,
        &points.expiries,
        &points.ivs,
        &config.surface,
    )?;

    info!(
        symbol = %sample.symbol,
        date = %sample.date,
        points = points.len(),
        rejected,
        rms = surface.report().rms_residual,
        "surface calibrated"
    );

    Ok(CalibratedSurface {
        surface,
        points,
        rejected,
    })
}

/// Price options at the implied volatilities read off a fitted surface.
///
/// Each quote is discounted at its own `rate`. Results are sorted by strike
/// price in ascending order. Quotes the pricer rejects get a zero price and
/// volatility, as do points where the surface returns a negative volatility.
pub fn price_with_surface<S: SurfaceModel + ?Sized>(
    surface: &S,
    quotes: &[OptionQuote],
) -> Vec<PricingResult> {
    let mut results: Vec<PricingResult> = quotes
        .iter()
        .map(|q| {
            let model_iv = surface.evaluate(q.strike, q.expiry);
            let model_price = if model_iv >= 0.0 {
                price(q.spot, q.strike, q.expiry, q.rate, model_iv, q.kind).ok()
            } else {
                None
            };

            match model_price {
                Some(model_price) => PricingResult {
                    kind: q.kind,
                    strike: q.strike,
                    spot: q.spot,
                    expiry: q.expiry,
                    model_price,
                    model_iv,
                },
                None => {
                    debug!(strike = q.strike, expiry = q.expiry, model_iv, "quote not priceable");
                    PricingResult {
                        kind: q.kind,
                        strike: q.strike,
                        spot: q.spot,
                        expiry: q.expiry,
                        model_price: 0.0,
                        model_iv: 0.0,
                    }
                }
            }
        })
        .collect();

    results.sort_by(|a, b| a.strike.partial_cmp(&b.strike).unwrap_or(Ordering::Equal));
    results
}
