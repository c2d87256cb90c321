// demos/pricing_demo.rs

//! Demonstration of Black-Scholes pricing, Greeks and implied volatility
//!
//! This example shows how to:
//! 1. Price calls and puts and read their Greeks
//! 2. Recover the implied volatility from a market price
//! 3. Handle prices no volatility can reproduce
//! 4. Reprice a small chain off a fitted surface

use anyhow::Result;
use volsurface_lib::{
    fit_surface, greeks, implied_volatility, price, price_with_surface, ImpliedVol, OptionKind,
    OptionQuote,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("Black-Scholes Pricing Demo");
    println!("==========================");

    let (spot, strike, expiry, rate, sigma) = (100.0, 100.0, 1.0, 0.05, 0.2);
    println!(
        "S = {spot}, K = {strike}, T = {expiry}y, r = {:.1}%, sigma = {:.1}%",
        rate * 100.0,
        sigma * 100.0
    );

    println!("\nStep 1: Prices and Greeks");
    println!(
        "{:<6} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Kind", "Price", "Delta", "Gamma", "Theta", "Vega", "Rho"
    );
    println!("{}", "-".repeat(72));
    for kind in [OptionKind::Call, OptionKind::Put] {
        let p = price(spot, strike, expiry, rate, sigma, kind)?;
        let g = greeks(spot, strike, expiry, rate, sigma, kind)?;
        println!(
            "{:<6} {:>10.4} {:>10.4} {:>10.5} {:>10.5} {:>10.4} {:>10.4}",
            kind, p, g.delta, g.gamma, g.theta, g.vega, g.rho
        );
    }

    println!("\nStep 2: Implied volatility from market prices");
    for (kind, market) in [
        (OptionKind::Call, 10.45),
        (OptionKind::Put, 5.57),
        (OptionKind::Call, 1000.0),
    ] {
        match implied_volatility(market, spot, strike, expiry, rate, kind)? {
            ImpliedVol::Converged(iv) => {
                println!("  {kind} @ {market:>8.2}: IV = {:.4}%", iv * 100.0)
            }
            ImpliedVol::NotFound => {
                println!("  {kind} @ {market:>8.2}: no volatility reproduces this price")
            }
        }
    }

    println!("\nStep 3: Pricing off a fitted surface");
    let surface = fit_surface(
        &[90.0, 100.0, 110.0, 95.0, 105.0, 115.0],
        &[0.5, 0.5, 0.5, 1.0, 1.0, 1.0],
        &[0.22, 0.20, 0.21, 0.25, 0.22, 0.23],
        0.1,
    )?;

    let quotes: Vec<OptionQuote> = [95.0, 100.0, 105.0, 110.0]
        .iter()
        .flat_map(|&k| {
            [OptionKind::Call, OptionKind::Put]
                .into_iter()
                .map(move |kind| OptionQuote::with_volatility(kind, spot, k, 0.75, rate, 0.0))
        })
        .collect();
    let results = price_with_surface(&surface, &quotes);

    println!(
        "{:<6} {:<8} {:<12} {:<12}",
        "Kind", "Strike", "Model IV", "Model Price"
    );
    println!("{}", "-".repeat(40));
    for result in &results {
        println!(
            "{:<6} {:<8.1} {:<12.4} {:<12.4}",
            result.kind,
            result.strike,
            result.model_iv * 100.0,
            result.model_price
        );
    }

    Ok(())
}
