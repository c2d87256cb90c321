// Example: plot_iv_smile.rs
// Calibrates a surface to a chain sample JSON file and produces an SVG
// comparing the solved market IVs of one expiration with the surface slice.
//
// Usage:
//     cargo run --example plot_iv_smile -- <sample_json> [expiration YYYY-MM-DD]
//
// Without an expiration the nearest one is plotted. The output image is
// written to iv_smile.svg in the working directory.

use std::env;
use std::error::Error;

use chrono::NaiveDate;
use plotters::prelude::*;
use volsurface_lib::{
    calibrate_surface, default_configs, ChainSample, OptionKind, SurfaceModel,
};

const DEFAULT_SAMPLE: &str = "tests/data/AAPL_2023-09-19.json";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let sample_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_SAMPLE);

    let sample = ChainSample::from_path(sample_path)?;
    println!(
        "Loaded {} calls and {} puts for {} on {}",
        sample.ncalls(),
        sample.nputs(),
        sample.symbol,
        sample.date
    );

    let expiration = match args.get(2) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")?,
        None => sample
            .calls
            .iter()
            .chain(&sample.puts)
            .map(|o| o.expiration)
            .filter(|&e| e > sample.date)
            .min()
            .ok_or("sample has no live expirations")?,
    };

    let mut config = default_configs::fast();
    config.risk_free_rate = 0.055;
    let calibrated = calibrate_surface(&sample, &config)?;
    println!(
        "Surface fitted on {} points ({} rejected), rms residual {:.2e}",
        calibrated.points.len(),
        calibrated.rejected,
        calibrated.surface.report().rms_residual
    );

    // Solved market IVs for the chosen expiration
    let mut call_points = Vec::new();
    let mut put_points = Vec::new();
    let mut t = 0.0;
    for kind in [OptionKind::Call, OptionKind::Put] {
        for option in sample.options(kind).iter().filter(|o| o.expiration == expiration) {
            let quote = sample.quote(kind, option, config.risk_free_rate);
            t = quote.expiry;
            let Some(iv) = quote.implied_volatility(&config.solver)?.value() else {
                continue;
            };
            let point = (option.strike, iv * 100.0);
            match kind {
                OptionKind::Call => call_points.push(point),
                OptionKind::Put => put_points.push(point),
            }
        }
    }
    if call_points.is_empty() && put_points.is_empty() {
        return Err(format!("no solvable quotes expire on {expiration}").into());
    }

    println!("\nStrike | Market IV% | Surface IV% | Diff%");
    for &(strike, iv_pct) in call_points.iter().chain(&put_points) {
        let model = calibrated.surface.evaluate(strike, t) * 100.0;
        println!(
            "{:.1} | {:.2} | {:.2} | {:.2}",
            strike,
            iv_pct,
            model,
            model - iv_pct
        );
    }

    let strikes = call_points.iter().chain(&put_points).map(|p| p.0);
    let min_strike = strikes.clone().fold(f64::INFINITY, f64::min);
    let max_strike = strikes.fold(f64::NEG_INFINITY, f64::max);

    let steps = 250;
    let model_line: Vec<(f64, f64)> = (0..=steps)
        .map(|i| {
            let strike = min_strike + (max_strike - min_strike) * i as f64 / steps as f64;
            (strike, calibrated.surface.evaluate(strike, t) * 100.0)
        })
        .collect();

    let all_ivs = call_points
        .iter()
        .chain(&put_points)
        .chain(&model_line)
        .map(|p| p.1);
    let min_iv = all_ivs.clone().fold(f64::INFINITY, f64::min);
    let max_iv = all_ivs.fold(f64::NEG_INFINITY, f64::max);
    let padding = (max_iv - min_iv) * 0.05;
    let y_min = (min_iv - padding).max(0.0);
    let y_max = max_iv + padding;

    let root = SVGBackend::new("iv_smile.svg", (1280, 768)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(
            format!(
                "{} surface vs market IV | Exp: {} (t={:.4}y, {:.0}d)",
                sample.symbol,
                expiration,
                t,
                t * 365.0
            ),
            ("sans-serif", 30),
        )
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(min_strike..max_strike, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Strike ($)")
        .y_desc("Implied Vol (%)")
        .draw()?;

    chart.draw_series(call_points.iter().map(|pt| Circle::new(*pt, 3, RED.filled())))?;
    chart.draw_series(put_points.iter().map(|pt| Circle::new(*pt, 3, BLUE.filled())))?;
    chart.draw_series(std::iter::once(PathElement::new(model_line, BLACK)))?;

    root.present()?;
    println!("Chart saved to iv_smile.svg");
    Ok(())
}
