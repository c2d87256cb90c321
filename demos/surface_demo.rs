// demos/surface_demo.rs

//! Volatility surface fitting on scattered quotes
//!
//! Fits the six-point reference smile, prints the surface on a grid, then shows
//! the 1-D fallback taken when every quote shares a strike.
//!
//! Run with `RUST_LOG=debug` to follow the knot placement.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use volsurface_lib::{fit_surface, SurfaceModel, VolatilitySurface};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Volatility Surface Demo");
    println!("=======================");

    let strikes = [90.0, 100.0, 110.0, 95.0, 105.0, 115.0];
    let expiries = [0.5, 0.5, 0.5, 1.0, 1.0, 1.0];
    let ivs = [0.22, 0.20, 0.21, 0.25, 0.22, 0.23];

    for smoothing in [0.1, 1e-3, 0.0] {
        let surface = fit_surface(&strikes, &expiries, &ivs, smoothing)?;
        println!("\nsmoothing = {smoothing}");
        print_report(&surface);
        print_grid(&surface, &[90.0, 95.0, 100.0, 105.0, 110.0, 115.0], &[0.5, 0.75, 1.0]);
    }

    println!("\nDegenerate input: a single strike");
    let surface = fit_surface(
        &[100.0; 4],
        &[0.25, 0.5, 1.0, 2.0],
        &[0.24, 0.22, 0.21, 0.20],
        0.1,
    )?;
    if let Some(advisory) = surface.advisory() {
        println!("  advisory: {advisory}");
    }
    for t in [0.1, 0.75, 3.0] {
        println!("  sigma(100, {t}) = {:.4}", surface.evaluate(100.0, t));
    }

    Ok(())
}

fn print_report(surface: &VolatilitySurface) {
    let report = surface.report();
    println!(
        "  degree {:?}, interior knots {:?}, rss {:.3e}, rms {:.3e}, max |e| {:.3e}",
        report.degree,
        report.interior_knots,
        report.residual_sum_squares,
        report.rms_residual,
        report.max_abs_residual
    );
}

fn print_grid(surface: &dyn SurfaceModel, strikes: &[f64], expiries: &[f64]) {
    print!("  {:>8}", "K \\ T");
    for t in expiries {
        print!(" {t:>8.2}");
    }
    println!();
    for &k in strikes {
        print!("  {k:>8.1}");
        for &t in expiries {
            print!(" {:>8.4}", surface.evaluate(k, t));
        }
        println!();
    }
}
