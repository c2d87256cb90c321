use volsurface_lib::{default_configs, fit_surface_with_config, EngineConfig, SurfaceModel};

fn main() -> anyhow::Result<()> {
    // Example quotes (reference smile)
    let strikes = [90.0, 100.0, 110.0, 95.0, 105.0, 115.0];
    let expiries = [0.5, 0.5, 0.5, 1.0, 1.0, 1.0];
    let ivs = [0.22, 0.20, 0.21, 0.25, 0.22, 0.23];

    println!("Volsurface-lib Default Configuration Examples\n");

    let presets: [(&str, EngineConfig, &str); 4] = [
        (
            "Fast Configuration (good for development)",
            default_configs::fast(),
            "Development, quick prototyping",
        ),
        (
            "Production Configuration (live pricing)",
            default_configs::production(),
            "Live pricing, production systems",
        ),
        (
            "Research Configuration (maximum accuracy)",
            default_configs::research(),
            "Research, backtesting, model validation",
        ),
        (
            "Minimal Configuration (quick validation)",
            default_configs::minimal(),
            "Quick checks, unit tests, debugging",
        ),
    ];

    for (i, (title, config, use_case)) in presets.iter().enumerate() {
        println!("{}. {}:", i + 1, title);
        println!(
            "   Volatility bracket: [{:.0e}, {}]",
            config.solver.min_vol, config.solver.max_vol
        );
        println!("   Solver tolerance: {:.1e}", config.solver.tolerance);
        println!("   Max iterations: {}", config.solver.max_iterations);
        println!("   Smoothing: {}", config.surface.smoothing);
        println!(
            "   Max knot insertions: {}",
            config.surface.max_knot_insertions
        );

        let surface = fit_surface_with_config(&strikes, &expiries, &ivs, &config.surface)?;
        println!(
            "   sigma(102, 0.75) = {:.4}",
            surface.evaluate(102.0, 0.75)
        );
        println!("   Use case: {}\n", use_case);
    }

    // Presets are plain data: override single fields or load them from TOML
    let custom = EngineConfig {
        risk_free_rate: 0.045,
        ..default_configs::fast()
    };
    println!("Custom configuration as TOML:\n{}", custom.to_toml_string()?);

    let parsed = EngineConfig::from_toml_str("[surface]\nsmoothing = 0.02\n")?;
    println!(
        "Parsed smoothing: {}, defaulted rate: {}",
        parsed.surface.smoothing, parsed.risk_free_rate
    );

    Ok(())
}
