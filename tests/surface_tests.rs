
use std::sync::Arc;
use std::thread;

use approx::assert_abs_diff_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use test_utils::{grid, load_reference_smile};
use volsurface_lib::{
    fit_surface, fit_surface_with_config, CalibrationSet, EngineConfig, PricingError,
    SurfaceAdvisory, SurfaceConfig, SurfaceModel, VolatilitySurface,
};

fn reference_surface() -> VolatilitySurface {
    let smile = load_reference_smile();
    fit_surface(&smile.strikes, &smile.expiries, &smile.ivs, 0.1).expect("reference fit")
}

fn kink(strike: f64, expiry: f64) -> f64 {
    0.2 + 2.0 * (strike / 100.0).ln().abs() + 0.01 * expiry
}

/// Noisy smile observed at uniformly scattered strikes and expiries
fn scattered_smile(seed: u64) -> CalibrationSet {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..40)
        .map(|_| {
            let k: f64 = rng.gen_range(80.0..120.0);
            let t: f64 = rng.gen_range(0.1..2.0);
            let noise: f64 = rng.gen_range(-0.01..0.01);
            (k, t, 0.2 + 0.5 * (k / 100.0).ln().powi(2) + 0.02 * t + noise)
        })
        .collect()
}

fn value_range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

/// Largest distance, in data spans, by which the inner 70% of the box leaves the observed IV range
fn interior_overshoot(surface: &VolatilitySurface, set: &CalibrationSet) -> f64 {
    let (k_lo, k_hi) = value_range(&set.strikes);
    let (t_lo, t_hi) = value_range(&set.expiries);
    let (iv_lo, iv_hi) = value_range(&set.ivs);

    let mut worst: f64 = 0.0;
    for i in 0..=14 {
        for j in 0..=14 {
            let k = k_lo + (k_hi - k_lo) * (0.15 + 0.05 * i as f64);
            let t = t_lo + (t_hi - t_lo) * (0.15 + 0.05 * j as f64);
            let iv = surface.evaluate(k, t);
            worst = worst.max(iv_lo - iv).max(iv - iv_hi);
        }
    }
    worst / (iv_hi - iv_lo)
}

#[test]
fn test_reference_example_interior_value() {
    let surface = reference_surface();
    let iv = surface.evaluate(102.0, 0.75);

    assert!((0.20..=0.25).contains(&iv), "surface(102, 0.75) = {iv}");
    assert!(surface.is_spline());
    assert_eq!(surface.report().points, 6);
    assert_eq!(surface.report().degree, (1, 1));
}

#[test]
fn test_length_mismatch_rejected() {
    let err = fit_surface(&[90.0, 100.0, 110.0, 120.0], &[0.5; 3], &[0.2; 4], 0.1).unwrap_err();

    assert_eq!(
        err,
        PricingError::InvalidArgument {
            message: r#"Input arrays "strikes", "expiries", and "market_ivs" must have the same length."#
                .to_string()
        }
    );
}

#[test]
fn test_too_few_points_rejected() {
    let err = fit_surface(&[90.0, 100.0, 110.0], &[0.5, 1.0, 1.5], &[0.2; 3], 0.1).unwrap_err();

    assert!(err.is_invalid_argument());
    assert!(err
        .to_string()
        .contains("At least 4 data points are required to fit a volatility surface."));
}

#[test]
fn test_four_points_interpolate() {
    let strikes = [90.0, 100.0, 110.0, 120.0];
    let expiries = [0.5, 0.55, 0.45, 0.5];
    let ivs = [0.22, 0.20, 0.21, 0.21];

    let surface = fit_surface(&strikes, &expiries, &ivs, 0.1).unwrap();
    assert!(surface.advisory().is_none());
    for ((&k, &t), &iv) in strikes.iter().zip(&expiries).zip(&ivs) {
        assert_abs_diff_eq!(surface.evaluate(k, t), iv, epsilon = 1e-8);
    }
}

#[test]
fn test_single_strike_falls_back_to_expiry_interpolation() {
    let surface = fit_surface(
        &[100.0; 4],
        &[0.5, 1.0, 1.5, 2.0],
        &[0.20, 0.22, 0.23, 0.25],
        0.1,
    )
    .unwrap();

    assert_eq!(
        surface.advisory(),
        Some(SurfaceAdvisory::SingleStrike { strike: 100.0 })
    );
    let between = surface.evaluate(100.0, 1.25);
    assert!(between > 0.22 && between < 0.23);
    // Constant across strike
    assert_eq!(surface.evaluate(80.0, 1.25), between);
    // Linear extrapolation past the last expiry
    assert_abs_diff_eq!(surface.evaluate(100.0, 2.5), 0.27, epsilon = 1e-12);
}

#[test]
fn test_single_expiry_falls_back_to_strike_interpolation() {
    let surface = fit_surface(
        &[90.0, 100.0, 110.0, 120.0],
        &[0.5; 4],
        &[0.22, 0.20, 0.21, 0.23],
        0.1,
    )
    .unwrap();

    let advisory = surface.advisory().expect("advisory expected");
    assert_eq!(
        advisory.to_string(),
        "Only one unique expiry detected. Defaulting to 1D interpolation."
    );
    let iv = surface.evaluate(105.0, 0.5);
    assert!(iv > 0.20 && iv < 0.22);
    assert_eq!(surface.evaluate(105.0, 3.0), iv);
}

#[test]
fn test_cubic_grid_tracks_smooth_smile() {
    let strikes = [80.0, 90.0, 95.0, 100.0, 105.0, 110.0, 120.0];
    let expiries = [0.25, 0.5, 0.75, 1.0, 1.5];
    let smile = |k: f64, t: f64| 0.2 + 0.5 * (k / 100.0).ln().powi(2) + 0.02 * t;
    let set = grid(&strikes, &expiries, smile);

    let surface = fit_surface(&set.strikes, &set.expiries, &set.ivs, 0.1).unwrap();
    assert_eq!(surface.report().degree, (3, 3));

    for k in [82.0, 97.5, 101.0, 117.0] {
        for t in [0.3, 0.6, 1.2] {
            assert_abs_diff_eq!(surface.evaluate(k, t), smile(k, t), epsilon = 1e-3);
        }
    }
}

#[test]
fn test_tighter_smoothing_follows_data_closer() {
    let strikes = [80.0, 88.0, 96.0, 104.0, 112.0, 120.0];
    let expiries = [0.25, 0.5, 0.75, 1.0];
    let set = grid(&strikes, &expiries, kink);

    let loose = fit_surface(&set.strikes, &set.expiries, &set.ivs, 1.0).unwrap();
    let tight = fit_surface(&set.strikes, &set.expiries, &set.ivs, 1e-4).unwrap();

    assert!(
        tight.report().residual_sum_squares <= loose.report().residual_sum_squares + 1e-12,
        "tight {:?} vs loose {:?}",
        tight.report(),
        loose.report()
    );
}

#[test]
fn test_minimal_config_keeps_polynomial_surface() {
    let strikes = [80.0, 88.0, 96.0, 104.0, 112.0, 120.0];
    let expiries = [0.25, 0.5, 0.75, 1.0];
    let set = grid(&strikes, &expiries, kink);
    let config = SurfaceConfig {
        smoothing: 0.0,
        ..EngineConfig::minimal().surface
    };

    let surface = fit_surface_with_config(&set.strikes, &set.expiries, &set.ivs, &config).unwrap();
    assert_eq!(surface.report().interior_knots, (0, 0));
}

#[test]
fn test_evaluation_stays_finite_off_grid() {
    let surface = reference_surface();
    let values = surface.evaluate_many(&[(1.0, 0.01), (500.0, 10.0), (102.0, 0.75)]);

    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| v.is_finite()));
    assert_eq!(values[2], surface.evaluate(102.0, 0.75));
}

#[test]
fn test_concurrent_evaluation() {
    let surface = Arc::new(reference_surface());
    let expected = surface.evaluate(102.0, 0.75);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let surface = Arc::clone(&surface);
            thread::spawn(move || {
                (0..1000)
                    .map(|_| surface.evaluate(102.0, 0.75))
                    .collect::<Vec<f64>>()
            })
        })
        .collect();

    for handle in handles {
        let values = handle.join().expect("evaluation thread panicked");
        assert!(values.iter().all(|&v| v == expected));
    }
}

#[test]
fn test_surface_serializes() {
    let surface = reference_surface();
    let json = serde_json::to_string(&surface).unwrap();
    let restored: VolatilitySurface = serde_json::from_str(&json).unwrap();

    assert_abs_diff_eq!(
        restored.evaluate(102.0, 0.75),
        surface.evaluate(102.0, 0.75),
        epsilon = 1e-12
    );
}

#[test]
fn test_scattered_points_without_smoothing_stay_bounded() {
    for seed in 1..=8 {
        let set = scattered_smile(seed);
        let surface = fit_surface(&set.strikes, &set.expiries, &set.ivs, 0.0).unwrap();

        assert_eq!(surface.report().degree, (3, 3));
        let overshoot = interior_overshoot(&surface, &set);
        assert!(
            overshoot < 2.0,
            "seed {seed}: overshoot {overshoot:.3} spans, {:?}",
            surface.report()
        );
    }
}

#[test]
fn test_research_preset_on_scattered_points() {
    let config = EngineConfig::research().surface;

    for seed in 1..=8 {
        let set = scattered_smile(seed);
        let surface =
            fit_surface_with_config(&set.strikes, &set.expiries, &set.ivs, &config).unwrap();

        let overshoot = interior_overshoot(&surface, &set);
        assert!(
            overshoot < 2.0,
            "seed {seed}: overshoot {overshoot:.3} spans, {:?}",
            surface.report()
        );
    }
}
