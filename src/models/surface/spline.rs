//! Tensor-product smoothing B-spline for scattered `(strike, expiry, iv)` data.
//!
//! The fit follows the strategy of FITPACK's `surfit`:
//!
//! 1. Start from boundary knots only, i.e. a tensor-product polynomial of
//!    degree `(kx, ky)`, and solve the least-squares problem.
//! 2. While the residual sum of squares exceeds the smoothing factor `s`,
//!    insert interior knots (alternating axes) inside the knot interval that
//!    carries the largest squared residual. A knot is only kept when the
//!    refitted coefficients stay within one data span of the observed values
//!    (or within the current fit's range, if that is wider).
//! 3. Once interior knots exist and the fit is tighter than `s`, add a
//!    difference roughness penalty and pick its weight so that the residual
//!    sum of squares lands on `s`.
//!
//! Least squares are solved through an SVD, so rank-deficient configurations
//! (scattered points leaving some basis functions unsupported) still produce
//! the minimum-norm solution rather than failing. Weakly supported panels show
//! up as huge coefficients, which the admission rule in step 2 turns away.
//! Since the basis is non-negative and sums to one, the surface is bounded by
//! its coefficients.
//!
//! Evaluation clamps queries to the data bounding box, which keeps the
//! surface finite everywhere.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::{PricingError, Result};

/// Relative accuracy on the residual target when searching the penalty weight
const SMOOTHING_RTOL: f64 = 1e-3;
/// Bisection steps on log10(penalty weight)
const MAX_PENALTY_ITERATIONS: usize = 60;
/// Search range of log10(weight / reference weight)
const PENALTY_EXPONENT_RANGE: (f64, f64) = (-10.0, 10.0);
/// Singular values below this fraction of the largest are treated as zero
const SVD_RCOND: f64 = 1e-12;
/// Data spans a coefficient may sit outside the observed range after a knot insertion
const COEFFICIENT_SPAN_FACTOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

/// Knot layout and least-squares solution after inserting one knot
struct Candidate {
    axis: Axis,
    gx: Vec<f64>,
    gy: Vec<f64>,
    tx: Vec<f64>,
    ty: Vec<f64>,
    design: DMatrix<f64>,
    coefficients: DVector<f64>,
}

/// A fitted bivariate B-spline `z = s(x, y)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BivariateSpline {
    tx: Vec<f64>,
    ty: Vec<f64>,
    kx: usize,
    ky: usize,
    /// Row-major over (x basis, y basis)
    coefficients: Vec<f64>,
    residual_sum_squares: f64,
    penalty_weight: f64,
}

impl BivariateSpline {
    /// Fit a smoothing spline of degree `(kx, ky)` with smoothing factor `smoothing`.
    ///
    /// The caller guarantees equal lengths and at least `(kx + 1) * (ky + 1)`
    /// points; both axes must span a non-empty range.
    pub fn fit(
        xs: &[f64],
        ys: &[f64],
        zs: &[f64],
        kx: usize,
        ky: usize,
        smoothing: f64,
        max_knot_insertions: usize,
    ) -> Result<Self> {
        let m = xs.len();
        if ys.len() != m || zs.len() != m {
            return Err(PricingError::invalid(
                "spline inputs must have the same length",
            ));
        }
        if kx == 0 || ky == 0 {
            return Err(PricingError::invalid("spline degrees must be at least 1"));
        }
        if m < (kx + 1) * (ky + 1) {
            return Err(PricingError::invalid(format!(
                "{} points cannot determine a spline of degree ({}, {})",
                m, kx, ky
            )));
        }

        let (x_lo, x_hi) = bounds(xs);
        let (y_lo, y_hi) = bounds(ys);
        if !(x_lo < x_hi && y_lo < y_hi) {
            return Err(PricingError::invalid(
                "bivariate spline needs at least two distinct values on each axis",
            ));
        }

        let z = DVector::from_column_slice(zs);
        let mut gx: Vec<f64> = Vec::new();
        let mut gy: Vec<f64> = Vec::new();

        let mut tx = clamped_knots(x_lo, x_hi, kx, &gx);
        let mut ty = clamped_knots(y_lo, y_hi, ky, &gy);
        let mut design = design_matrix(&tx, kx, &ty, ky, xs, ys);
        let mut coefficients = solve_least_squares(&design, &z, None)?;
        let mut residuals = &z - &design * &coefficients;
        let mut rss = residuals.norm_squared();

        let (z_lo, z_hi) = bounds(zs);
        let z_margin = COEFFICIENT_SPAN_FACTOR * (z_hi - z_lo);

        let mut prefer = Axis::X;
        for _ in 0..max_knot_insertions {
            if rss <= smoothing {
                break;
            }

            let (c_lo, c_hi) = bounds(coefficients.as_slice());
            let allowed = (c_lo.min(z_lo - z_margin), c_hi.max(z_hi + z_margin));

            let order = match prefer {
                Axis::X => [Axis::X, Axis::Y],
                Axis::Y => [Axis::Y, Axis::X],
            };
            let mut accepted = None;
            for axis in order {
                let (coords, interior, lo, hi, k) = match axis {
                    Axis::X => (xs, &gx, x_lo, x_hi, kx),
                    Axis::Y => (ys, &gy, y_lo, y_hi, ky),
                };
                let n_axis = interior.len() + k + 1;
                let n_other = match axis {
                    Axis::X => gy.len() + ky + 1,
                    Axis::Y => gx.len() + kx + 1,
                };
                if (n_axis + 1) * n_other > m {
                    continue;
                }
                let Some(knot) = propose_knot(coords, interior, lo, hi, residuals.as_slice())
                else {
                    continue;
                };

                let mut next_gx = gx.clone();
                let mut next_gy = gy.clone();
                match axis {
                    Axis::X => insert_sorted(&mut next_gx, knot),
                    Axis::Y => insert_sorted(&mut next_gy, knot),
                }
                let next_tx = clamped_knots(x_lo, x_hi, kx, &next_gx);
                let next_ty = clamped_knots(y_lo, y_hi, ky, &next_gy);
                let next_design = design_matrix(&next_tx, kx, &next_ty, ky, xs, ys);
                let next_coefficients = solve_least_squares(&next_design, &z, None)?;

                let (lo_coef, hi_coef) = bounds(next_coefficients.as_slice());
                if lo_coef < allowed.0 || hi_coef > allowed.1 {
                    debug!(?axis, knot, lo_coef, hi_coef, "knot rejected, weakly supported panel");
                    continue;
                }

                trace!(?axis, knot, rss, "inserting interior knot");
                accepted = Some(Candidate {
                    axis,
                    gx: next_gx,
                    gy: next_gy,
                    tx: next_tx,
                    ty: next_ty,
                    design: next_design,
                    coefficients: next_coefficients,
                });
                break;
            }

            let Some(candidate) = accepted else {
                debug!(rss, smoothing, "no admissible knot left to insert");
                break;
            };

            prefer = match candidate.axis {
                Axis::X => Axis::Y,
                Axis::Y => Axis::X,
            };
            gx = candidate.gx;
            gy = candidate.gy;
            tx = candidate.tx;
            ty = candidate.ty;
            design = candidate.design;
            coefficients = candidate.coefficients;
            residuals = &z - &design * &coefficients;
            rss = residuals.norm_squared();
        }

        let mut penalty_weight = 0.0;
        let nx = tx.len() - kx - 1;
        let ny = ty.len() - ky - 1;
        if rss < smoothing && (!gx.is_empty() || !gy.is_empty()) {
            let penalty = difference_penalty(nx, ny, kx + 1, ky + 1, !gx.is_empty(), !gy.is_empty());
            let (weight, coef, smoothed_rss) =
                match_smoothing(&design, &z, &penalty, smoothing)?;
            penalty_weight = weight;
            coefficients = coef;
            rss = smoothed_rss;
        }

        debug!(
            kx,
            ky,
            interior_x = gx.len(),
            interior_y = gy.len(),
            rss,
            penalty_weight,
            "bivariate spline fitted"
        );

        Ok(Self {
            tx,
            ty,
            kx,
            ky,
            coefficients: coefficients.as_slice().to_vec(),
            residual_sum_squares: rss,
            penalty_weight,
        })
    }

    /// Spline value at `(x, y)`, with the query clamped to the fitted domain.
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let ny = self.ty.len() - self.ky - 1;
        let (ix, bx) = basis_functions(&self.tx, self.kx, x);
        let (iy, by) = basis_functions(&self.ty, self.ky, y);

        let mut value = 0.0;
        for (a, wx) in bx.iter().enumerate() {
            let row = (ix + a) * ny + iy;
            for (c, wy) in by.iter().enumerate() {
                value += wx * wy * self.coefficients[row + c];
            }
        }
        value
    }

    pub fn degrees(&self) -> (usize, usize) {
        (self.kx, self.ky)
    }

    /// Number of interior knots on each axis.
    pub fn interior_knots(&self) -> (usize, usize) {
        (
            self.tx.len() - 2 * (self.kx + 1),
            self.ty.len() - 2 * (self.ky + 1),
        )
    }

    pub fn knots(&self) -> (&[f64], &[f64]) {
        (&self.tx, &self.ty)
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Weighted residual sum of squares of the fit on its input data.
    pub fn residual_sum_squares(&self) -> f64 {
        self.residual_sum_squares
    }

    /// Weight of the roughness penalty (0 when the fit is pure least squares).
    pub fn penalty_weight(&self) -> f64 {
        self.penalty_weight
    }

    /// Domain the spline was fitted on: `((x_lo, x_hi), (y_lo, y_hi))`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        let nx = self.tx.len() - self.kx - 1;
        let ny = self.ty.len() - self.ky - 1;
        (
            (self.tx[self.kx], self.tx[nx]),
            (self.ty[self.ky], self.ty[ny]),
        )
    }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

fn insert_sorted(knots: &mut Vec<f64>, knot: f64) {
    let pos = knots.partition_point(|&t| t < knot);
    knots.insert(pos, knot);
}

/// Knot vector with `k + 1` repeated boundary knots on each side
fn clamped_knots(lo: f64, hi: f64, k: usize, interior: &[f64]) -> Vec<f64> {
    let mut knots = Vec::with_capacity(interior.len() + 2 * (k + 1));
    knots.extend(std::iter::repeat(lo).take(k + 1));
    knots.extend_from_slice(interior);
    knots.extend(std::iter::repeat(hi).take(k + 1));
    knots
}

/// Non-zero B-spline basis values at `x` (Cox-de Boor recursion).
///
/// Returns the index of the first non-zero basis function and the `k + 1`
/// values starting there. `x` is clamped to `[t_k, t_n]`.
fn basis_functions(knots: &[f64], k: usize, x: f64) -> (usize, Vec<f64>) {
    let n = knots.len() - k - 1;
    let x = x.clamp(knots[k], knots[n]);

    let span = (k + knots[k..n].partition_point(|&t| t <= x)).saturating_sub(1);
    let span = span.clamp(k, n - 1);

    let mut values = vec![0.0; k + 1];
    let mut left = vec![0.0; k + 1];
    let mut right = vec![0.0; k + 1];
    values[0] = 1.0;

    for j in 1..=k {
        left[j] = x - knots[span + 1 - j];
        right[j] = knots[span + j] - x;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }

    (span - k, values)
}

fn design_matrix(
    tx: &[f64],
    kx: usize,
    ty: &[f64],
    ky: usize,
    xs: &[f64],
    ys: &[f64],
) -> DMatrix<f64> {
    let nx = tx.len() - kx - 1;
    let ny = ty.len() - ky - 1;
    let mut design = DMatrix::zeros(xs.len(), nx * ny);

    for (row, (&x, &y)) in xs.iter().zip(ys).enumerate() {
        let (ix, bx) = basis_functions(tx, kx, x);
        let (iy, by) = basis_functions(ty, ky, y);
        for (a, wx) in bx.iter().enumerate() {
            for (c, wy) in by.iter().enumerate() {
                design[(row, (ix + a) * ny + iy + c)] = wx * wy;
            }
        }
    }
    design
}

fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Finite-difference operator on the coefficient grid, order `dx` along x and
/// `dy` along y; only axes with interior knots are penalised.
fn difference_penalty(
    nx: usize,
    ny: usize,
    dx: usize,
    dy: usize,
    penalise_x: bool,
    penalise_y: bool,
) -> DMatrix<f64> {
    let mut rows: Vec<Vec<(usize, f64)>> = Vec::new();

    if penalise_x && nx > dx {
        for i in 0..nx - dx {
            for j in 0..ny {
                rows.push(
                    (0..=dx)
                        .map(|l| {
                            let sign = if (dx - l) % 2 == 0 { 1.0 } else { -1.0 };
                            ((i + l) * ny + j, sign * binomial(dx, l))
                        })
                        .collect(),
                );
            }
        }
    }
    if penalise_y && ny > dy {
        for i in 0..nx {
            for j in 0..ny - dy {
                rows.push(
                    (0..=dy)
                        .map(|l| {
                            let sign = if (dy - l) % 2 == 0 { 1.0 } else { -1.0 };
                            (i * ny + j + l, sign * binomial(dy, l))
                        })
                        .collect(),
                );
            }
        }
    }

    let mut penalty = DMatrix::zeros(rows.len(), nx * ny);
    for (r, entries) in rows.iter().enumerate() {
        for &(col, value) in entries {
            penalty[(r, col)] = value;
        }
    }
    penalty
}

/// Minimise `|B c - z|^2 + w |P c|^2` through an SVD of the stacked system.
fn solve_least_squares(
    design: &DMatrix<f64>,
    z: &DVector<f64>,
    penalty: Option<(&DMatrix<f64>, f64)>,
) -> Result<DVector<f64>> {
    let (system, rhs) = match penalty {
        Some((p, weight)) if weight > 0.0 && p.nrows() > 0 => {
            let scale = weight.sqrt();
            let m = design.nrows();
            let mut stacked = DMatrix::zeros(m + p.nrows(), design.ncols());
            stacked.rows_mut(0, m).copy_from(design);
            stacked.rows_mut(m, p.nrows()).copy_from(&(p * scale));
            let mut rhs = DVector::zeros(m + p.nrows());
            rhs.rows_mut(0, m).copy_from(z);
            (stacked, rhs)
        }
        _ => (design.clone(), z.clone()),
    };

    let svd = system.svd(true, true);
    let eps = svd.singular_values.max() * SVD_RCOND;
    let solution = svd
        .solve(&rhs, eps)
        .map_err(|e| PricingError::numerical(format!("spline least squares failed: {e}")))?;

    if solution.iter().all(|c| c.is_finite()) {
        Ok(solution)
    } else {
        Err(PricingError::numerical(
            "spline least squares produced non-finite coefficients",
        ))
    }
}

/// Bisect the penalty weight (log scale) so the residual sum of squares is close to `target`.
fn match_smoothing(
    design: &DMatrix<f64>,
    z: &DVector<f64>,
    penalty: &DMatrix<f64>,
    target: f64,
) -> Result<(f64, DVector<f64>, f64)> {
    let reference = design.norm_squared() / penalty.norm_squared().max(f64::MIN_POSITIVE);
    let fit_at = |exponent: f64| -> Result<(f64, DVector<f64>, f64)> {
        let weight = reference * 10f64.powf(exponent);
        let coef = solve_least_squares(design, z, Some((penalty, weight)))?;
        let rss = (z - design * &coef).norm_squared();
        Ok((weight, coef, rss))
    };

    let (mut lo, mut hi) = PENALTY_EXPONENT_RANGE;
    let strongest = fit_at(hi)?;
    if strongest.2 <= target {
        return Ok(strongest);
    }

    let mut best = fit_at(lo)?;
    for _ in 0..MAX_PENALTY_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        let candidate = fit_at(mid)?;
        if (candidate.2 - target).abs() <= SMOOTHING_RTOL * target {
            return Ok(candidate);
        }
        if candidate.2 < target {
            lo = mid;
            best = candidate;
        } else {
            hi = mid;
        }
    }
    Ok(best)
}

/// Median data coordinate inside the knot interval carrying the largest squared residual
fn propose_knot(
    coords: &[f64],
    interior: &[f64],
    lo: f64,
    hi: f64,
    residuals: &[f64],
) -> Option<f64> {
    let edges: Vec<f64> = std::iter::once(lo)
        .chain(interior.iter().copied())
        .chain(std::iter::once(hi))
        .collect();

    let mut best: Option<(f64, f64)> = None;
    for w in edges.windows(2) {
        let (a, b) = (w[0], w[1]);
        let is_last = b == hi;
        let in_interval = |c: f64| c >= a && (c < b || (is_last && c <= b));

        let weight: f64 = coords
            .iter()
            .zip(residuals)
            .filter(|(&c, _)| in_interval(c))
            .map(|(_, r)| r * r)
            .sum();

        let mut inside: Vec<f64> = coords.iter().copied().filter(|&c| c > a && c < b).collect();
        if inside.is_empty() {
            continue;
        }
        inside.sort_by(f64::total_cmp);
        inside.dedup();
        let knot = inside[inside.len() / 2];

        if best.map_or(true, |(w_best, _)| weight > w_best) {
            best = Some((weight, knot));
        }
    }
    best.map(|(_, knot)| knot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn basis_is_partition_of_unity() {
        let knots = clamped_knots(0.0, 1.0, 3, &[0.3, 0.6]);
        for x in [0.0, 0.1, 0.3, 0.45, 0.6, 0.99, 1.0] {
            let (_, values) = basis_functions(&knots, 3, x);
            assert_abs_diff_eq!(values.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn basis_index_stays_in_range() {
        let knots = clamped_knots(0.0, 1.0, 2, &[0.5]);
        let n = knots.len() - 3;
        for x in [-1.0, 0.0, 0.5, 1.0, 2.0] {
            let (first, values) = basis_functions(&knots, 2, x);
            assert!(first + values.len() <= n);
        }
    }

    #[test]
    fn reproduces_bilinear_function() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for &x in &[80.0, 90.0, 100.0, 110.0] {
            for &y in &[0.25, 0.5, 1.0] {
                xs.push(x);
                ys.push(y);
                zs.push(0.1 + 0.001 * x + 0.05 * y - 0.0002 * x * y);
            }
        }
        let spline = BivariateSpline::fit(&xs, &ys, &zs, 1, 1, 1e-12, 8).unwrap();
        assert_eq!(spline.interior_knots(), (0, 0));
        let expected = 0.1 + 0.001 * 95.0 + 0.05 * 0.75 - 0.0002 * 95.0 * 0.75;
        assert_abs_diff_eq!(spline.evaluate(95.0, 0.75), expected, epsilon = 1e-10);
        assert!(spline.residual_sum_squares() < 1e-20);
    }

    #[test]
    fn knots_inserted_when_smoothing_is_tight() {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for i in 0..6 {
            for j in 0..4 {
                let x = 80.0 + 8.0 * i as f64;
                let y = 0.25 + 0.25 * j as f64;
                xs.push(x);
                ys.push(y);
                let k = (x / 100.0f64).ln();
                zs.push(0.2 + 2.0 * k.abs() + 0.01 * y);
            }
        }
        let loose = BivariateSpline::fit(&xs, &ys, &zs, 1, 1, 1.0, 16).unwrap();
        let tight = BivariateSpline::fit(&xs, &ys, &zs, 1, 1, 0.0, 16).unwrap();

        assert_eq!(loose.interior_knots(), (0, 0));
        assert!(tight.interior_knots().0 > 0);
        assert!(tight.residual_sum_squares() < loose.residual_sum_squares());
    }

    #[test]
    fn scattered_interpolation_stays_near_data() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        for seed in 1..=6 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            let mut zs = Vec::new();
            for _ in 0..40 {
                let x: f64 = rng.gen_range(80.0..120.0);
                let y: f64 = rng.gen_range(0.1..2.0);
                let noise: f64 = rng.gen_range(-0.01..0.01);
                xs.push(x);
                ys.push(y);
                zs.push(0.2 + 0.5 * (x / 100.0).ln().powi(2) + 0.02 * y + noise);
            }

            let spline = BivariateSpline::fit(&xs, &ys, &zs, 3, 3, 0.0, 128).unwrap();
            let (z_lo, z_hi) = bounds(&zs);
            let span = z_hi - z_lo;
            let (x_lo, x_hi) = bounds(&xs);
            let (y_lo, y_hi) = bounds(&ys);

            for i in 0..=10 {
                for j in 0..=10 {
                    let x = x_lo + (x_hi - x_lo) * (0.15 + 0.07 * i as f64);
                    let y = y_lo + (y_hi - y_lo) * (0.15 + 0.07 * j as f64);
                    let v = spline.evaluate(x, y);
                    assert!(
                        v > z_lo - 2.0 * span && v < z_hi + 2.0 * span,
                        "seed {seed}: s({x:.2}, {y:.3}) = {v} with knots {:?}",
                        spline.interior_knots()
                    );
                }
            }
        }
    }

    #[test]
    fn evaluation_is_clamped_to_domain() {
        let xs = [90.0, 100.0, 110.0, 95.0, 105.0, 115.0];
        let ys = [0.5, 0.5, 0.5, 1.0, 1.0, 1.0];
        let zs = [0.22, 0.20, 0.21, 0.25, 0.22, 0.23];
        let spline = BivariateSpline::fit(&xs, &ys, &zs, 1, 1, 0.1, 8).unwrap();
        assert_eq!(spline.domain(), ((90.0, 115.0), (0.5, 1.0)));
        assert_abs_diff_eq!(
            spline.evaluate(500.0, 10.0),
            spline.evaluate(115.0, 1.0),
            epsilon = 1e-15
        );
    }

    #[test]
    fn difference_penalty_annihilates_constants() {
        let p = difference_penalty(5, 3, 2, 2, true, true);
        let ones = DVector::from_element(15, 1.0);
        assert!((p * ones).amax() < 1e-12);
    }
}
