use serde::{Deserialize, Serialize};

use crate::error::{PricingError, Result};

/// Piecewise-linear interpolant over one axis with linear extrapolation.
///
/// Used when the fitting data collapses onto a single strike or a single
/// expiry and a bivariate fit is not identifiable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSlice {
    /// Sorted, de-duplicated `(x, iv)` nodes
    points: Vec<(f64, f64)>,
}

impl LinearSlice {
    /// Build from unsorted abscissae and values. Duplicate abscissae are averaged.
    pub fn new(xs: &[f64], values: &[f64]) -> Result<Self> {
        if xs.len() != values.len() {
            return Err(PricingError::invalid(format!(
                "abscissae and values must have the same length, got {} and {}",
                xs.len(),
                values.len()
            )));
        }
        if xs.is_empty() {
            return Err(PricingError::invalid("at least one point is required"));
        }

        Ok(Self {
            points: prepare_points(xs, values),
        })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Interpolated value at `x`, extrapolating linearly from the end segments.
    pub fn evaluate(&self, x: f64) -> f64 {
        let pts = &self.points;
        if pts.len() == 1 {
            return pts[0].1;
        }

        let n = pts.len();
        let (i, j) = if x <= pts[0].0 {
            (0, 1)
        } else if x >= pts[n - 1].0 {
            (n - 2, n - 1)
        } else {
            // First node strictly to the right of x
            let right = pts.partition_point(|&(px, _)| px <= x);
            (right - 1, right)
        };

        let (x1, y1) = pts[i];
        let (x2, y2) = pts[j];
        let t = (x - x1) / (x2 - x1);
        y1 + t * (y2 - y1)
    }
}

/// Sort by abscissa and average values sharing the same abscissa
fn prepare_points(xs: &[f64], values: &[f64]) -> Vec<(f64, f64)> {
    let mut raw: Vec<(f64, f64)> = xs.iter().copied().zip(values.iter().copied()).collect();
    raw.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(raw.len());
    let mut sum = 0.0;
    let mut count = 0usize;
    for (idx, &(x, y)) in raw.iter().enumerate() {
        sum += y;
        count += 1;
        let last_of_group = raw.get(idx + 1).map_or(true, |&(next, _)| next != x);
        if last_of_group {
            merged.push((x, sum / count as f64));
            sum = 0.0;
            count = 0;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn interpolates_between_unsorted_nodes() {
        let slice = LinearSlice::new(&[1.0, 0.5, 2.0, 1.5], &[0.20, 0.22, 0.23, 0.21]).unwrap();
        assert_abs_diff_eq!(slice.evaluate(1.25), 0.205, epsilon = 1e-12);
        assert_abs_diff_eq!(slice.evaluate(0.5), 0.22, epsilon = 1e-12);
        assert_abs_diff_eq!(slice.evaluate(2.0), 0.23, epsilon = 1e-12);
    }

    #[test]
    fn extrapolates_linearly() {
        let slice = LinearSlice::new(&[1.0, 2.0], &[0.2, 0.3]).unwrap();
        assert_abs_diff_eq!(slice.evaluate(3.0), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(slice.evaluate(0.0), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn averages_duplicates() {
        let slice = LinearSlice::new(&[1.0, 1.0, 2.0], &[0.2, 0.4, 0.5]).unwrap();
        assert_eq!(slice.points().len(), 2);
        assert_abs_diff_eq!(slice.evaluate(1.0), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn single_node_is_flat() {
        let slice = LinearSlice::new(&[1.0, 1.0], &[0.2, 0.3]).unwrap();
        assert_abs_diff_eq!(slice.evaluate(-10.0), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(slice.evaluate(10.0), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        assert!(LinearSlice::new(&[1.0, 2.0], &[0.2]).is_err());
        assert!(LinearSlice::new(&[], &[]).is_err());
    }
}
