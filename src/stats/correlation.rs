//! Pearson correlation with a two-sided p-value.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a correlation computation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CorrelationResult {
    /// Correlation coefficient in [-1, 1].
    pub r: f64,
    /// Two-tailed p-value for H0: rho = 0.
    pub p_value: f64,
    /// Sample size.
    pub n: usize,
}

pub struct Correlation;

impl Correlation {
    /// Pearson product-moment correlation.
    ///
    /// Returns `None` for fewer than two pairs, slices of different length,
    /// non-finite input, or a constant series.
    pub fn pearson(x: &[f64], y: &[f64]) -> Option<CorrelationResult> {
        let n = x.len();
        if n < 2 || n != y.len() {
            return None;
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return None;
        }

        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;

        let dx: Vec<f64> = x.iter().map(|v| v - mean_x).collect();
        let dy: Vec<f64> = y.iter().map(|v| v - mean_y).collect();
        let norm_x = dx.iter().map(|d| d * d).sum::<f64>().sqrt();
        let norm_y = dy.iter().map(|d| d * d).sum::<f64>().sqrt();

        if norm_x <= 0.0 || norm_y <= 0.0 {
            return None;
        }

        // Normalise before the dot product, then clamp.
        let r = dx
            .iter()
            .zip(&dy)
            .map(|(a, b)| (a / norm_x) * (b / norm_y))
            .sum::<f64>()
            .clamp(-1.0, 1.0);
        Some(CorrelationResult {
            r,
            p_value: Self::p_value(r, n),
            n,
        })
    }

    /// Two-sided p-value of r under the t distribution with n-2 degrees of freedom.
    pub fn p_value(r: f64, n: usize) -> f64 {
        if n <= 2 {
            return 1.0;
        }
        if r.abs() >= 1.0 {
            return 0.0;
        }

        let df = (n - 2) as f64;
        let t = r * (df / (1.0 - r * r)).sqrt();
        match StudentsT::new(0.0, 1.0, df) {
            Ok(dist) => (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0),
            Err(_) => f64::NAN,
        }
    }
}
