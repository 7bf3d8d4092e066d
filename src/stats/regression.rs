//! Simple least-squares line with a confidence band for the mean prediction.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub n: usize,
    mean_x: f64,
    sxx: f64,
    /// Residual standard error.
    residual_se: f64,
}

impl LinearFit {
    /// Degree-1 least-squares fit. `None` for fewer than two points or constant x.
    pub fn fit(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n < 2 || n != y.len() || x.iter().chain(y).any(|v| !v.is_finite()) {
            return None;
        }

        let mean_x = x.iter().sum::<f64>() / n as f64;
        let mean_y = y.iter().sum::<f64>() / n as f64;
        let sxx: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum();
        if sxx <= 0.0 {
            return None;
        }
        let sxy: f64 = x
            .iter()
            .zip(y)
            .map(|(a, b)| (a - mean_x) * (b - mean_y))
            .sum();

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let residual_se = if n > 2 {
            let sse: f64 = x
                .iter()
                .zip(y)
                .map(|(a, b)| (b - (intercept + slope * a)).powi(2))
                .sum();
            (sse / (n - 2) as f64).sqrt()
        } else {
            f64::NAN
        };

        Some(Self {
            slope,
            intercept,
            n,
            mean_x,
            sxx,
            residual_se,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Lower and upper bound of the confidence band of the mean response at `x`.
    pub fn confidence_band(&self, x: f64, confidence: f64) -> Option<(f64, f64)> {
        if self.n <= 2 || !self.residual_se.is_finite() {
            return None;
        }
        let dist = StudentsT::new(0.0, 1.0, (self.n - 2) as f64).ok()?;
        let t = dist.inverse_cdf(0.5 + confidence / 2.0);
        let se = self.residual_se
            * (1.0 / self.n as f64 + (x - self.mean_x).powi(2) / self.sxx).sqrt();
        let y = self.predict(x);
        Some((y - t * se, y + t * se))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_line() {
        let fit = LinearFit::fit(&[1.0, 2.0, 3.0, 4.0], &[3.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert!((fit.intercept - 1.0).abs() < 1e-12);
        assert!((fit.predict(10.0) - 21.0).abs() < 1e-12);
        // A perfect fit has a zero-width band
        let (lo, hi) = fit.confidence_band(2.5, 0.95).unwrap();
        assert!((hi - lo).abs() < 1e-9);
    }

    #[test]
    fn band_widens_away_from_mean() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [2.1, 3.9, 6.2, 7.8, 10.1, 12.2];
        let fit = LinearFit::fit(&x, &y).unwrap();
        let (lo_mid, hi_mid) = fit.confidence_band(3.5, 0.95).unwrap();
        let (lo_end, hi_end) = fit.confidence_band(6.0, 0.95).unwrap();
        assert!(hi_end - lo_end > hi_mid - lo_mid);
        assert!(lo_mid < fit.predict(3.5) && fit.predict(3.5) < hi_mid);
    }

    #[test]
    fn trend_over_years() {
        // numpy.polyfit of the clinical-trial counts
        let years: Vec<f64> = (2015..=2025).map(f64::from).collect();
        let counts = [2.0, 3.0, 6.0, 12.0, 5.0, 9.0, 18.0, 15.0, 14.0, 10.0, 14.0];
        let fit = LinearFit::fit(&years, &counts).unwrap();
        assert!((fit.slope - 131.0 / 110.0).abs() < 1e-9, "slope = {}", fit.slope);
        assert!((fit.predict(2020.0) - 108.0 / 11.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(LinearFit::fit(&[1.0], &[1.0]).is_none());
        assert!(LinearFit::fit(&[2.0, 2.0], &[1.0, 3.0]).is_none());
        let two = LinearFit::fit(&[0.0, 1.0], &[0.0, 1.0]).unwrap();
        assert!(two.confidence_band(0.5, 0.95).is_none());
    }
}
