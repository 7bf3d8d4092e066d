//! Statistics Calculator Module
//! Handles descriptive statistics and category counts.

use serde::Serialize;
use std::collections::HashMap;

/// Significance threshold used throughout the reports
pub const SIGNIFICANCE_THRESHOLD: f64 = 0.05;

/// Descriptive statistics for a single column.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p05: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            p95: f64::NAN,
            p05: f64::NAN,
        }
    }
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        let n = values.len();
        if n == 0 {
            return DescriptiveStats::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mean = Self::mean(values);
        let median = Self::percentile(&sorted, 50.0);

        // Sample variance (ddof = 1); NaN for a single value
        let variance = Self::sample_variance(values);
        let std = variance.sqrt();

        DescriptiveStats {
            count: n,
            mean,
            median,
            std,
            variance,
            min: sorted[0],
            max: sorted[n - 1],
            p95: Self::percentile(&sorted, 95.0),
            p05: Self::percentile(&sorted, 5.0),
        }
    }

    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return f64::NAN;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    pub fn sample_variance(values: &[f64]) -> f64 {
        let n = values.len();
        if n < 2 {
            return f64::NAN;
        }
        let mean = Self::mean(values);
        values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    }

    pub fn sample_std(values: &[f64]) -> f64 {
        Self::sample_variance(values).sqrt()
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Count occurrences of each category, most frequent first.
    /// Ties keep the order of first appearance.
    pub fn value_counts<S: AsRef<str>>(values: &[S]) -> Vec<(String, usize)> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for value in values {
            let value = value.as_ref();
            let count = counts.entry(value).or_insert(0);
            if *count == 0 {
                order.push(value.to_string());
            }
            *count += 1;
        }

        let mut result: Vec<(String, usize)> = order
            .into_iter()
            .map(|v| {
                let count = counts[v.as_str()];
                (v, count)
            })
            .collect();
        // Stable sort keeps first-appearance order among equal counts
        result.sort_by(|a, b| b.1.cmp(&a.1));
        result
    }

    /// Histogram over fixed bin edges, NumPy style.
    ///
    /// Bins are half-open `[a, b)` except the last, which includes its
    /// right edge. Values outside the edges are ignored. Each value adds
    /// `weight` to its bin.
    pub fn histogram(values: &[f64], edges: &[f64], weight: f64) -> Vec<f64> {
        if edges.len() < 2 {
            return Vec::new();
        }
        let bins = edges.len() - 1;
        let mut counts = vec![0.0; bins];
        let (first, last) = (edges[0], edges[bins]);

        for &v in values {
            if !v.is_finite() || v < first || v > last {
                continue;
            }
            let idx = if v == last {
                bins - 1
            } else {
                // Last edge not greater than v
                edges.partition_point(|&e| e <= v) - 1
            };
            counts[idx] += weight;
        }
        counts
    }

    /// Evenly spaced edges `start, start + step, ...` below `stop`, like `numpy.arange`.
    pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
        if step <= 0.0 || stop <= start {
            return Vec::new();
        }
        let n = ((stop - start) / step).ceil() as usize;
        (0..n).map(|i| start + step * i as f64).collect()
    }

    /// Round to a number of decimal places, ties to even as NumPy does.
    pub fn round_to(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round_ties_even() / factor
    }
}

/// Format a p-value the way the figures and reports show it.
pub fn format_p_value(p: f64) -> String {
    if p < 0.001 {
        "p < .001".to_string()
    } else {
        format!("p = {:.3}", p)
    }
}
