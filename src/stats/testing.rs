//! Hypothesis tests: paired t-test and one-way ANOVA with effect sizes.

use crate::stats::StatsCalculator;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Result of a t-test.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TTestResult {
    pub statistic: f64,
    pub df: f64,
    /// Two-tailed p-value.
    pub p_value: f64,
}

/// One row of an ANOVA table.
#[derive(Debug, Clone, Serialize)]
pub struct AnovaRow {
    pub source: String,
    pub sum_sq: f64,
    pub df: f64,
    pub f: Option<f64>,
    pub p_value: Option<f64>,
}

/// One-way ANOVA of a response against a single categorical factor.
#[derive(Debug, Clone, Serialize)]
pub struct AnovaResult {
    pub factor: AnovaRow,
    pub residual: AnovaRow,
    pub group_means: Vec<(String, f64)>,
}

impl AnovaResult {
    /// Share of total variance explained by the factor.
    pub fn eta_squared(&self) -> f64 {
        self.factor.sum_sq / (self.factor.sum_sq + self.residual.sum_sq)
    }

    /// Render the table the way statsmodels prints `anova_lm`.
    pub fn table(&self) -> String {
        let fmt_opt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_else(|| "NaN".into());
        let width = self.factor.source.len().max(8);
        let mut out = format!(
            "{:<width$} {:>14} {:>6} {:>12} {:>12}\n",
            "", "sum_sq", "df", "F", "PR(>F)"
        );
        for row in [&self.factor, &self.residual] {
            out.push_str(&format!(
                "{:<width$} {:>14.6} {:>6.1} {:>12} {:>12}\n",
                row.source,
                row.sum_sq,
                row.df,
                fmt_opt(row.f),
                fmt_opt(row.p_value)
            ));
        }
        out
    }
}

pub struct HypothesisTests;

impl HypothesisTests {
    /// Paired t-test on two equally long samples (x - y).
    pub fn paired_t_test(x: &[f64], y: &[f64]) -> Option<TTestResult> {
        if x.len() != y.len() || x.len() < 2 {
            return None;
        }
        let diffs: Vec<f64> = x.iter().zip(y).map(|(&a, &b)| a - b).collect();
        Self::one_sample_t_test(&diffs, 0.0)
    }

    /// One-sample t-test of H0: mean = mu0.
    pub fn one_sample_t_test(data: &[f64], mu0: f64) -> Option<TTestResult> {
        let n = data.len();
        if n < 2 || data.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mean = StatsCalculator::mean(data);
        let sd = StatsCalculator::sample_std(data);
        if sd <= 0.0 {
            return None;
        }

        let df = (n - 1) as f64;
        let statistic = (mean - mu0) / (sd / (n as f64).sqrt());
        let dist = StudentsT::new(0.0, 1.0, df).ok()?;
        let p_value = (2.0 * dist.sf(statistic.abs())).clamp(0.0, 1.0);

        Some(TTestResult {
            statistic,
            df,
            p_value,
        })
    }

    /// Cohen's d for paired samples: mean difference over the std of the differences.
    pub fn cohens_d_paired(diffs: &[f64]) -> f64 {
        StatsCalculator::mean(diffs) / StatsCalculator::sample_std(diffs)
    }

    /// One-way ANOVA of `values` grouped by `labels`.
    ///
    /// Groups are reported in sorted label order. `factor_name` labels the
    /// factor row, e.g. `C(gender)`.
    pub fn one_way_anova<S: AsRef<str>>(
        factor_name: &str,
        labels: &[S],
        values: &[f64],
    ) -> Option<AnovaResult> {
        if labels.len() != values.len() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut names: Vec<&str> = labels.iter().map(|l| l.as_ref()).collect();
        names.sort_unstable();
        names.dedup();

        let k = names.len();
        let total_n = values.len();
        if k < 2 || total_n <= k {
            return None;
        }

        let grand_mean = StatsCalculator::mean(values);
        let mut group_means = Vec::with_capacity(k);
        let mut ss_between = 0.0;
        let mut ss_within = 0.0;

        for name in &names {
            let group: Vec<f64> = labels
                .iter()
                .zip(values)
                .filter(|(l, _)| l.as_ref() == *name)
                .map(|(_, &v)| v)
                .collect();
            let mean = StatsCalculator::mean(&group);
            ss_between += group.len() as f64 * (mean - grand_mean).powi(2);
            ss_within += group.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
            group_means.push((name.to_string(), mean));
        }

        let df_between = (k - 1) as f64;
        let df_within = (total_n - k) as f64;
        let ms_between = ss_between / df_between;
        let ms_within = ss_within / df_within;

        let (f, p_value) = if ms_within > 0.0 {
            let f = ms_between / ms_within;
            let p = FisherSnedecor::new(df_between, df_within)
                .map(|dist| dist.sf(f))
                .unwrap_or(f64::NAN);
            (f, p)
        } else {
            (f64::INFINITY, 0.0)
        };

        Some(AnovaResult {
            factor: AnovaRow {
                source: factor_name.to_string(),
                sum_sq: ss_between,
                df: df_between,
                f: Some(f),
                p_value: Some(p_value),
            },
            residual: AnovaRow {
                source: "Residual".to_string(),
                sum_sq: ss_within,
                df: df_within,
                f: None,
                p_value: None,
            },
            group_means,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_matches_reference() {
        // differences -0.5,-0.2,-0.1,-0.3,-0.4: t = -3 * sqrt(2)
        let before = [5.0, 6.0, 7.0, 8.0, 9.0];
        let after = [5.5, 6.2, 7.1, 8.3, 9.4];
        let r = HypothesisTests::paired_t_test(&before, &after).unwrap();
        assert!((r.statistic + 4.242_641).abs() < 1e-5, "t = {}", r.statistic);
        assert_eq!(r.df, 4.0);
        assert!(r.p_value > 0.01 && r.p_value < 0.02, "p = {}", r.p_value);
    }

    #[test]
    fn paired_rejects_bad_input() {
        assert!(HypothesisTests::paired_t_test(&[1.0, 2.0], &[1.0]).is_none());
        assert!(HypothesisTests::paired_t_test(&[1.0], &[1.0]).is_none());
        // Constant differences
        assert!(HypothesisTests::paired_t_test(&[1.0, 2.0, 3.0], &[0.0, 1.0, 2.0]).is_none());
    }

    #[test]
    fn cohens_d_of_differences() {
        let d = HypothesisTests::cohens_d_paired(&[1.0, 2.0, 3.0]);
        assert!((d - 2.0).abs() < 1e-12);
    }

    #[test]
    fn anova_separated_groups() {
        let labels = ["a", "a", "a", "b", "b", "b"];
        let values = [1.0, 2.0, 3.0, 7.0, 8.0, 9.0];
        let r = HypothesisTests::one_way_anova("C(group)", &labels, &values).unwrap();

        assert!((r.factor.sum_sq - 54.0).abs() < 1e-9);
        assert!((r.residual.sum_sq - 4.0).abs() < 1e-9);
        assert_eq!(r.factor.df, 1.0);
        assert_eq!(r.residual.df, 4.0);
        assert!((r.factor.f.unwrap() - 54.0).abs() < 1e-9);
        assert!(r.factor.p_value.unwrap() < 0.01);
        assert!((r.eta_squared() - 54.0 / 58.0).abs() < 1e-12);
        assert_eq!(r.group_means[0], ("a".to_string(), 2.0));
    }

    #[test]
    fn anova_two_group_f_is_squared_t() {
        // With two groups, F equals the square of the pooled two-sample t
        let labels = ["x", "x", "x", "x", "y", "y", "y"];
        let values = [3.1, 2.9, 3.4, 3.0, 3.6, 3.9, 3.5];
        let r = HypothesisTests::one_way_anova("C(g)", &labels, &values).unwrap();
        let (a, b) = values.split_at(4);
        let (ma, mb) = (StatsCalculator::mean(a), StatsCalculator::mean(b));
        let sp2 = ((a.len() - 1) as f64 * StatsCalculator::sample_variance(a)
            + (b.len() - 1) as f64 * StatsCalculator::sample_variance(b))
            / 5.0;
        let t = (ma - mb) / (sp2 * (1.0 / 4.0 + 1.0 / 3.0)).sqrt();
        assert!((r.factor.f.unwrap() - t * t).abs() < 1e-9);
    }

    #[test]
    fn anova_needs_two_groups() {
        assert!(HypothesisTests::one_way_anova("C(g)", &["a", "a"], &[1.0, 2.0]).is_none());
        assert!(HypothesisTests::one_way_anova("C(g)", &["a", "b"], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn anova_table_lists_both_rows() {
        let r = HypothesisTests::one_way_anova("C(gender)", &["0", "0", "1", "1"], &[1.0, 2.0, 4.0, 6.0])
            .unwrap();
        let table = r.table();
        assert!(table.contains("C(gender)"));
        assert!(table.contains("Residual"));
        assert!(table.contains("PR(>F)"));
    }
}
