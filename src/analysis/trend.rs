use crate::charts::{BarChart, ChartPlotter, PdfDocument};
use crate::stats::{Correlation, CorrelationResult, PowerAnalysis};
use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const POWER_ALPHA: f64 = 0.05;

/// Built-in yearly tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TrendPreset {
    /// Apple Watch sales in millions, 2015-2023
    Sales,
    /// Clinical trials mentioning the Apple Watch, 2015-2025
    Studies,
}

/// A yearly series and how to report it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSpec {
    pub title: String,
    pub y_label: String,
    /// Plural noun used in the printed statistics, e.g. `studies`.
    pub noun: String,
    /// Unit appended to printed amounts, e.g. `million`.
    #[serde(default)]
    pub unit: Option<String>,
    pub years: Vec<i32>,
    pub values: Vec<f64>,
    /// Values are whole counts.
    #[serde(default)]
    pub integer_values: bool,
    /// Also report statistical power of the year/value correlation.
    #[serde(default)]
    pub power: bool,
    pub output: PathBuf,
}

impl TrendSpec {
    pub fn preset(preset: TrendPreset) -> Self {
        match preset {
            TrendPreset::Sales => Self {
                title: "Apple Watch Sales by Year (2015-2023)".into(),
                y_label: "Sales (in Millions)".into(),
                noun: "sales".into(),
                unit: Some("million".into()),
                years: (2015..=2023).collect(),
                values: vec![8.5, 11.6, 17.7, 22.5, 28.4, 31.1, 39.4, 53.9, 38.0],
                integer_values: false,
                power: false,
                output: "Apple_Watch_Sales.pdf".into(),
            },
            TrendPreset::Studies => Self {
                title: "Instances of \"Apple Watch\" in Clinical Trials Database Since Release (2015-2025)"
                    .into(),
                y_label: "Number of Clinical Studies".into(),
                noun: "studies".into(),
                unit: None,
                years: (2015..=2025).collect(),
                values: vec![2.0, 3.0, 6.0, 12.0, 5.0, 9.0, 18.0, 15.0, 14.0, 10.0, 14.0],
                integer_values: true,
                power: true,
                output: "Apple_Watch_Clinical_Studies.pdf".into(),
            },
        }
    }

    pub fn from_json(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {path:?}"))?;
        let spec: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse trend spec {path:?}"))?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        if self.years.is_empty() {
            bail!("trend table is empty");
        }
        if self.years.len() != self.values.len() {
            bail!(
                "trend table has {} years but {} values",
                self.years.len(),
                self.values.len()
            );
        }
        Ok(())
    }

    fn amount(&self, value: f64, decimals: usize) -> String {
        if self.integer_values {
            format!("{value:.0}")
        } else {
            format!("{value:.decimals$}")
        }
    }
}

pub struct TrendOptions {
    pub spec: TrendSpec,
    /// Overrides the spec's output file.
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct TrendReport {
    pub total: f64,
    pub mean: f64,
    pub max: (i32, f64),
    pub min: (i32, f64),
    pub pct_change: Vec<(i32, f64)>,
    pub correlation: Option<CorrelationResult>,
    pub power: Option<f64>,
    pub output: PathBuf,
}

/// Year-over-year percentage change, with the first year set to zero.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut changes = Vec::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        if i == 0 {
            changes.push(0.0);
        } else {
            let prev = values[i - 1];
            changes.push((v - prev) / prev * 100.0);
        }
    }
    changes
}

/// First (year, value) holding the extreme value picked by `better`.
fn extreme(years: &[i32], values: &[f64], better: impl Fn(f64, f64) -> bool) -> (i32, f64) {
    let mut best = (years[0], values[0]);
    for (&year, &value) in years.iter().zip(values).skip(1) {
        if better(value, best.1) {
            best = (year, value);
        }
    }
    best
}

/// Power of detecting the year/value correlation with one observation per year.
pub fn correlation_power(r: f64, n_years: usize) -> Option<f64> {
    let effect_size = r / (1.0 - r * r).sqrt();
    PowerAnalysis::ttest_ind_power(effect_size, n_years as f64, POWER_ALPHA, 1.0)
}

pub fn run(opts: &TrendOptions) -> Result<TrendReport> {
    let spec = &opts.spec;
    spec.validate()?;

    let total: f64 = spec.values.iter().sum();
    let mean = total / spec.values.len() as f64;
    let max = extreme(&spec.years, &spec.values, |a, b| a > b);
    let min = extreme(&spec.years, &spec.values, |a, b| a < b);
    let changes = pct_change(&spec.values);

    let first = spec.years[0];
    let last = spec.years[spec.years.len() - 1];
    let unit = spec.unit.as_deref().map(|u| format!(" {u}")).unwrap_or_default();
    let per_item = spec
        .unit
        .as_deref()
        .unwrap_or(spec.noun.as_str())
        .to_string();
    let raw = |v: f64| if spec.integer_values { format!("{v:.0}") } else { format!("{v}") };

    println!("--- Trend Statistics ---");
    println!(
        "Total {} from {first}-{last}: {}{unit}",
        spec.noun,
        spec.amount(total, 2)
    );
    println!("Average {} per year: {mean:.2}{unit}", spec.noun);
    println!(
        "Year with the most {}: {} with {} {per_item}",
        spec.noun,
        max.0,
        raw(max.1)
    );
    println!(
        "Year with the fewest {}: {} with {} {per_item}",
        spec.noun,
        min.0,
        raw(min.1)
    );

    println!("\nYear-over-Year Percentage Change in {}:", capitalise(&spec.noun));
    println!("{:>4}  Year-over-Year Change (%)", "Year");
    for (year, change) in spec.years.iter().zip(&changes) {
        println!("{year:>4}  {change:>25.6}");
    }

    let years_f: Vec<f64> = spec.years.iter().map(|&y| f64::from(y)).collect();
    let correlation = Correlation::pearson(&years_f, &spec.values);
    let power = if spec.power {
        correlation.and_then(|c| correlation_power(c.r, spec.years.len()))
    } else {
        None
    };

    if spec.power {
        println!("\n--- Correlation and Power Analysis ---");
    } else {
        println!("\n--- Correlation Analysis ---");
    }
    match correlation {
        Some(c) => {
            println!("Pearson's r: {:.4}", c.r);
            println!("P-value: {:.4}", c.p_value);
        }
        None => log::warn!("correlation is undefined for this table"),
    }
    if spec.power {
        match power {
            Some(p) => println!("Statistical Power: {p:.4}"),
            None => log::warn!("statistical power is undefined for this table"),
        }
    }

    let output = opts.output.clone().unwrap_or_else(|| spec.output.clone());
    let mut doc = PdfDocument::new();
    {
        let root = doc.page((720, 432)).into_drawing_area();
        ChartPlotter::draw_bar_chart(
            &root,
            &BarChart {
                title: &spec.title,
                x_label: "Year",
                y_label: &spec.y_label,
                years: &spec.years,
                values: &spec.values,
                integer_values: spec.integer_values,
            },
        )?;
    }
    doc.save(&output)
        .with_context(|| format!("failed to save {output:?}"))?;
    println!("\nPDF graph '{}' has been created successfully!", output.display());

    Ok(TrendReport {
        total,
        mean,
        max,
        min,
        pct_change: spec.years.iter().copied().zip(changes).collect(),
        correlation,
        power,
        output,
    })
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_year_has_no_change() {
        let changes = pct_change(&[2.0, 3.0, 6.0, 3.0]);
        assert_eq!(changes, vec![0.0, 50.0, 100.0, -50.0]);
    }

    #[test]
    fn extremes_use_first_occurrence() {
        let spec = TrendSpec::preset(TrendPreset::Studies);
        // 14 occurs twice but 18 is the maximum; 2 is the minimum
        assert_eq!(extreme(&spec.years, &spec.values, |a, b| a > b), (2021, 18.0));
        assert_eq!(extreme(&spec.years, &spec.values, |a, b| a < b), (2015, 2.0));
        let ties = extreme(&[2000, 2001, 2002], &[5.0, 7.0, 7.0], |a, b| a > b);
        assert_eq!(ties, (2001, 7.0));
    }

    #[test]
    fn presets_are_consistent() {
        for preset in [TrendPreset::Sales, TrendPreset::Studies] {
            let spec = TrendSpec::preset(preset);
            assert!(spec.validate().is_ok());
        }
        let sales = TrendSpec::preset(TrendPreset::Sales);
        let total: f64 = sales.values.iter().sum();
        assert!((total - 251.1).abs() < 1e-9);
    }

    #[test]
    fn spec_from_json_fills_defaults() {
        let json = r#"{
            "title": "Downloads",
            "y_label": "Downloads",
            "noun": "downloads",
            "years": [2020, 2021],
            "values": [1.0, 2.0],
            "output": "downloads.pdf"
        }"#;
        let spec: TrendSpec = serde_json::from_str(json).unwrap();
        assert!(spec.unit.is_none());
        assert!(!spec.power);
        assert!(!spec.integer_values);
    }

    #[test]
    fn mismatched_table_is_rejected() {
        let mut spec = TrendSpec::preset(TrendPreset::Sales);
        spec.values.pop();
        assert!(spec.validate().is_err());
    }

    #[test]
    fn power_grows_with_correlation() {
        let weak = correlation_power(0.2, 11).unwrap();
        let strong = correlation_power(0.7, 11).unwrap();
        assert!(weak < strong);
        assert!(strong > 0.0 && strong <= 1.0);
    }

    #[test]
    fn capitalise_first_letter() {
        assert_eq!(capitalise("sales"), "Sales");
        assert_eq!(capitalise(""), "");
    }
}
