//! Device accuracy against the ECG reference, overall and split by skin tone.
//!
//! Codes 1-3 on the Fitzpatrick-style `Skin Tone` column count as lighter,
//! codes 4-6 as darker. Rows with a missing tone only enter the overall set.

use super::load_table;
use crate::charts::{ChartPlotter, HistogramPanel, PdfDocument, ScatterPanel};
use crate::stats::{format_p_value, Correlation, CorrelationResult, StatsCalculator};
use anyhow::{bail, Context, Result};
use plotters::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Figure size of one row of six panels, in points.
const ROW_SIZE: (u32, u32) = (1440, 216);
const FIXED_COUNT_LIMIT: f64 = 35_000.0;

pub struct SkinToneOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub reference: String,
    pub skin_tone: String,
    pub id_column: String,
    /// Device columns; empty means the six columns after the first.
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subset {
    Overall,
    Lighter,
    Darker,
}

impl Subset {
    fn contains(self, tone: Option<f64>) -> bool {
        match self {
            Subset::Overall => true,
            Subset::Lighter => tone.is_some_and(|t| t < 4.0),
            Subset::Darker => tone.is_some_and(|t| t > 3.0),
        }
    }
}

/// Paired device/reference readings of one subset.
#[derive(Debug, Clone, Serialize)]
pub struct SubsetResult {
    pub n: usize,
    pub correlation: Option<CorrelationResult>,
    #[serde(skip)]
    pub device: Vec<f64>,
    #[serde(skip)]
    pub reference: Vec<f64>,
}

impl SubsetResult {
    fn new(device: Vec<f64>, reference: Vec<f64>) -> Self {
        Self {
            n: device.len(),
            correlation: Correlation::pearson(&device, &reference),
            device,
            reference,
        }
    }

    fn r_or_zero(&self) -> f64 {
        self.correlation.map(|c| c.r).unwrap_or(0.0)
    }

    fn caption(&self) -> String {
        match self.correlation {
            Some(c) => format!("r = {:.3}, {}", c.r, format_p_value(c.p_value)),
            None => "r = n/a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceResult {
    pub device: String,
    pub overall: SubsetResult,
    pub lighter: SubsetResult,
    pub darker: SubsetResult,
}

impl DeviceResult {
    fn subset(&self, subset: Subset) -> &SubsetResult {
        match subset {
            Subset::Overall => &self.overall,
            Subset::Lighter => &self.lighter,
            Subset::Darker => &self.darker,
        }
    }

    /// Lighter minus darker correlation, missing correlations counted as zero.
    pub fn difference(&self) -> f64 {
        self.lighter.r_or_zero() - self.darker.r_or_zero()
    }
}

#[derive(Debug, Serialize)]
pub struct SkinToneReport {
    pub devices: Vec<DeviceResult>,
    pub unique_ids: usize,
    pub output: PathBuf,
}

fn split_subset(
    device: &[Option<f64>],
    reference: &[Option<f64>],
    tone: &[Option<f64>],
    subset: Subset,
) -> SubsetResult {
    let (x, y): (Vec<f64>, Vec<f64>) = device
        .iter()
        .zip(reference)
        .zip(tone)
        .filter(|(_, t)| subset.contains(**t))
        .filter_map(|((d, r), _)| Some(((*d)?, (*r)?)))
        .unzip();
    SubsetResult::new(x, y)
}

/// Correlate every device column with the reference in parallel, keeping device order.
pub fn analyse_devices(
    devices: &[(String, Vec<Option<f64>>)],
    reference: &[Option<f64>],
    tone: &[Option<f64>],
) -> Vec<DeviceResult> {
    devices
        .par_iter()
        .map(|(name, values)| DeviceResult {
            device: name.clone(),
            overall: split_subset(values, reference, tone, Subset::Overall),
            lighter: split_subset(values, reference, tone, Subset::Lighter),
            darker: split_subset(values, reference, tone, Subset::Darker),
        })
        .collect()
}

fn print_correlations(heading: &str, results: &[DeviceResult], subset: Subset) {
    println!("\n{heading}:");
    for result in results {
        let s = result.subset(subset);
        match s.correlation {
            Some(c) => println!(
                "{}: r = {:.4}, {}, N = {}",
                result.device,
                c.r,
                format_p_value(c.p_value),
                s.n
            ),
            None => println!("{}: r = n/a, N = {}", result.device, s.n),
        }
    }
}

fn scatter_page(doc: &mut PdfDocument, results: &[DeviceResult], subset: Subset) -> Result<()> {
    let panels: Vec<ScatterPanel> = results
        .iter()
        .map(|result| {
            let s = result.subset(subset);
            let title = match subset {
                Subset::Overall => format!("{} (N = {})", result.device, s.n),
                Subset::Lighter => format!("{} (Lighter N={})", result.device, s.n),
                Subset::Darker => format!("{} (Darker N={})", result.device, s.n),
            };
            ScatterPanel {
                title,
                subtitle: s.caption(),
                points: s.device.iter().copied().zip(s.reference.iter().copied()).collect(),
            }
        })
        .collect();

    let root = doc.page(ROW_SIZE).into_drawing_area();
    ChartPlotter::draw_scatter_row(&root, &panels, "Device [bpm]", "ECG [bpm]")?;
    Ok(())
}

fn histogram_page(
    doc: &mut PdfDocument,
    results: &[DeviceResult],
    step: f64,
    percent: bool,
    y_max: Option<f64>,
) -> Result<()> {
    let edges = StatsCalculator::arange(40.0, 180.0, step);
    let panels: Vec<HistogramPanel> = results
        .iter()
        .map(|result| {
            let values = &result.overall.reference;
            let weight = if percent && !values.is_empty() {
                100.0 / values.len() as f64
            } else {
                1.0
            };
            let heights = StatsCalculator::histogram(values, &edges, weight);
            HistogramPanel {
                title: format!("{} (N = {})", result.device, values.len()),
                bars: edges
                    .windows(2)
                    .zip(heights)
                    .map(|(w, h)| (w[0], w[1], h))
                    .collect(),
            }
        })
        .collect();

    let y_label = if percent { "%" } else { "N" };
    let root = doc.page(ROW_SIZE).into_drawing_area();
    ChartPlotter::draw_histogram_row(&root, &panels, "ECG [bpm]", y_label, y_max)?;
    Ok(())
}

pub fn run(opts: &SkinToneOptions) -> Result<SkinToneReport> {
    let loader = load_table(&opts.input)?;

    let device_names: Vec<String> = if opts.devices.is_empty() {
        loader.column_names().into_iter().skip(1).take(6).collect()
    } else {
        opts.devices.clone()
    };
    if device_names.is_empty() {
        bail!("no device columns found in {:?}", opts.input);
    }
    for column in device_names.iter().chain([&opts.reference, &opts.skin_tone]) {
        if !loader.has_column(column) {
            bail!("column '{column}' not found in {:?}", opts.input);
        }
    }

    let reference = loader.column_f64(&opts.reference)?;
    let tone = loader.column_f64(&opts.skin_tone)?;
    let devices = device_names
        .iter()
        .map(|name| Ok((name.clone(), loader.column_f64(name)?)))
        .collect::<Result<Vec<_>>>()?;

    let results = analyse_devices(&devices, &reference, &tone);

    print_correlations("Overall Correlations", &results, Subset::Overall);
    print_correlations("Lighter Skin Tone Correlations", &results, Subset::Lighter);
    print_correlations("Darker Skin Tone Correlations", &results, Subset::Darker);

    let mut doc = PdfDocument::new();
    scatter_page(&mut doc, &results, Subset::Overall)?;
    scatter_page(&mut doc, &results, Subset::Lighter)?;
    scatter_page(&mut doc, &results, Subset::Darker)?;
    histogram_page(&mut doc, &results, 10.0, false, Some(FIXED_COUNT_LIMIT))?;
    histogram_page(&mut doc, &results, 10.0, false, None)?;
    histogram_page(&mut doc, &results, 5.0, true, None)?;
    doc.save(&opts.output)
        .with_context(|| format!("failed to save {:?}", opts.output))?;

    let unique_ids = loader
        .column_text(&opts.id_column)?
        .into_iter()
        .flatten()
        .collect::<HashSet<_>>()
        .len();

    println!("All figures saved to '{}'", opts.output.display());
    println!("Number of unique IDs: {unique_ids}");

    let rule = "=".repeat(80);
    println!("\n{rule}");
    println!("CORRELATION SUMMARY TABLE");
    println!("{rule}");
    println!(
        "{:<15} {:<12} {:<12} {:<12} {:<12}",
        "Device", "Overall r", "Lighter r", "Darker r", "Difference"
    );
    println!("{}", "-".repeat(80));
    for result in &results {
        println!(
            "{:<15} {:<12.4} {:<12.4} {:<12.4} {:<12.4}",
            result.device,
            result.overall.r_or_zero(),
            result.lighter.r_or_zero(),
            result.darker.r_or_zero(),
            result.difference()
        );
    }
    println!("{rule}");

    Ok(SkinToneReport {
        devices: results,
        unique_ids,
        output: opts.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_codes_partition_subsets() {
        assert!(Subset::Lighter.contains(Some(3.0)));
        assert!(!Subset::Lighter.contains(Some(4.0)));
        assert!(Subset::Darker.contains(Some(4.0)));
        assert!(!Subset::Darker.contains(Some(3.0)));
        assert!(!Subset::Lighter.contains(None));
        assert!(!Subset::Darker.contains(None));
        assert!(Subset::Overall.contains(None));
    }

    #[test]
    fn devices_keep_order_and_split_by_tone() {
        let reference = vec![Some(60.0), Some(70.0), Some(80.0), Some(90.0), None, Some(100.0)];
        let tone = vec![Some(1.0), Some(2.0), Some(3.0), Some(5.0), Some(6.0), Some(6.0)];
        let devices = vec![
            (
                "Apple".to_string(),
                vec![Some(61.0), Some(69.0), Some(82.0), Some(88.0), Some(95.0), Some(103.0)],
            ),
            (
                "Garmin".to_string(),
                vec![Some(60.0), None, Some(80.0), Some(91.0), Some(95.0), Some(99.0)],
            ),
        ];

        let results = analyse_devices(&devices, &reference, &tone);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].device, "Apple");
        assert_eq!(results[0].overall.n, 5);
        assert_eq!(results[0].lighter.n, 3);
        assert_eq!(results[0].darker.n, 2);
        assert_eq!(results[1].overall.n, 4);
        assert_eq!(results[1].lighter.n, 2);

        // Two points always correlate perfectly with p = 1
        let darker = results[0].darker.correlation.unwrap();
        assert!((darker.r - 1.0).abs() < 1e-12);
        assert_eq!(darker.p_value, 1.0);
        assert!(results[0].lighter.correlation.unwrap().r > 0.95);
    }

    #[test]
    fn difference_counts_missing_as_zero() {
        let result = DeviceResult {
            device: "X".into(),
            overall: SubsetResult::new(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.5]),
            lighter: SubsetResult::new(vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]),
            darker: SubsetResult::new(vec![1.0], vec![1.0]),
        };
        assert!(result.darker.correlation.is_none());
        assert!((result.difference() - 1.0).abs() < 1e-12);
        assert_eq!(result.darker.caption(), "r = n/a");
    }
}
