use super::{device_name, load_table};
use crate::charts::{ChartPlotter, PdfDocument, RegressionPlot};
use crate::data::DataProcessor;
use crate::stats::{Correlation, CorrelationResult};
use anyhow::{Context, Result};
use plotters::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

pub struct DeviceCorrelationOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub device_a: String,
    pub device_b: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceCorrelationReport {
    pub correlation: CorrelationResult,
    pub output: PathBuf,
}

pub fn run(opts: &DeviceCorrelationOptions) -> Result<DeviceCorrelationReport> {
    let loader = load_table(&opts.input)?;
    let paired = DataProcessor::paired_participants(&loader, &opts.device_a, &opts.device_b)?;
    let hr_a: Vec<f64> = paired.iter().map(|p| p.device_a).collect();
    let hr_b: Vec<f64> = paired.iter().map(|p| p.device_b).collect();

    let correlation = Correlation::pearson(&hr_a, &hr_b).with_context(|| {
        format!(
            "cannot correlate {} with {}: need at least two varying paired readings",
            opts.device_a, opts.device_b
        )
    })?;

    println!("Pearson correlation (r) = {:.2}", correlation.r);
    println!("p-value = {:.3}", correlation.p_value);

    let name_a = device_name(&opts.device_a);
    let name_b = device_name(&opts.device_b);
    let title = format!("Relationship Between {name_a} and {name_b} Heart Rate Measurements");
    let x_label = format!("Average {name_b} Heart Rate (BPM)");
    let y_label = format!("Average {name_a} Heart Rate (BPM)");

    let mut doc = PdfDocument::new();
    {
        let root = doc.page((720, 576)).into_drawing_area();
        ChartPlotter::draw_regression(
            &root,
            &RegressionPlot {
                title: &title,
                x_label: &x_label,
                y_label: &y_label,
                x: &hr_b,
                y: &hr_a,
                range: (0.0, 150.0),
                annotation: vec![
                    format!("r = {:.2}", correlation.r),
                    format!("p = {:.3}", correlation.p_value),
                ],
                annotation_at: (112.0, 32.0),
            },
        )?;
    }
    doc.save(&opts.output)
        .with_context(|| format!("failed to save {:?}", opts.output))?;

    Ok(DeviceCorrelationReport {
        correlation,
        output: opts.output.clone(),
    })
}
