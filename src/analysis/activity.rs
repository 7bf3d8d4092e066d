use super::load_table;
use crate::data::{ActivitySummary, DataProcessor};
use crate::stats::{Correlation, CorrelationResult, SIGNIFICANCE_THRESHOLD};
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

pub struct ActivityOptions {
    pub input: PathBuf,
    pub device_a: String,
    pub device_b: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityCorrelation {
    pub activity: String,
    pub correlation: CorrelationResult,
    pub significant: bool,
}

#[derive(Debug, Serialize)]
pub struct ActivityReport {
    pub activities: Vec<String>,
    pub results: Vec<ActivityCorrelation>,
}

/// Correlate both devices within each activity, pairing readings by row order.
pub fn correlate_activities(
    rows: &[ActivitySummary],
    activities: &[String],
    device_a: &str,
    device_b: &str,
) -> Vec<ActivityCorrelation> {
    let mut results = Vec::new();

    for activity in activities {
        let subset: Vec<ActivitySummary> = rows
            .iter()
            .filter(|r| &r.activity == activity)
            .cloned()
            .collect();
        let a = DataProcessor::device_values(&subset, device_a);
        let b = DataProcessor::device_values(&subset, device_b);

        if a.len() != b.len() {
            log::warn!(
                "skipping {activity}: {} {device_a} readings vs {} {device_b} readings",
                a.len(),
                b.len()
            );
            continue;
        }

        // A missing reading leaves the whole activity undefined.
        let (Some(a), Some(b)) = (
            a.into_iter().collect::<Option<Vec<f64>>>(),
            b.into_iter().collect::<Option<Vec<f64>>>(),
        ) else {
            log::warn!("skipping {activity}: missing heart-rate readings");
            continue;
        };

        match Correlation::pearson(&a, &b) {
            Some(correlation) => results.push(ActivityCorrelation {
                activity: activity.clone(),
                significant: correlation.p_value < SIGNIFICANCE_THRESHOLD,
                correlation,
            }),
            None => log::warn!("skipping {activity}: correlation is undefined"),
        }
    }

    results
}

pub fn run(opts: &ActivityOptions) -> Result<ActivityReport> {
    let loader = load_table(&opts.input)?;
    let rows = DataProcessor::activity_summaries(&loader)?;
    let activities = loader.unique_values("activity")?;

    println!("Activities found: {activities:?}");
    println!("{}", "-".repeat(50));

    let results = correlate_activities(&rows, &activities, &opts.device_a, &opts.device_b);

    println!("Correlation Results by Activity:");
    for result in &results {
        let significance = if result.significant {
            "Statistically Significant"
        } else {
            "Not Statistically Significant"
        };
        println!(
            "Activity: {:<15} | r = {:.2} | p = {:.3} | {}",
            result.activity, result.correlation.r, result.correlation.p_value, significance
        );
    }

    Ok(ActivityReport {
        activities,
        results,
    })
}
