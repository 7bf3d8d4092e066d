use super::load_table;
use crate::data::{save_csv, DataProcessor, PairedParticipant};
use crate::stats::{AnovaResult, HypothesisTests, TTestResult};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::PathBuf;

pub struct PairedOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub device_a: String,
    pub device_b: String,
}

#[derive(Debug, Serialize)]
pub struct PairedReport {
    pub participants: usize,
    pub t_test: TTestResult,
    pub cohens_d: f64,
    pub anova_gender: Option<AnovaResult>,
    pub anova_bmi: Option<AnovaResult>,
    pub anova_age: Option<AnovaResult>,
    pub output: PathBuf,
}

pub fn run(opts: &PairedOptions) -> Result<PairedReport> {
    let loader = load_table(&opts.input)?;
    if let Some(df) = loader.dataframe() {
        println!("{}", df.head(Some(5)));
    }

    let rows = DataProcessor::activity_summaries(&loader)?;
    let paired = DataProcessor::pivot_devices(&rows, &opts.device_a, &opts.device_b);
    if paired.len() < 2 {
        bail!(
            "need at least two participants with both {} and {} readings, found {}",
            opts.device_a,
            opts.device_b,
            paired.len()
        );
    }

    let mut df = DataProcessor::paired_to_frame(&paired, &opts.device_a, &opts.device_b)?;
    save_csv(&mut df, &opts.output)
        .with_context(|| format!("failed to save paired data to {:?}", opts.output))?;
    println!("Processed data saved to {}", opts.output.display());
    println!("{}", df.head(Some(5)));

    let a: Vec<f64> = paired.iter().map(|p| p.device_a).collect();
    let b: Vec<f64> = paired.iter().map(|p| p.device_b).collect();
    let diffs: Vec<f64> = paired.iter().map(PairedParticipant::hr_diff).collect();

    let Some(t_test) = HypothesisTests::paired_t_test(&a, &b) else {
        bail!("paired t-test is undefined: the heart-rate differences have no variance");
    };
    let cohens_d = HypothesisTests::cohens_d_paired(&diffs);

    println!(
        "\n--- Paired T-test ({} vs {}) ---",
        opts.device_a, opts.device_b
    );
    println!("T-statistic: {:.4}", t_test.statistic);
    println!("P-value: {:.4}", t_test.p_value);
    println!("Cohen's d: {:.4}", cohens_d);

    let genders: Vec<&str> = paired.iter().map(|p| p.gender.as_str()).collect();
    let anova_gender = report_anova("HR_diff vs Gender", "C(gender)", &genders, &diffs);

    let anova_bmi = group_labels(&paired, |p| &p.bmi, "BMI", ["Low BMI", "High BMI"])
        .and_then(|labels| report_anova("HR_diff vs BMI Group", "C(BMI_group)", &labels, &diffs));

    let anova_age = group_labels(&paired, |p| &p.age, "age", ["Young", "Old"])
        .and_then(|labels| report_anova("HR_diff vs Age Group", "C(age_group)", &labels, &diffs));

    Ok(PairedReport {
        participants: paired.len(),
        t_test,
        cohens_d,
        anova_gender,
        anova_bmi,
        anova_age,
        output: opts.output.clone(),
    })
}

/// Median-split labels for a numeric demographic column, or `None` with a warning.
fn group_labels<'a>(
    paired: &[PairedParticipant],
    field: impl Fn(&PairedParticipant) -> &String,
    column: &str,
    names: [&'a str; 2],
) -> Option<Vec<&'a str>> {
    let values: Option<Vec<f64>> = paired
        .iter()
        .map(|p| field(p).trim().parse::<f64>().ok())
        .collect();
    let Some(values) = values else {
        log::warn!("skipping {column} ANOVA: column is not numeric");
        return None;
    };

    match DataProcessor::median_split(&values) {
        Ok(high) => Some(high.into_iter().map(|h| names[usize::from(h)]).collect()),
        Err(e) => {
            log::warn!("skipping {column} ANOVA: {e}");
            None
        }
    }
}

fn report_anova<S: AsRef<str>>(
    heading: &str,
    factor: &str,
    labels: &[S],
    diffs: &[f64],
) -> Option<AnovaResult> {
    println!("\n--- ANOVA: {heading} ---");
    match HypothesisTests::one_way_anova(factor, labels, diffs) {
        Some(result) => {
            print!("{}", result.table());
            println!("Eta-squared: {:.4}", result.eta_squared());
            Some(result)
        }
        None => {
            log::warn!("{factor} needs at least two groups and more rows than groups");
            None
        }
    }
}
