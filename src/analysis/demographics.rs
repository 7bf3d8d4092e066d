use super::load_table;
use crate::data::{save_csv, save_index_csv};
use crate::stats::StatsCalculator;
use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;
use std::path::PathBuf;

pub struct DemographicsOptions {
    pub input: PathBuf,
    pub stats_output: PathBuf,
    pub counts_output: PathBuf,
}

/// Mean and standard deviation rounded to two decimals.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MeanStd {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Serialize)]
pub struct DemographicsReport {
    pub age: MeanStd,
    pub bmi: MeanStd,
    pub gender_counts: Vec<(String, usize)>,
    pub participants: usize,
}

fn mean_std(values: &[Option<f64>]) -> MeanStd {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let stats = StatsCalculator::compute_descriptive_stats(&present);
    MeanStd {
        mean: StatsCalculator::round_to(stats.mean, 2),
        std: StatsCalculator::round_to(stats.std, 2),
    }
}

pub fn run(opts: &DemographicsOptions) -> Result<DemographicsReport> {
    let loader = load_table(&opts.input)?;

    let age = mean_std(&loader.column_f64("age")?);
    let bmi = mean_std(&loader.column_f64("BMI")?);

    println!("--- Mean and Standard Deviation for Age and BMI ---");
    println!("{:<5} {:>8} {:>8}", "", "age", "BMI");
    println!("{:<5} {:>8.2} {:>8.2}", "mean", age.mean, bmi.mean);
    println!("{:<5} {:>8.2} {:>8.2}", "std", age.std, bmi.std);

    let genders: Vec<String> = loader
        .column_text("gender")?
        .into_iter()
        .flatten()
        .collect();
    let gender_counts = StatsCalculator::value_counts(&genders);

    println!("\n Gender Counts");
    for (gender, count) in &gender_counts {
        println!("{gender:<8} {count}");
    }
    println!("Total participants: {}", loader.row_count());

    let mut stats_df = DataFrame::new(vec![
        Column::new("".into(), ["mean", "std"]),
        Column::new("age".into(), [age.mean, age.std]),
        Column::new("BMI".into(), [bmi.mean, bmi.std]),
    ])?;
    save_index_csv(&mut stats_df, &opts.stats_output)
        .with_context(|| format!("failed to save {:?}", opts.stats_output))?;

    let mut counts_df = DataFrame::new(vec![
        Column::new(
            "gender".into(),
            gender_counts.iter().map(|(g, _)| g.as_str()).collect::<Vec<_>>(),
        ),
        Column::new(
            "count".into(),
            gender_counts.iter().map(|(_, c)| *c as u32).collect::<Vec<u32>>(),
        ),
    ])?;
    save_csv(&mut counts_df, &opts.counts_output)
        .with_context(|| format!("failed to save {:?}", opts.counts_output))?;

    println!(
        "\nDescriptive statistics for Age and BMI saved to {}",
        opts.stats_output.display()
    );
    println!("Gender counts saved to {}", opts.counts_output.display());

    Ok(DemographicsReport {
        age,
        bmi,
        gender_counts,
        participants: loader.row_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_std_skips_missing_and_rounds() {
        let s = mean_std(&[Some(20.0), None, Some(25.0), Some(31.0)]);
        assert_eq!(s.mean, 25.33);
        assert_eq!(s.std, 5.51);
    }

    #[test]
    fn mean_ties_round_to_even() {
        let mut ages = vec![Some(32.0); 7];
        ages.push(Some(33.0));
        assert_eq!(mean_std(&ages).mean, 32.12);
    }
}
