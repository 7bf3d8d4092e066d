use super::load_table;
use crate::data::{compare_keys, save_csv, DataProcessor, IdStrategy};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

pub struct ParticipantsOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub strategy: IdStrategy,
}

/// Demographics of one participant as written to the summary.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantInfo {
    pub participant_id: u32,
    pub age: String,
    pub bmi: String,
    pub gender: String,
}

#[derive(Debug, Serialize)]
pub struct ParticipantsReport {
    pub input_rows: usize,
    pub input_columns: usize,
    pub participants: usize,
    pub summary_rows: usize,
    pub first_participants: Vec<ParticipantInfo>,
    pub output: PathBuf,
}

pub fn run(opts: &ParticipantsOptions) -> Result<ParticipantsReport> {
    let loader = load_table(&opts.input)?;

    println!("=== ORIGINAL DATA CHECK ===");
    if let Some(df) = loader.dataframe() {
        println!("First few rows:");
        println!("{}", df.head(Some(5)));
    }
    println!(
        "\nDataset shape: ({}, {})",
        loader.row_count(),
        loader.column_count()
    );

    let records = DataProcessor::heart_rate_records(&loader)?;
    let ids = DataProcessor::assign_participant_ids(&records, opts.strategy);

    // Unique (BMI, gender, age) in order of first appearance
    let mut order: Vec<(&str, &str, &str)> = Vec::new();
    let mut seen = HashSet::new();
    for record in &records {
        let key = (
            record.bmi.as_str(),
            record.gender.as_str(),
            record.age.as_str(),
        );
        if seen.insert(key) {
            order.push(key);
        }
    }

    println!("\n=== PARTICIPANT ORDER ===");
    println!("Participants in order of first appearance:");
    println!("{:>4} {:>8} {:>7} {:>5}", "", "BMI", "gender", "age");
    for (i, (bmi, gender, age)) in order.iter().take(10).enumerate() {
        println!("{i:>4} {bmi:>8} {gender:>7} {age:>5}");
    }

    // One row per (participant_id, BMI, gender, age, device)
    let mut assignments: Vec<(u32, &str, &str, &str, &str)> = Vec::new();
    let mut assigned = HashSet::new();
    for (record, &id) in records.iter().zip(&ids) {
        let row = (
            id,
            record.bmi.as_str(),
            record.gender.as_str(),
            record.age.as_str(),
            record.device.as_str(),
        );
        if assigned.insert(row) {
            assignments.push(row);
        }
    }
    assignments.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| compare_keys(a.4, b.4)));

    println!("\n=== PARTICIPANT ID VERIFICATION ===");
    println!("First participant assignments:");
    println!(
        "{:>14} {:>8} {:>7} {:>5} {:>7}",
        "participant_id", "BMI", "gender", "age", "device"
    );
    for (id, bmi, gender, age, device) in assignments.iter().take(20) {
        println!("{id:>14} {bmi:>8} {gender:>7} {age:>5} {device:>7}");
    }

    let first_participants: Vec<ParticipantInfo> = [1, 2]
        .iter()
        .filter_map(|&wanted| assignments.iter().find(|a| a.0 == wanted))
        .map(|&(participant_id, bmi, gender, age, _)| ParticipantInfo {
            participant_id,
            age: age.to_string(),
            bmi: bmi.to_string(),
            gender: gender.to_string(),
        })
        .collect();

    println!();
    for p in &first_participants {
        println!(
            "Participant {}: Age {}, BMI {}, Gender {}",
            p.participant_id, p.age, p.bmi, p.gender
        );
    }

    println!("\n=== AGGREGATING DATA ===");
    let summary = DataProcessor::summarize_by_activity(&records, &ids);
    let mut df = DataProcessor::summaries_to_frame(&summary)?;
    println!("Summary dataframe shape: ({}, {})", df.height(), df.width());
    println!("First few rows of summary:");
    println!("{}", df.head(Some(12)));

    println!();
    for wanted in [1, 2] {
        if let Some(row) = summary.iter().find(|r| r.participant_id == wanted) {
            println!("Participant {wanted} BMI in output: {}", row.bmi);
            println!("Participant {wanted} Age in output: {}", row.age);
        }
    }

    save_csv(&mut df, &opts.output)
        .with_context(|| format!("failed to save summary to {:?}", opts.output))?;
    println!(
        "\nAnalysis complete. Results saved to {}",
        opts.output.display()
    );

    Ok(ParticipantsReport {
        input_rows: loader.row_count(),
        input_columns: loader.column_count(),
        participants: order.len(),
        summary_rows: summary.len(),
        first_participants,
        output: opts.output.clone(),
    })
}
