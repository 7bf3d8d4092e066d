//! HR Analysis - wearable heart-rate statistics & dissertation figures
//!
//! Each subcommand reads one CSV table (or a yearly trend table), prints its
//! statistics and writes one CSV or PDF.

mod analysis;
mod charts;
mod data;
mod stats;

use analysis::activity::ActivityOptions;
use analysis::demographics::DemographicsOptions;
use analysis::device_correlation::DeviceCorrelationOptions;
use analysis::paired::PairedOptions;
use analysis::participants::ParticipantsOptions;
use analysis::skin_tone::SkinToneOptions;
use analysis::trend::{TrendOptions, TrendPreset, TrendSpec};
use analysis::Report;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use data::IdStrategy;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Also write the computed statistics as JSON
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assign participant IDs and average heart rate per activity
    Participants {
        #[arg(long, default_value = "aw_fb_cleansed.csv")]
        input: PathBuf,
        #[arg(long, default_value = "participant_summary_corrected.csv")]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = IdStrategy::FirstAppearance)]
        ids: IdStrategy,
    },

    /// Pair both devices per participant, paired t-test and ANOVAs of the difference
    Paired {
        #[arg(long, default_value = "participant_summary_corrected.csv")]
        input: PathBuf,
        #[arg(long, default_value = "processed_participant_data.csv")]
        output: PathBuf,
        #[arg(long, default_value = "AW")]
        device_a: String,
        #[arg(long, default_value = "FB")]
        device_b: String,
    },

    /// Age/BMI mean and std, gender counts
    Demographics {
        #[arg(long, default_value = "processed_participant_data.csv")]
        input: PathBuf,
        #[arg(long, default_value = "age_bmi_descriptive_stats.csv")]
        stats_output: PathBuf,
        #[arg(long, default_value = "gender_counts.csv")]
        counts_output: PathBuf,
    },

    /// Correlate the per-participant averages of both devices
    DeviceCorrelation {
        #[arg(long, default_value = "processed_participant_data.csv")]
        input: PathBuf,
        #[arg(long, default_value = "device_correlation.pdf")]
        output: PathBuf,
        #[arg(long, default_value = "AW")]
        device_a: String,
        #[arg(long, default_value = "FB")]
        device_b: String,
    },

    /// Correlate both devices within each activity
    ActivityCorrelation {
        #[arg(long, default_value = "participant_summary_corrected.csv")]
        input: PathBuf,
        #[arg(long, default_value = "AW")]
        device_a: String,
        #[arg(long, default_value = "FB")]
        device_b: String,
    },

    /// Device accuracy against ECG by skin tone
    SkinTone {
        #[arg(long, default_value = "deidentified_data.csv")]
        input: PathBuf,
        #[arg(long, default_value = "bent_analysis_figures.pdf")]
        output: PathBuf,
        #[arg(long, default_value = "ECG")]
        reference: String,
        #[arg(long, default_value = "Skin Tone")]
        skin_tone: String,
        #[arg(long, default_value = "ID")]
        id_column: String,
        /// Device columns (default: the six columns after the first)
        #[arg(long, value_delimiter = ',')]
        devices: Vec<String>,
    },

    /// Yearly trend statistics and bar chart
    Trend {
        #[arg(long, value_enum, required_unless_present = "spec", conflicts_with = "spec")]
        preset: Option<TrendPreset>,
        /// JSON trend table
        #[arg(long)]
        spec: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = Cli::parse();
    log::debug!("{args:#?}");

    let report = match args.command {
        Command::Participants { input, output, ids } => {
            Report::Participants(analysis::participants::run(&ParticipantsOptions {
                input,
                output,
                strategy: ids,
            })?)
        }
        Command::Paired {
            input,
            output,
            device_a,
            device_b,
        } => Report::Paired(analysis::paired::run(&PairedOptions {
            input,
            output,
            device_a,
            device_b,
        })?),
        Command::Demographics {
            input,
            stats_output,
            counts_output,
        } => Report::Demographics(analysis::demographics::run(&DemographicsOptions {
            input,
            stats_output,
            counts_output,
        })?),
        Command::DeviceCorrelation {
            input,
            output,
            device_a,
            device_b,
        } => Report::DeviceCorrelation(analysis::device_correlation::run(
            &DeviceCorrelationOptions {
                input,
                output,
                device_a,
                device_b,
            },
        )?),
        Command::ActivityCorrelation {
            input,
            device_a,
            device_b,
        } => Report::ActivityCorrelation(analysis::activity::run(&ActivityOptions {
            input,
            device_a,
            device_b,
        })?),
        Command::SkinTone {
            input,
            output,
            reference,
            skin_tone,
            id_column,
            devices,
        } => Report::SkinTone(analysis::skin_tone::run(&SkinToneOptions {
            input,
            output,
            reference,
            skin_tone,
            id_column,
            devices,
        })?),
        Command::Trend {
            preset,
            spec,
            output,
        } => {
            let spec = match (spec, preset) {
                (Some(path), _) => TrendSpec::from_json(&path)?,
                (None, Some(preset)) => TrendSpec::preset(preset),
                (None, None) => TrendSpec::preset(TrendPreset::Studies),
            };
            Report::Trend(analysis::trend::run(&TrendOptions { spec, output })?)
        }
    };

    if let Some(path) = args.report {
        report
            .save_json(&path)
            .context("failed to save report")?;
    }

    Ok(())
}
