//! Analysis module - one pipeline per subcommand
//!
//! Each analysis reads one table, prints its results and writes one
//! artefact. The returned report carries the computed numbers so they can
//! also be saved as JSON.

pub mod activity;
pub mod demographics;
pub mod device_correlation;
pub mod paired;
pub mod participants;
pub mod skin_tone;
pub mod trend;

use activity::ActivityReport;
use demographics::DemographicsReport;
use device_correlation::DeviceCorrelationReport;
use paired::PairedReport;
use participants::ParticipantsReport;
use skin_tone::SkinToneReport;
use trend::TrendReport;

use crate::data::DataLoader;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Results of whichever analysis ran.
#[derive(Debug, Serialize)]
#[serde(tag = "analysis", rename_all = "kebab-case")]
pub enum Report {
    Participants(ParticipantsReport),
    Paired(PairedReport),
    Demographics(DemographicsReport),
    DeviceCorrelation(DeviceCorrelationReport),
    ActivityCorrelation(ActivityReport),
    SkinTone(SkinToneReport),
    Trend(TrendReport),
}

impl Report {
    /// Write the report as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("failed to create {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .with_context(|| format!("failed to write report to {path:?}"))?;
        log::info!("saved report {path:?}");
        Ok(())
    }
}

fn load_table(path: &Path) -> Result<DataLoader> {
    let mut loader = DataLoader::new();
    loader
        .load_csv(path)
        .with_context(|| format!("failed to load {path:?}"))?;
    Ok(loader)
}

/// Display name of a device label.
fn device_name(label: &str) -> &str {
    match label {
        "AW" => "Apple Watch",
        "FB" => "Fitbit",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_devices_get_full_names() {
        assert_eq!(device_name("AW"), "Apple Watch");
        assert_eq!(device_name("FB"), "Fitbit");
        assert_eq!(device_name("Garmin"), "Garmin");
    }
}
