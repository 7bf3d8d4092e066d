//! Data Processor Module
//! Participant identification, per-activity aggregation and device pivoting.

use crate::data::loader::{DataLoader, LoaderError};
use crate::stats::StatsCalculator;
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    LoaderError(#[from] LoaderError),
    #[error("Bin edges must be unique: {0:?}")]
    DuplicateBinEdges([f64; 3]),
    #[error("Cannot split an empty column")]
    EmptyInput,
}

/// How participant IDs are derived from (BMI, gender, age).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum IdStrategy {
    /// Number participants in order of first appearance, same ID on every device.
    #[default]
    FirstAppearance,
    /// Number participants by sorted key, then renumber per device.
    SortedKeys,
}

/// One row of a raw wearable export.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateRecord {
    pub bmi: String,
    pub gender: String,
    pub age: String,
    pub device: String,
    pub activity: String,
    pub heart_rate: Option<f64>,
}

impl HeartRateRecord {
    fn participant_key(&self) -> (&str, &str, &str) {
        (&self.bmi, &self.gender, &self.age)
    }
}

/// Mean heart rate of one participant on one device during one activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub participant_id: u32,
    pub gender: String,
    pub age: String,
    pub bmi: String,
    pub heart_rate: Option<f64>,
    pub device: String,
    pub activity: String,
}

/// One participant with the mean heart rate of both devices.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedParticipant {
    pub participant_id: u32,
    pub gender: String,
    pub age: String,
    pub bmi: String,
    pub device_a: f64,
    pub device_b: f64,
}

impl PairedParticipant {
    pub fn hr_diff(&self) -> f64 {
        self.device_a - self.device_b
    }
}

/// Compare two textual cells, numerically when both parse as numbers.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn compare_tuple(a: &[&str], b: &[&str]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| compare_keys(x, y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Heart-rate column name for a device label, e.g. `heart_rate_AW`.
pub fn device_column(device: &str) -> String {
    format!("heart_rate_{device}")
}

/// Handles the cleaning and reshaping steps of the participant pipeline.
pub struct DataProcessor;

impl DataProcessor {
    /// Extract raw wearable records. Rows with a missing key are skipped.
    pub fn heart_rate_records(
        loader: &DataLoader,
    ) -> Result<Vec<HeartRateRecord>, ProcessorError> {
        let bmi = loader.column_text("BMI")?;
        let gender = loader.column_text("gender")?;
        let age = loader.column_text("age")?;
        let device = loader.column_text("device")?;
        let activity = loader.column_text("activity")?;
        let heart_rate = loader.column_f64("heart_rate")?;

        let mut records = Vec::with_capacity(loader.row_count());
        let mut skipped = 0usize;

        for i in 0..loader.row_count() {
            match (&bmi[i], &gender[i], &age[i], &device[i], &activity[i]) {
                (Some(b), Some(g), Some(a), Some(d), Some(act)) => records.push(HeartRateRecord {
                    bmi: b.clone(),
                    gender: g.clone(),
                    age: a.clone(),
                    device: d.clone(),
                    activity: act.clone(),
                    heart_rate: heart_rate[i],
                }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            log::warn!("skipped {skipped} rows with a missing BMI/gender/age/device/activity");
        }

        Ok(records)
    }

    /// Participant ID for every record, in record order.
    pub fn assign_participant_ids(records: &[HeartRateRecord], strategy: IdStrategy) -> Vec<u32> {
        // Unique participants in order of first appearance
        let mut order: Vec<(&str, &str, &str)> = Vec::new();
        let mut first_index: HashMap<(&str, &str, &str), usize> = HashMap::new();
        for record in records {
            let key = record.participant_key();
            if !first_index.contains_key(&key) {
                first_index.insert(key, order.len());
                order.push(key);
            }
        }

        match strategy {
            IdStrategy::FirstAppearance => records
                .iter()
                .map(|r| first_index[&r.participant_key()] as u32 + 1)
                .collect(),
            IdStrategy::SortedKeys => {
                let mut sorted = order.clone();
                sorted.sort_by(|a, b| compare_tuple(&[a.0, a.1, a.2], &[b.0, b.1, b.2]));
                let group: HashMap<(&str, &str, &str), u32> = sorted
                    .iter()
                    .enumerate()
                    .map(|(i, key)| (*key, i as u32 + 1))
                    .collect();

                // Distinct (device, group) pairs sorted by (group, device)
                let mut pairs: Vec<(u32, &str)> = records
                    .iter()
                    .map(|r| (group[&r.participant_key()], r.device.as_str()))
                    .collect();
                pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| compare_keys(a.1, b.1)));
                pairs.dedup();

                let mut per_device: HashMap<&str, u32> = HashMap::new();
                let mut ids: HashMap<(u32, &str), u32> = HashMap::new();
                for (g, device) in pairs {
                    let counter = per_device.entry(device).or_insert(0);
                    *counter += 1;
                    ids.insert((g, device), *counter);
                }

                records
                    .iter()
                    .map(|r| ids[&(group[&r.participant_key()], r.device.as_str())])
                    .collect()
            }
        }
    }

    /// Mean heart rate per (device, participant, gender, age, BMI, activity), sorted by those keys.
    pub fn summarize_by_activity(
        records: &[HeartRateRecord],
        ids: &[u32],
    ) -> Vec<ActivitySummary> {
        let mut groups: HashMap<(&str, u32, &str, &str, &str, &str), (f64, usize)> =
            HashMap::new();

        for (record, &id) in records.iter().zip(ids) {
            let entry = groups
                .entry((
                    record.device.as_str(),
                    id,
                    record.gender.as_str(),
                    record.age.as_str(),
                    record.bmi.as_str(),
                    record.activity.as_str(),
                ))
                .or_insert((0.0, 0));
            if let Some(hr) = record.heart_rate {
                entry.0 += hr;
                entry.1 += 1;
            }
        }

        let mut keys: Vec<_> = groups.keys().copied().collect();
        keys.sort_by(|a, b| {
            compare_keys(a.0, b.0)
                .then(a.1.cmp(&b.1))
                .then_with(|| compare_tuple(&[a.2, a.3, a.4, a.5], &[b.2, b.3, b.4, b.5]))
        });

        keys.into_iter()
            .map(|key| {
                let (sum, count) = groups[&key];
                ActivitySummary {
                    participant_id: key.1,
                    gender: key.2.to_string(),
                    age: key.3.to_string(),
                    bmi: key.4.to_string(),
                    heart_rate: (count > 0).then(|| sum / count as f64),
                    device: key.0.to_string(),
                    activity: key.5.to_string(),
                }
            })
            .collect()
    }

    /// Read a participant summary table back into rows.
    pub fn activity_summaries(loader: &DataLoader) -> Result<Vec<ActivitySummary>, ProcessorError> {
        let id = loader.column_f64("participant_id")?;
        let gender = loader.column_text("gender")?;
        let age = loader.column_text("age")?;
        let bmi = loader.column_text("BMI")?;
        let heart_rate = loader.column_f64("heart_rate")?;
        let device = loader.column_text("device")?;
        let activity = loader.column_text("activity")?;

        let mut rows = Vec::with_capacity(loader.row_count());
        for i in 0..loader.row_count() {
            if let (Some(id), Some(g), Some(a), Some(b), Some(d), Some(act)) =
                (id[i], &gender[i], &age[i], &bmi[i], &device[i], &activity[i])
            {
                rows.push(ActivitySummary {
                    participant_id: id as u32,
                    gender: g.clone(),
                    age: a.clone(),
                    bmi: b.clone(),
                    heart_rate: heart_rate[i],
                    device: d.clone(),
                    activity: act.clone(),
                });
            }
        }
        Ok(rows)
    }

    /// Average across activities per participant and device, then pivot the two devices side by side.
    pub fn pivot_devices(
        rows: &[ActivitySummary],
        device_a: &str,
        device_b: &str,
    ) -> Vec<PairedParticipant> {
        type Key<'a> = (u32, &'a str, &'a str, &'a str);
        let mut sums: HashMap<Key<'_>, [(f64, usize); 2]> = HashMap::new();

        for row in rows {
            let slot = if row.device == device_a {
                0
            } else if row.device == device_b {
                1
            } else {
                continue;
            };
            let entry = sums
                .entry((
                    row.participant_id,
                    row.gender.as_str(),
                    row.age.as_str(),
                    row.bmi.as_str(),
                ))
                .or_insert([(0.0, 0); 2]);
            if let Some(hr) = row.heart_rate {
                entry[slot].0 += hr;
                entry[slot].1 += 1;
            }
        }

        let mut keys: Vec<Key<'_>> = sums.keys().copied().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| compare_tuple(&[a.1, a.2, a.3], &[b.1, b.2, b.3])));

        let mut dropped = 0usize;
        let paired: Vec<PairedParticipant> = keys
            .into_iter()
            .filter_map(|key| {
                let [(sum_a, n_a), (sum_b, n_b)] = sums[&key];
                if n_a == 0 || n_b == 0 {
                    dropped += 1;
                    return None;
                }
                Some(PairedParticipant {
                    participant_id: key.0,
                    gender: key.1.to_string(),
                    age: key.2.to_string(),
                    bmi: key.3.to_string(),
                    device_a: sum_a / n_a as f64,
                    device_b: sum_b / n_b as f64,
                })
            })
            .collect();

        if dropped > 0 {
            log::warn!("dropped {dropped} participants without readings from both {device_a} and {device_b}");
        }

        paired
    }

    /// Read a processed participant table back into rows.
    pub fn paired_participants(
        loader: &DataLoader,
        device_a: &str,
        device_b: &str,
    ) -> Result<Vec<PairedParticipant>, ProcessorError> {
        let id = loader.column_f64("participant_id")?;
        let gender = loader.column_text("gender")?;
        let age = loader.column_text("age")?;
        let bmi = loader.column_text("BMI")?;
        let hr_a = loader.column_f64(&device_column(device_a))?;
        let hr_b = loader.column_f64(&device_column(device_b))?;

        let mut rows = Vec::with_capacity(loader.row_count());
        for i in 0..loader.row_count() {
            if let (Some(id), Some(g), Some(a), Some(b), Some(x), Some(y)) =
                (id[i], &gender[i], &age[i], &bmi[i], hr_a[i], hr_b[i])
            {
                rows.push(PairedParticipant {
                    participant_id: id as u32,
                    gender: g.clone(),
                    age: a.clone(),
                    bmi: b.clone(),
                    device_a: x,
                    device_b: y,
                });
            }
        }
        Ok(rows)
    }

    /// Heart rates of one device in row order. Missing readings keep their slot.
    pub fn device_values(rows: &[ActivitySummary], device: &str) -> Vec<Option<f64>> {
        rows.iter()
            .filter(|r| r.device == device)
            .map(|r| r.heart_rate)
            .collect()
    }

    /// Two-bin quantile cut. Returns `false` for the low bin and `true` for the high bin.
    pub fn median_split(values: &[f64]) -> Result<Vec<bool>, ProcessorError> {
        if values.is_empty() {
            return Err(ProcessorError::EmptyInput);
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let edges = [
            sorted[0],
            StatsCalculator::percentile(&sorted, 50.0),
            sorted[sorted.len() - 1],
        ];

        if edges[0] == edges[1] || edges[1] == edges[2] {
            return Err(ProcessorError::DuplicateBinEdges(edges));
        }

        Ok(values.iter().map(|&v| v > edges[1]).collect())
    }

    pub fn summaries_to_frame(rows: &[ActivitySummary]) -> Result<DataFrame, ProcessorError> {
        let df = DataFrame::new(vec![
            Column::new(
                "participant_id".into(),
                rows.iter().map(|r| r.participant_id).collect::<Vec<u32>>(),
            ),
            Column::new("gender".into(), rows.iter().map(|r| r.gender.as_str()).collect::<Vec<_>>()),
            Column::new("age".into(), rows.iter().map(|r| r.age.as_str()).collect::<Vec<_>>()),
            Column::new("BMI".into(), rows.iter().map(|r| r.bmi.as_str()).collect::<Vec<_>>()),
            Column::new(
                "heart_rate".into(),
                rows.iter().map(|r| r.heart_rate).collect::<Vec<Option<f64>>>(),
            ),
            Column::new("device".into(), rows.iter().map(|r| r.device.as_str()).collect::<Vec<_>>()),
            Column::new(
                "activity".into(),
                rows.iter().map(|r| r.activity.as_str()).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    pub fn paired_to_frame(
        rows: &[PairedParticipant],
        device_a: &str,
        device_b: &str,
    ) -> Result<DataFrame, ProcessorError> {
        let df = DataFrame::new(vec![
            Column::new(
                "participant_id".into(),
                rows.iter().map(|r| r.participant_id).collect::<Vec<u32>>(),
            ),
            Column::new("gender".into(), rows.iter().map(|r| r.gender.as_str()).collect::<Vec<_>>()),
            Column::new("age".into(), rows.iter().map(|r| r.age.as_str()).collect::<Vec<_>>()),
            Column::new("BMI".into(), rows.iter().map(|r| r.bmi.as_str()).collect::<Vec<_>>()),
            Column::new(
                device_column(device_a).into(),
                rows.iter().map(|r| r.device_a).collect::<Vec<f64>>(),
            ),
            Column::new(
                device_column(device_b).into(),
                rows.iter().map(|r| r.device_b).collect::<Vec<f64>>(),
            ),
            Column::new("HR_diff".into(), rows.iter().map(|r| r.hr_diff()).collect::<Vec<f64>>()),
        ])?;
        Ok(df)
    }
}
