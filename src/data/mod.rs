//! Data module - CSV loading and participant processing

mod loader;
mod processor;

pub use loader::{save_csv, save_index_csv, DataLoader};
pub use processor::{compare_keys, ActivitySummary, DataProcessor, IdStrategy, PairedParticipant};
