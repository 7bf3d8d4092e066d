//! Stats module - descriptive statistics, correlation, hypothesis tests and power

mod calculator;
mod correlation;
mod power;
mod regression;
mod testing;

pub use calculator::{format_p_value, StatsCalculator, SIGNIFICANCE_THRESHOLD};
pub use correlation::{Correlation, CorrelationResult};
pub use power::PowerAnalysis;
pub use regression::LinearFit;
pub use testing::{AnovaResult, HypothesisTests, TTestResult};
