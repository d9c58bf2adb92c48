//! Sensor Log Pipeline
//!
//! Decodes delimited driving logs into typed samples and filters/corrects
//! them ahead of aggregation.

mod filter;
mod parser;

pub use filter::{process_log, FilterConfig};
pub use parser::{parse_log, ColumnMapping};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding a sensor log
#[derive(Error, Debug)]
pub enum LogError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No valid data rows in log")]
    NoValidData,
}

/// One decoded log row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSample {
    /// Timestamp as logged
    pub time: f64,
    /// Engine speed
    pub rpm: f64,
    /// Relative throttle opening (0-100)
    pub raw_load: f64,
    /// Short-term fuel trim bank 1 (auto-filled from bank 2)
    pub stft1: f64,
    /// Short-term fuel trim bank 2 (auto-filled from bank 1)
    pub stft2: f64,
    /// Display lambda bank 1, only when present in the log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda1: Option<f64>,
    /// Display lambda bank 2, only when present in the log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda2: Option<f64>,
    /// Coolant temperature in °C, only when present in the log
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coolant_temp: Option<f64>,
}

impl LogSample {
    /// Mean of both trim banks
    pub fn avg_trim(&self) -> f64 {
        (self.stft1 + self.stft2) / 2.0
    }
}

/// A sample that survived filtering, annotated with its corrected load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    /// The decoded row
    #[serde(flatten)]
    pub sample: LogSample,
    /// `raw_load / correction_factor`
    pub corrected_load: f64,
    /// Divisor actually applied (1.0 when correction is off)
    pub correction_factor: f64,
}

/// Result of running the filter/corrector over a decoded log
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedLog {
    /// Source log name, for display
    pub file_name: String,
    /// Surviving samples in source order
    pub samples: Vec<FilteredSample>,
    /// Number of samples kept
    pub valid_count: usize,
    /// Number of samples rejected by a filter
    pub dropped_count: usize,
}

impl ProcessedLog {
    /// Fail with `NoValidData` when nothing survived
    pub fn require_data(self) -> Result<Self, LogError> {
        if self.valid_count == 0 {
            Err(LogError::NoValidData)
        } else {
            Ok(self)
        }
    }
}
