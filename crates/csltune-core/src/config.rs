//! Tuning Configuration
//!
//! JSON-loadable bundle of filter settings, correction curve, log column
//! names and an optional variant override. Every field has a default, so a
//! partial file only overrides what it names.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::datalog::{ColumnMapping, FilterConfig};
use crate::interpolation::{CorrectionCurve, InterpolationPoint};
use crate::variant::EcuVariant;

/// Errors that can occur while loading configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Complete configuration for one recalculation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuneConfig {
    /// Log inclusion filters
    pub filter: FilterConfig,
    /// Overrides the variant's default curve when present
    pub correction_curve: Option<Vec<InterpolationPoint>>,
    /// Log header names
    pub columns: ColumnMapping,
    /// Overrides the built-in MSS54HP layout when present
    pub variant: Option<EcuVariant>,
}

impl TuneConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Write this configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Variant in effect
    pub fn variant(&self) -> EcuVariant {
        self.variant.clone().unwrap_or_default()
    }

    /// Correction curve in effect, sorted by rpm
    pub fn curve(&self, variant: &EcuVariant) -> CorrectionCurve {
        let points = self
            .correction_curve
            .clone()
            .unwrap_or_else(|| variant.correction_curve.clone());
        CorrectionCurve::new(points)
    }
}
