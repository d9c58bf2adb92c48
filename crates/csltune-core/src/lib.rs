//! # CSL Tune Core Library
//!
//! VE table recalculation for the MSS54HP engine controller.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Fixed-layout binary codec for the calibration image (VE table, flags)
//! - Sensor log decoding with tolerant column matching
//! - Log filtering and RPM-indexed throttle-opening correction
//! - Weighted bilinear aggregation of fuel trims onto the VE grid
//! - Warmup and WOT table derivation from a tuned main table
//!
//! ## Example
//!
//! ```rust,ignore
//! use csltune_core::prelude::*;
//!
//! let variant = EcuVariant::mss54hp();
//! let image = BinaryImage::new(&bin_bytes);
//! let current = image.read_ve_table(&variant)?;
//!
//! let samples = parse_log(&csv_text, &ColumnMapping::default())?;
//! let curve = CorrectionCurve::new(variant.correction_curve.clone());
//! let processed = process_log(&samples, "drive.csv", &FilterConfig::default(), &curve);
//!
//! let result = recalculate(&current, &processed.samples)?;
//! let mut patcher = Patcher::new(&bin_bytes, &variant);
//! patcher.write_ve_table(&result.new_table)?;
//! let output = patcher.into_bytes();
//! ```

pub mod binary;
pub mod config;
pub mod datalog;
pub mod derived;
pub mod filename;
pub mod interpolation;
pub mod table;
pub mod variant;
pub mod ve_calc;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::binary::{BinaryError, BinaryImage, FlagEncoding, PatchStatus, Patcher};
    pub use crate::config::TuneConfig;
    pub use crate::datalog::{
        parse_log, process_log, ColumnMapping, FilterConfig, FilteredSample, LogError,
        LogSample, ProcessedLog,
    };
    pub use crate::derived::{generate_warmup_map, generate_wot_map, StockReference};
    pub use crate::filename::output_file_name;
    pub use crate::interpolation::{CorrectionCurve, InterpolationPoint};
    pub use crate::table::{percent_difference, TableError, VeTable};
    pub use crate::variant::{EcuVariant, TableLayout};
    pub use crate::ve_calc::{recalculate, VeCalcResult};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
