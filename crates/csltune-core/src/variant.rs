//! ECU Variant Configuration
//!
//! Fixed addresses, table geometry and axes for one firmware variant.
//! Nothing here is discovered at runtime; a variant is injected into the
//! codec and the calculator so other variants only need a new value.

use serde::{Deserialize, Serialize};

use crate::binary::FlagEncoding;
use crate::interpolation::InterpolationPoint;

/// Location and dimensions of a table stored in the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Absolute byte offset of cell [0][0]
    pub address: usize,
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
}

impl TableLayout {
    /// Size of the table data in bytes (u16 per cell), `None` on overflow
    pub fn byte_len(&self) -> Option<usize> {
        self.rows.checked_mul(self.cols)?.checked_mul(2)
    }
}

/// Layout and constants for one ECU firmware variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcuVariant {
    /// Display name
    pub name: String,
    /// Main VE table
    pub ve_table: TableLayout,
    /// RPM breakpoints (VE table columns)
    pub rpm_axis: Vec<f64>,
    /// Opening-ratio breakpoints (VE table rows)
    pub load_axis: Vec<f64>,
    /// Map-correction enable byte
    pub correction_flag_address: usize,
    /// Encoding of the map-correction byte
    pub correction_flag: FlagEncoding,
    /// Adaptation temperature threshold byte
    pub temp_threshold_address: usize,
    /// Stored value is `celsius + temp_bias`
    pub temp_bias: i16,
    /// WOT-threshold enable byte (extended variant only)
    #[serde(default)]
    pub wot_flag_address: Option<usize>,
    /// Encoding of the WOT-threshold byte
    #[serde(default = "FlagEncoding::wot_default")]
    pub wot_flag: FlagEncoding,
    /// Warmup table location, when derived maps should be written back
    #[serde(default)]
    pub warmup_table: Option<TableLayout>,
    /// WOT table location, when derived maps should be written back
    #[serde(default)]
    pub wot_table: Option<TableLayout>,
    /// Default throttle-opening correction curve
    pub correction_curve: Vec<InterpolationPoint>,
}

/// Threshold at or above which the adaptation temperature counts as "patched"
pub const PATCHED_TEMP_THRESHOLD: i16 = 99;

/// Threshold written when applying the logging patch
pub const PATCH_TEMP_CELSIUS: i16 = 100;

/// Threshold written when reverting the logging patch (raw 0)
pub const STOCK_TEMP_CELSIUS: i16 = -48;

impl EcuVariant {
    /// MSS54HP (E46 M3 CSL) calibration layout
    pub fn mss54hp() -> Self {
        Self {
            name: "MSS54HP".to_string(),
            ve_table: TableLayout {
                address: 0xD356,
                rows: 24,
                cols: 20,
            },
            rpm_axis: vec![
                500.0, 750.0, 1000.0, 1250.0, 1500.0, 1750.0, 2000.0, 2500.0, 3000.0, 3500.0,
                4000.0, 4500.0, 5000.0, 5500.0, 6000.0, 6500.0, 7000.0, 7500.0, 7900.0, 8200.0,
            ],
            load_axis: vec![
                0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0, 12.0, 14.0, 16.0,
                18.0, 20.0, 25.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0,
            ],
            correction_flag_address: 0xE5E4,
            correction_flag: FlagEncoding::correction_default(),
            temp_threshold_address: 0xE5E5,
            temp_bias: 48,
            wot_flag_address: None,
            wot_flag: FlagEncoding::wot_default(),
            warmup_table: None,
            wot_table: None,
            correction_curve: vec![
                InterpolationPoint::new(0.0, 1.0),
                InterpolationPoint::new(900.0, 1.0),
                InterpolationPoint::new(1100.0, 0.98),
                InterpolationPoint::new(2000.0, 0.95),
                InterpolationPoint::new(3000.0, 0.93),
                InterpolationPoint::new(4000.0, 0.92),
                InterpolationPoint::new(5000.0, 0.9),
                InterpolationPoint::new(8200.0, 0.9),
            ],
        }
    }
}

impl Default for EcuVariant {
    fn default() -> Self {
        Self::mss54hp()
    }
}
