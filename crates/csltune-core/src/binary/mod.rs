//! Calibration Image Codec
//!
//! Fixed-offset big-endian access to the VE table and the single-byte
//! configuration fields of an ECU image.
//!
//! | Field | Width | Encoding |
//! |---|---|---|
//! | VE table | rows×cols×2 | u16 BE, row-major, value = raw / 1000 |
//! | Map correction | 1 | disabled sentinel (0x02) or enabled |
//! | Temp threshold | 1 | raw = celsius + 48 |
//! | WOT threshold | 1 | disabled sentinel or enabled (extended variant) |

mod error;
mod image;
mod patcher;

pub use error::BinaryError;
pub use image::BinaryImage;
pub use patcher::Patcher;

use serde::{Deserialize, Serialize};

use crate::variant::{EcuVariant, TableLayout, PATCHED_TEMP_THRESHOLD};

/// Scale between stored u16 table entries and cell values
pub const TABLE_SCALE: f64 = 1000.0;

/// Byte length of `layout`, or `OutOfBounds` when its size overflows
fn table_byte_len(layout: &TableLayout, image_size: usize) -> Result<usize, BinaryError> {
    layout.byte_len().ok_or(BinaryError::OutOfBounds {
        offset: layout.address,
        len: usize::MAX,
        size: image_size,
    })
}

/// Single-byte on/off flag encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEncoding {
    /// Byte meaning "off"; every other byte reads as on
    pub disabled: u8,
    /// Byte written for "on" when no original enabled byte is known
    pub enabled: u8,
}

impl FlagEncoding {
    /// Map-correction flag: 0x02 is off
    pub const fn correction_default() -> Self {
        Self {
            disabled: 0x02,
            enabled: 0x01,
        }
    }

    /// WOT-threshold flag: 0x00 is off
    pub const fn wot_default() -> Self {
        Self {
            disabled: 0x00,
            enabled: 0x01,
        }
    }

    /// Decode a stored byte
    pub fn is_enabled(&self, byte: u8) -> bool {
        byte != self.disabled
    }
}

/// Logging-patch state of an image as read from its flag bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchStatus {
    /// Map correction is switched off
    pub map_correction_off: bool,
    /// Decoded adaptation temperature threshold
    pub temp_threshold: i16,
}

impl PatchStatus {
    /// Read the patch-relevant fields of `image`
    pub fn read(image: &BinaryImage<'_>, variant: &EcuVariant) -> Result<Self, BinaryError> {
        Ok(Self {
            map_correction_off: !image.correction_enabled(variant)?,
            temp_threshold: image.temp_threshold(variant)?,
        })
    }

    /// Threshold is high enough to suppress adaptation
    pub fn temp_limit_high(&self) -> bool {
        self.temp_threshold >= PATCHED_TEMP_THRESHOLD
    }

    /// Both halves of the logging patch are present
    pub fn is_patched(&self) -> bool {
        self.map_correction_off && self.temp_limit_high()
    }
}
