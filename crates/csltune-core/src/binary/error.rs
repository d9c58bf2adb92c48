//! Binary codec errors

use thiserror::Error;

/// Errors that can occur while reading or patching a calibration image
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BinaryError {
    #[error("Offset {offset:#06x} (+{len}) out of bounds (image size: {size})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Cell [{row}][{col}] value {value} does not fit a 16-bit table entry")]
    ValueOutOfRange { row: usize, col: usize, value: f64 },

    #[error("Temperature threshold {celsius}°C does not fit a single byte")]
    ThresholdOutOfRange { celsius: i16 },

    #[error("Table is {rows}x{cols} but the layout expects {expected_rows}x{expected_cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Field not present in this variant: {0}")]
    UnsupportedField(&'static str),
}
