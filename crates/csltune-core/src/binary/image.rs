//! Read-only view over a calibration image

use byteorder::{BigEndian, ByteOrder};

use super::{table_byte_len, BinaryError, FlagEncoding, TABLE_SCALE};
use crate::table::VeTable;
use crate::variant::{EcuVariant, TableLayout};

/// Borrowed calibration image; all reads are bounds-checked
#[derive(Debug, Clone, Copy)]
pub struct BinaryImage<'a> {
    bytes: &'a [u8],
}

impl<'a> BinaryImage<'a> {
    /// Wrap raw image bytes
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Image size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True for a zero-length image
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Underlying bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], BinaryError> {
        offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .map(|end| &self.bytes[offset..end])
            .ok_or(BinaryError::OutOfBounds {
                offset,
                len,
                size: self.bytes.len(),
            })
    }

    /// Read one byte
    pub fn read_u8(&self, offset: usize) -> Result<u8, BinaryError> {
        Ok(self.slice(offset, 1)?[0])
    }

    /// Read a big-endian u16
    pub fn read_u16(&self, offset: usize) -> Result<u16, BinaryError> {
        Ok(BigEndian::read_u16(self.slice(offset, 2)?))
    }

    /// Decode a `rows x cols` table of u16/1000 cells paired with fixed axes
    ///
    /// The axes are not stored in the image and must match the layout's
    /// `cols` and `rows`. The whole byte range is checked before any cell is
    /// read.
    pub fn decode_table(
        &self,
        layout: &TableLayout,
        x_axis: &[f64],
        y_axis: &[f64],
    ) -> Result<VeTable, BinaryError> {
        if x_axis.len() != layout.cols || y_axis.len() != layout.rows {
            return Err(BinaryError::ShapeMismatch {
                expected_rows: layout.rows,
                expected_cols: layout.cols,
                rows: y_axis.len(),
                cols: x_axis.len(),
            });
        }
        let len = table_byte_len(layout, self.bytes.len())?;
        let raw = self.slice(layout.address, len)?;

        let row_len = 2 * layout.cols;
        let data = (0..layout.rows)
            .map(|row| {
                raw[row * row_len..(row + 1) * row_len]
                    .chunks_exact(2)
                    .map(|cell| f64::from(BigEndian::read_u16(cell)) / TABLE_SCALE)
                    .collect()
            })
            .collect();

        Ok(VeTable {
            x_axis: x_axis.to_vec(),
            y_axis: y_axis.to_vec(),
            data,
        })
    }

    /// Decode the variant's main VE table
    pub fn read_ve_table(&self, variant: &EcuVariant) -> Result<VeTable, BinaryError> {
        self.decode_table(&variant.ve_table, &variant.rpm_axis, &variant.load_axis)
    }

    /// Decode a single-byte flag
    pub fn decode_flag(&self, address: usize, encoding: FlagEncoding) -> Result<bool, BinaryError> {
        Ok(encoding.is_enabled(self.read_u8(address)?))
    }

    /// Map correction is enabled (byte is not the disabled sentinel)
    pub fn correction_enabled(&self, variant: &EcuVariant) -> Result<bool, BinaryError> {
        self.decode_flag(variant.correction_flag_address, variant.correction_flag)
    }

    /// Decode a biased temperature byte: `raw - bias`
    pub fn decode_temp(&self, address: usize, bias: i16) -> Result<i16, BinaryError> {
        Ok(i16::from(self.read_u8(address)?) - bias)
    }

    /// Adaptation temperature threshold in °C
    pub fn temp_threshold(&self, variant: &EcuVariant) -> Result<i16, BinaryError> {
        self.decode_temp(variant.temp_threshold_address, variant.temp_bias)
    }

    /// WOT-threshold flag of the extended variant
    pub fn wot_threshold_enabled(&self, variant: &EcuVariant) -> Result<bool, BinaryError> {
        let address = variant
            .wot_flag_address
            .ok_or(BinaryError::UnsupportedField("WOT threshold flag"))?;
        self.decode_flag(address, variant.wot_flag)
    }
}
