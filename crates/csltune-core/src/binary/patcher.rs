//! Image patcher
//!
//! Writes tables and flags into a private copy of the image. The caller's
//! buffer is never touched, and every write validates its whole range
//! before changing a byte.

use byteorder::{BigEndian, ByteOrder};

use super::{table_byte_len, BinaryError, BinaryImage, TABLE_SCALE};
use crate::table::VeTable;
use crate::variant::{EcuVariant, TableLayout, PATCH_TEMP_CELSIUS, STOCK_TEMP_CELSIUS};

/// Owns a cloned image and applies patches to it
#[derive(Debug, Clone)]
pub struct Patcher {
    bytes: Vec<u8>,
    variant: EcuVariant,
    /// Map-correction byte as it was before any patch
    original_correction: Option<u8>,
}

impl Patcher {
    /// Clone `bytes` into a new patcher for `variant`
    pub fn new(bytes: &[u8], variant: &EcuVariant) -> Self {
        let original_correction = BinaryImage::new(bytes)
            .read_u8(variant.correction_flag_address)
            .ok();
        Self {
            bytes: bytes.to_vec(),
            variant: variant.clone(),
            original_correction,
        }
    }

    /// Read-only view of the patched image
    pub fn image(&self) -> BinaryImage<'_> {
        BinaryImage::new(&self.bytes)
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<(), BinaryError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(()),
            _ => Err(BinaryError::OutOfBounds {
                offset,
                len,
                size: self.bytes.len(),
            }),
        }
    }

    /// Write one byte
    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<(), BinaryError> {
        self.check_range(offset, 1)?;
        self.bytes[offset] = value;
        Ok(())
    }

    /// Write a big-endian u16
    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<(), BinaryError> {
        self.check_range(offset, 2)?;
        BigEndian::write_u16(&mut self.bytes[offset..offset + 2], value);
        Ok(())
    }

    /// Encode `table` at `layout` as `round(value * 1000)` u16 cells
    ///
    /// Rounding is half away from zero. A non-finite cell or one that rounds
    /// outside `0..=65535` fails with `ValueOutOfRange` and nothing is written.
    pub fn encode_table(
        &mut self,
        layout: &TableLayout,
        table: &VeTable,
    ) -> Result<(), BinaryError> {
        let shape_ok = table.data.len() == layout.rows
            && table.data.iter().all(|row| row.len() == layout.cols);
        if !shape_ok {
            return Err(BinaryError::ShapeMismatch {
                expected_rows: layout.rows,
                expected_cols: layout.cols,
                rows: table.data.len(),
                cols: table.data.first().map_or(0, Vec::len),
            });
        }
        let len = table_byte_len(layout, self.bytes.len())?;
        self.check_range(layout.address, len)?;

        let mut raw = Vec::with_capacity(layout.rows * layout.cols);
        for (row, cells) in table.data.iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                let cell =
                    encode_cell(value).ok_or(BinaryError::ValueOutOfRange { row, col, value })?;
                raw.push(cell);
            }
        }

        let end = layout.address + len;
        BigEndian::write_u16_into(&raw, &mut self.bytes[layout.address..end]);
        Ok(())
    }

    /// Encode the variant's main VE table
    pub fn write_ve_table(&mut self, table: &VeTable) -> Result<(), BinaryError> {
        let layout = self.variant.ve_table;
        self.encode_table(&layout, table)
    }

    /// Encode a derived warmup table when the variant locates one
    ///
    /// Returns whether anything was written.
    pub fn write_warmup_table(&mut self, table: &VeTable) -> Result<bool, BinaryError> {
        self.write_optional_table(self.variant.warmup_table, table, "warmup")
    }

    /// Encode a derived WOT table when the variant locates one
    pub fn write_wot_table(&mut self, table: &VeTable) -> Result<bool, BinaryError> {
        self.write_optional_table(self.variant.wot_table, table, "WOT")
    }

    fn write_optional_table(
        &mut self,
        layout: Option<TableLayout>,
        table: &VeTable,
        name: &str,
    ) -> Result<bool, BinaryError> {
        let Some(layout) = layout else {
            tracing::debug!("Variant has no {name} table location, skipping write");
            return Ok(false);
        };
        match self.encode_table(&layout, table) {
            Ok(()) => Ok(true),
            Err(BinaryError::ShapeMismatch { .. }) => {
                tracing::warn!(
                    "Derived {name} table is {}x{}, layout expects {}x{}; not written",
                    table.data.len(),
                    table.data.first().map_or(0, Vec::len),
                    layout.rows,
                    layout.cols
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Switch map correction on or off
    ///
    /// Re-enabling restores the byte the image originally held when that was
    /// an enabled value; otherwise the variant's enabled sentinel is written.
    pub fn set_correction_enabled(&mut self, enabled: bool) -> Result<(), BinaryError> {
        let value = self.correction_byte(enabled);
        self.write_u8(self.variant.correction_flag_address, value)
    }

    fn correction_byte(&self, enabled: bool) -> u8 {
        let encoding = self.variant.correction_flag;
        if !enabled {
            return encoding.disabled;
        }
        match self.original_correction {
            Some(byte) if encoding.is_enabled(byte) => byte,
            _ => encoding.enabled,
        }
    }

    /// Store the adaptation temperature threshold as `celsius + bias`
    pub fn set_temp_threshold(&mut self, celsius: i16) -> Result<(), BinaryError> {
        let raw = self.threshold_byte(celsius)?;
        self.write_u8(self.variant.temp_threshold_address, raw)
    }

    fn threshold_byte(&self, celsius: i16) -> Result<u8, BinaryError> {
        celsius
            .checked_add(self.variant.temp_bias)
            .and_then(|v| u8::try_from(v).ok())
            .ok_or(BinaryError::ThresholdOutOfRange { celsius })
    }

    /// Switch the WOT-threshold flag of the extended variant
    pub fn set_wot_threshold_enabled(&mut self, enabled: bool) -> Result<(), BinaryError> {
        let address = self
            .variant
            .wot_flag_address
            .ok_or(BinaryError::UnsupportedField("WOT threshold flag"))?;
        let encoding = self.variant.wot_flag;
        let value = if enabled {
            encoding.enabled
        } else {
            encoding.disabled
        };
        self.write_u8(address, value)
    }

    /// Apply (`true`) or revert (`false`) the logging patch
    ///
    /// Applying disables map correction and raises the adaptation threshold
    /// to 100°C. Reverting re-enables correction and stores raw 0 (-48°C).
    /// Both bytes are validated first; on error neither is written.
    pub fn apply_logging_patch(&mut self, apply: bool) -> Result<(), BinaryError> {
        let celsius = if apply {
            PATCH_TEMP_CELSIUS
        } else {
            STOCK_TEMP_CELSIUS
        };
        let flag_address = self.variant.correction_flag_address;
        let temp_address = self.variant.temp_threshold_address;

        let flag = self.correction_byte(!apply);
        let threshold = self.threshold_byte(celsius)?;
        self.check_range(flag_address, 1)?;
        self.check_range(temp_address, 1)?;

        self.bytes[flag_address] = flag;
        self.bytes[temp_address] = threshold;
        Ok(())
    }

    /// Patched image bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the patcher and return the patched image
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// `round(value * 1000)` as u16, `None` when it does not fit
fn encode_cell(value: f64) -> Option<u16> {
    let scaled = (value * TABLE_SCALE).round();
    if scaled.is_finite() && (0.0..=f64::from(u16::MAX)).contains(&scaled) {
        Some(scaled as u16)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_variant() -> EcuVariant {
        EcuVariant {
            ve_table: TableLayout {
                address: 4,
                rows: 2,
                cols: 2,
            },
            rpm_axis: vec![1000.0, 2000.0],
            load_axis: vec![10.0, 20.0],
            correction_flag_address: 0,
            temp_threshold_address: 1,
            wot_flag_address: Some(2),
            ..EcuVariant::mss54hp()
        }
    }

    #[test]
    fn encode_cell_rounds_half_away_from_zero() {
        assert_eq!(encode_cell(1.2345), Some(1235));
        assert_eq!(encode_cell(65.535), Some(65535));
        assert_eq!(encode_cell(65.5356), None);
        assert_eq!(encode_cell(-0.001), None);
        assert_eq!(encode_cell(f64::NAN), None);
    }

    #[test]
    fn patcher_does_not_alias_source() {
        let source = vec![0u8; 12];
        let variant = small_variant();
        let mut patcher = Patcher::new(&source, &variant);
        patcher.write_u8(3, 0xAA).unwrap();
        assert_eq!(source[3], 0);
        assert_eq!(patcher.as_bytes()[3], 0xAA);
    }

    #[test]
    fn out_of_range_cell_leaves_image_untouched() {
        let source = vec![0u8; 12];
        let variant = small_variant();
        let mut patcher = Patcher::new(&source, &variant);
        let table = VeTable::new(
            variant.rpm_axis.clone(),
            variant.load_axis.clone(),
            vec![vec![1.0, 1.0], vec![1.0, 70.0]],
        )
        .unwrap();
        let err = patcher.write_ve_table(&table).unwrap_err();
        assert!(matches!(err, BinaryError::ValueOutOfRange { row: 1, col: 1, .. }));
        assert_eq!(patcher.as_bytes(), source.as_slice());
    }

    #[test]
    fn re_enabling_restores_original_byte() {
        let mut source = vec![0u8; 12];
        source[0] = 0x00;
        let variant = small_variant();
        let mut patcher = Patcher::new(&source, &variant);
        patcher.set_correction_enabled(false).unwrap();
        assert_eq!(patcher.as_bytes()[0], 0x02);
        patcher.set_correction_enabled(true).unwrap();
        assert_eq!(patcher.as_bytes()[0], 0x00);
    }

    #[test]
    fn enabling_a_disabled_image_writes_sentinel() {
        let mut source = vec![0u8; 12];
        source[0] = 0x02;
        let mut patcher = Patcher::new(&source, &small_variant());
        patcher.set_correction_enabled(true).unwrap();
        assert_eq!(patcher.as_bytes()[0], 0x01);
    }

    #[test]
    fn temp_threshold_out_of_byte_range() {
        let mut patcher = Patcher::new(&[0u8; 12], &small_variant());
        assert_eq!(
            patcher.set_temp_threshold(-49),
            Err(BinaryError::ThresholdOutOfRange { celsius: -49 })
        );
        assert_eq!(
            patcher.set_temp_threshold(208),
            Err(BinaryError::ThresholdOutOfRange { celsius: 208 })
        );
        patcher.set_temp_threshold(-48).unwrap();
        assert_eq!(patcher.as_bytes()[1], 0);
    }

    #[test]
    fn logging_patch_is_all_or_nothing() {
        let source = vec![0u8; 12];
        let variant = EcuVariant {
            temp_threshold_address: 100,
            ..small_variant()
        };
        let mut patcher = Patcher::new(&source, &variant);
        assert_eq!(
            patcher.apply_logging_patch(true),
            Err(BinaryError::OutOfBounds {
                offset: 100,
                len: 1,
                size: 12
            })
        );
        assert_eq!(patcher.as_bytes(), source.as_slice());

        let variant = EcuVariant {
            temp_bias: 200,
            ..small_variant()
        };
        let mut patcher = Patcher::new(&source, &variant);
        assert_eq!(
            patcher.apply_logging_patch(true),
            Err(BinaryError::ThresholdOutOfRange { celsius: 100 })
        );
        assert_eq!(patcher.as_bytes(), source.as_slice());
    }

    #[test]
    fn wot_flag_round_trip() {
        let variant = small_variant();
        let mut patcher = Patcher::new(&[0u8; 12], &variant);
        patcher.set_wot_threshold_enabled(true).unwrap();
        assert!(patcher.image().wot_threshold_enabled(&variant).unwrap());
        patcher.set_wot_threshold_enabled(false).unwrap();
        assert!(!patcher.image().wot_threshold_enabled(&variant).unwrap());
    }
}
