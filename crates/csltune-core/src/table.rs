//! VE Table Model
//!
//! A 2-D calibration grid indexed `[row = load index][col = rpm index]`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a table's grid does not match its axes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Table has {actual} rows but the load axis has {expected} breakpoints")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error("Row {row} has {actual} cells but the rpm axis has {expected} breakpoints")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{axis} axis is not strictly increasing at index {index}")]
    NonIncreasingAxis { axis: &'static str, index: usize },
}

/// Volumetric efficiency table with its breakpoint axes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VeTable {
    /// RPM breakpoints (columns)
    pub x_axis: Vec<f64>,
    /// Load / opening-ratio breakpoints (rows)
    pub y_axis: Vec<f64>,
    /// Cell values, `data[row][col]`
    pub data: Vec<Vec<f64>>,
}

impl VeTable {
    /// Build a table, checking that the grid matches both axes
    pub fn new(
        x_axis: Vec<f64>,
        y_axis: Vec<f64>,
        data: Vec<Vec<f64>>,
    ) -> Result<Self, TableError> {
        let table = Self {
            x_axis,
            y_axis,
            data,
        };
        table.validate()?;
        Ok(table)
    }

    /// Table of the given axes filled with one value
    pub fn filled(x_axis: Vec<f64>, y_axis: Vec<f64>, value: f64) -> Self {
        let data = vec![vec![value; x_axis.len()]; y_axis.len()];
        Self {
            x_axis,
            y_axis,
            data,
        }
    }

    /// Number of rows (load breakpoints)
    pub fn rows(&self) -> usize {
        self.y_axis.len()
    }

    /// Number of columns (rpm breakpoints)
    pub fn cols(&self) -> usize {
        self.x_axis.len()
    }

    /// Cell value, `None` outside the grid
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.data.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Check that `data` is `rows x cols` and both axes strictly increase
    pub fn validate(&self) -> Result<(), TableError> {
        check_axis("rpm", &self.x_axis)?;
        check_axis("load", &self.y_axis)?;
        self.check_shape()
    }

    /// Check only the grid dimensions against the axis lengths
    pub fn check_shape(&self) -> Result<(), TableError> {
        if self.data.len() != self.y_axis.len() {
            return Err(TableError::RowCountMismatch {
                expected: self.y_axis.len(),
                actual: self.data.len(),
            });
        }
        for (row, cells) in self.data.iter().enumerate() {
            if cells.len() != self.x_axis.len() {
                return Err(TableError::ColumnCountMismatch {
                    row,
                    expected: self.x_axis.len(),
                    actual: cells.len(),
                });
            }
        }
        Ok(())
    }
}

fn check_axis(axis: &'static str, values: &[f64]) -> Result<(), TableError> {
    for (index, pair) in values.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(TableError::NonIncreasingAxis {
                axis,
                index: index + 1,
            });
        }
    }
    Ok(())
}

/// Per-cell percentage difference `(subject - reference) / reference * 100`
///
/// Cells where the reference is zero or missing report 0.
pub fn percent_difference(subject: &[Vec<f64>], reference: &[Vec<f64>]) -> Vec<Vec<f64>> {
    subject
        .iter()
        .enumerate()
        .map(|(r, row)| {
            row.iter()
                .enumerate()
                .map(|(c, &value)| {
                    let base = reference
                        .get(r)
                        .and_then(|ref_row| ref_row.get(c))
                        .copied()
                        .unwrap_or(0.0);
                    if base != 0.0 {
                        (value - base) / base * 100.0
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_ragged_rows() {
        let err = VeTable::new(
            vec![1000.0, 2000.0],
            vec![10.0, 20.0],
            vec![vec![1.0, 1.0], vec![1.0]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TableError::ColumnCountMismatch {
                row: 1,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn new_rejects_non_increasing_axis() {
        let err = VeTable::new(vec![1000.0, 1000.0], vec![10.0], vec![vec![1.0, 1.0]]).unwrap_err();
        assert_eq!(
            err,
            TableError::NonIncreasingAxis {
                axis: "rpm",
                index: 1
            }
        );
    }

    #[test]
    fn percent_difference_handles_zero_reference() {
        let subject = vec![vec![1.1, 2.0]];
        let reference = vec![vec![1.0, 0.0]];
        let diff = percent_difference(&subject, &reference);
        assert!((diff[0][0] - 10.0).abs() < 1e-9);
        assert_eq!(diff[0][1], 0.0);
    }
}
