//! VE Calculator
//!
//! Recalculates the VE table from filtered log samples.
//! Features:
//! - Weighted bilinear binning of the averaged fuel trim onto the table grid
//! - Per-cell weighted mean correction applied multiplicatively
//! - Diagnostic grids (ratio %, hit count, correction, weight)

use serde::Serialize;

use crate::datalog::FilteredSample;
use crate::interpolation::{find_bounding_indices, AxisBracket};
use crate::table::{TableError, VeTable};

/// Cells with less accumulated weight than this keep their old value
pub const MIN_CELL_WEIGHT: f64 = 0.1;

/// Accumulator for one table cell
#[derive(Debug, Clone, Copy, Default)]
struct GridCell {
    weighted_sum: f64,
    weight_total: f64,
    raw_hit_count: u32,
}

impl GridCell {
    fn add(&mut self, value: f64, weight: f64) {
        self.weighted_sum += value * weight;
        self.weight_total += weight;
        self.raw_hit_count += 1;
    }
}

/// Dense `[row][col]` accumulator grid
struct Accumulator {
    cols: usize,
    cells: Vec<GridCell>,
}

impl Accumulator {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            cells: vec![GridCell::default(); rows * cols],
        }
    }

    fn cell(&self, row: usize, col: usize) -> &GridCell {
        &self.cells[row * self.cols + col]
    }

    /// Spread `value` over up to four corners; zero-weight corners are skipped
    fn distribute(&mut self, rpm: AxisBracket, load: AxisBracket, value: f64) {
        for (row, wy) in load.corners() {
            for (col, wx) in rpm.corners() {
                let weight = wy * wx;
                if weight > 0.0 {
                    self.cells[row * self.cols + col].add(value, weight);
                }
            }
        }
    }
}

/// New table plus same-shaped diagnostic grids
#[derive(Debug, Clone, Serialize)]
pub struct VeCalcResult {
    /// Corrected table (axes copied from the input)
    pub new_table: VeTable,
    /// `correction * 100`, 100 where data was insufficient
    pub diff_percent: Vec<Vec<f64>>,
    /// Samples that touched each cell
    pub hit_count: Vec<Vec<u32>>,
    /// Weighted mean trim, 1.0 where data was insufficient
    pub correction: Vec<Vec<f64>>,
    /// Accumulated bilinear weight, 0 where data was insufficient
    pub weight: Vec<Vec<f64>>,
}

impl VeCalcResult {
    /// Number of cells that received enough data to be corrected
    pub fn corrected_cells(&self) -> usize {
        self.weight.iter().flatten().filter(|&&w| w > 0.0).count()
    }
}

/// Recalculate `current` from `samples`: `new = old * weighted_mean(avg_trim)`
///
/// Samples are placed by rpm and corrected load on the table's own axes.
pub fn recalculate(
    current: &VeTable,
    samples: &[FilteredSample],
) -> Result<VeCalcResult, TableError> {
    current.check_shape()?;
    let rows = current.rows();
    let cols = current.cols();

    let mut grid = Accumulator::new(rows, cols);
    for point in samples {
        let (Some(rpm), Some(load)) = (
            find_bounding_indices(point.sample.rpm, &current.x_axis),
            find_bounding_indices(point.corrected_load, &current.y_axis),
        ) else {
            continue;
        };
        grid.distribute(rpm, load, point.sample.avg_trim());
    }

    let mut new_data = Vec::with_capacity(rows);
    let mut diff_percent = Vec::with_capacity(rows);
    let mut hit_count = Vec::with_capacity(rows);
    let mut correction = Vec::with_capacity(rows);
    let mut weight = Vec::with_capacity(rows);

    for (r, old_row) in current.data.iter().enumerate() {
        let mut new_row = Vec::with_capacity(cols);
        let mut diff_row = Vec::with_capacity(cols);
        let mut hit_row = Vec::with_capacity(cols);
        let mut corr_row = Vec::with_capacity(cols);
        let mut weight_row = Vec::with_capacity(cols);

        for (c, &old) in old_row.iter().enumerate() {
            let cell = grid.cell(r, c);
            if cell.weight_total > MIN_CELL_WEIGHT {
                let ratio = cell.weighted_sum / cell.weight_total;
                new_row.push(old * ratio);
                diff_row.push(ratio * 100.0);
                hit_row.push(cell.raw_hit_count);
                corr_row.push(ratio);
                weight_row.push(cell.weight_total);
            } else {
                new_row.push(old);
                diff_row.push(100.0);
                hit_row.push(0);
                corr_row.push(1.0);
                weight_row.push(0.0);
            }
        }

        new_data.push(new_row);
        diff_percent.push(diff_row);
        hit_count.push(hit_row);
        correction.push(corr_row);
        weight.push(weight_row);
    }

    let result = VeCalcResult {
        new_table: VeTable {
            x_axis: current.x_axis.clone(),
            y_axis: current.y_axis.clone(),
            data: new_data,
        },
        diff_percent,
        hit_count,
        correction,
        weight,
    };

    tracing::info!(
        "Recalculated VE table from {} samples, {} of {} cells corrected",
        samples.len(),
        result.corrected_cells(),
        rows * cols
    );
    Ok(result)
}
