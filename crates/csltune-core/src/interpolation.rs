//! Interpolation Primitives
//!
//! Axis bracketing shared by the grid aggregator (accumulate) and the
//! derived-map generator (point query), plus the 1-D correction curve.

use serde::{Deserialize, Serialize};

use crate::table::VeTable;

/// Position of a value between two axis breakpoints
///
/// `w1` belongs to `idx1` (lower), `w2` to `idx2` (upper); `w1 + w2 == 1`.
/// Outside the axis range both indices are the nearest edge and `w1 == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBracket {
    /// Lower breakpoint index
    pub idx1: usize,
    /// Upper breakpoint index
    pub idx2: usize,
    /// Weight of `idx1`
    pub w1: f64,
    /// Weight of `idx2`
    pub w2: f64,
}

impl AxisBracket {
    fn single(idx: usize) -> Self {
        Self {
            idx1: idx,
            idx2: idx,
            w1: 1.0,
            w2: 0.0,
        }
    }

    /// The (index, weight) pairs this bracket touches
    pub fn corners(&self) -> [(usize, f64); 2] {
        [(self.idx1, self.w1), (self.idx2, self.w2)]
    }
}

/// Locate `value` on `axis`, clamping to the edges
///
/// Returns `None` for an empty axis or a value that cannot be ordered (NaN).
pub fn find_bounding_indices(value: f64, axis: &[f64]) -> Option<AxisBracket> {
    let first = *axis.first()?;
    let last_idx = axis.len() - 1;

    if value <= first {
        return Some(AxisBracket::single(0));
    }
    if value >= axis[last_idx] {
        return Some(AxisBracket::single(last_idx));
    }

    for (i, pair) in axis.windows(2).enumerate() {
        let (low, high) = (pair[0], pair[1]);
        if value >= low && value <= high {
            let span = high - low;
            if span == 0.0 {
                return Some(AxisBracket::single(i));
            }
            let w2 = (value - low) / span;
            return Some(AxisBracket {
                idx1: i,
                idx2: i + 1,
                w1: 1.0 - w2,
                w2,
            });
        }
    }

    None
}

/// Bilinear sample of `table` at an arbitrary (rpm, load) point
///
/// Points outside the axes clamp to the edge cells. An empty table yields 0.
pub fn interpolate_map(table: &VeTable, rpm: f64, load: f64) -> f64 {
    let (Some(x), Some(y)) = (
        find_bounding_indices(rpm, &table.x_axis),
        find_bounding_indices(load, &table.y_axis),
    ) else {
        return 0.0;
    };

    let mut value = 0.0;
    for (row, wy) in y.corners() {
        for (col, wx) in x.corners() {
            let weight = wy * wx;
            if weight > 0.0 {
                value += table.get(row, col).unwrap_or(0.0) * weight;
            }
        }
    }
    value
}

/// One breakpoint of the throttle-opening correction curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolationPoint {
    /// Engine speed of the breakpoint
    pub rpm: f64,
    /// Divisor applied to the throttle opening at this rpm
    pub factor: f64,
}

impl InterpolationPoint {
    /// Create a breakpoint
    pub const fn new(rpm: f64, factor: f64) -> Self {
        Self { rpm, factor }
    }
}

/// Piecewise-linear RPM-indexed correction curve
///
/// Points are kept sorted by rpm regardless of the order they were edited in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<InterpolationPoint>", into = "Vec<InterpolationPoint>")]
pub struct CorrectionCurve {
    points: Vec<InterpolationPoint>,
}

impl CorrectionCurve {
    /// Build a curve, sorting the points ascending by rpm
    pub fn new(mut points: Vec<InterpolationPoint>) -> Self {
        points.sort_by(|a, b| a.rpm.total_cmp(&b.rpm));
        Self { points }
    }

    /// Sorted breakpoints
    pub fn points(&self) -> &[InterpolationPoint] {
        &self.points
    }

    /// Interpolated factor at `rpm`, clamped to the first/last factor
    ///
    /// An empty curve is neutral (1.0).
    pub fn factor_at(&self, rpm: f64) -> f64 {
        let (Some(first), Some(last)) = (self.points.first(), self.points.last()) else {
            return 1.0;
        };
        if rpm <= first.rpm {
            return first.factor;
        }
        if rpm >= last.rpm {
            return last.factor;
        }

        for pair in self.points.windows(2) {
            let (p1, p2) = (pair[0], pair[1]);
            if rpm >= p1.rpm && rpm <= p2.rpm {
                let span = p2.rpm - p1.rpm;
                if span == 0.0 {
                    return p1.factor;
                }
                let ratio = (rpm - p1.rpm) / span;
                return p1.factor + ratio * (p2.factor - p1.factor);
            }
        }

        1.0
    }
}

impl From<Vec<InterpolationPoint>> for CorrectionCurve {
    fn from(points: Vec<InterpolationPoint>) -> Self {
        Self::new(points)
    }
}

impl From<CorrectionCurve> for Vec<InterpolationPoint> {
    fn from(curve: CorrectionCurve) -> Self {
        curve.points
    }
}
