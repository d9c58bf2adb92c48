//! Derived Maps
//!
//! Rebuilds the warmup and WOT tables from a tuned main table while
//! preserving the stock ratio between each derived table and the main one.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::interpolation::interpolate_map;
use crate::table::VeTable;

/// Stock calibration tables used as the ratio reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReference {
    /// Stock main VE table
    pub main: VeTable,
    /// Stock cold-start table on its own axes
    pub warmup: VeTable,
    /// Stock full-load table; every row is the same curve over `x_axis`
    pub wot: VeTable,
}

impl StockReference {
    /// Load a reference set from JSON
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `stock_cell / stock_main(rpm, load)`, neutral when the denominator is 0
fn stock_ratio(stock_cell: f64, stock_main: &VeTable, rpm: f64, load: f64) -> f64 {
    let base = interpolate_map(stock_main, rpm, load);
    if base == 0.0 {
        1.0
    } else {
        stock_cell / base
    }
}

/// Warmup table on the stock warmup axes, scaled by the tuned main table
///
/// If the stock warmup grid does not match its own axes, logs a warning and
/// returns the tuned main table unchanged.
pub fn generate_warmup_map(tuned: &VeTable, stock: &StockReference) -> VeTable {
    let reference = &stock.warmup;
    if let Err(e) = reference.check_shape() {
        tracing::warn!("Stock warmup reference is malformed ({e}); using tuned main table");
        return tuned.clone();
    }

    let data = reference
        .y_axis
        .iter()
        .zip(&reference.data)
        .map(|(&load, row)| {
            reference
                .x_axis
                .iter()
                .zip(row)
                .map(|(&rpm, &stock_cell)| {
                    let ratio = stock_ratio(stock_cell, &stock.main, rpm, load);
                    interpolate_map(tuned, rpm, load) * ratio
                })
                .collect()
        })
        .collect();

    VeTable {
        x_axis: reference.x_axis.clone(),
        y_axis: reference.y_axis.clone(),
        data,
    }
}

/// WOT table evaluated at the main table's highest load breakpoint
///
/// Produces one curve over the stock WOT rpm axis, replicated over the stock
/// WOT row count. Returns an empty grid when the stock WOT columns do not
/// match that rpm axis.
pub fn generate_wot_map(tuned: &VeTable, stock: &StockReference) -> VeTable {
    let reference = &stock.wot;
    let columns_match = !reference.data.is_empty()
        && reference
            .data
            .iter()
            .all(|row| row.len() == reference.x_axis.len());
    if !columns_match {
        tracing::warn!(
            "Stock WOT reference columns do not match its {}-point rpm axis; no WOT map generated",
            reference.x_axis.len()
        );
        return VeTable {
            x_axis: reference.x_axis.clone(),
            y_axis: Vec::new(),
            data: Vec::new(),
        };
    }

    let max_load = tuned.y_axis.last().copied().unwrap_or(0.0);
    let curve: Vec<f64> = reference
        .x_axis
        .iter()
        .zip(&reference.data[0])
        .map(|(&rpm, &stock_cell)| {
            let ratio = stock_ratio(stock_cell, &stock.main, rpm, max_load);
            interpolate_map(tuned, rpm, max_load) * ratio
        })
        .collect();

    let rows = reference.data.len();
    VeTable {
        x_axis: reference.x_axis.clone(),
        y_axis: reference.y_axis.clone(),
        data: vec![curve; rows],
    }
}
