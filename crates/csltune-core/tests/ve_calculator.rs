//! Tests for the weighted bilinear VE recalculation

use csltune_core::datalog::{FilteredSample, LogSample};
use csltune_core::table::{TableError, VeTable};
use csltune_core::ve_calc::recalculate;
use pretty_assertions::assert_eq;

fn table() -> VeTable {
    VeTable::new(
        vec![1000.0, 2000.0, 3000.0],
        vec![10.0, 20.0],
        vec![vec![1.0, 1.2, 1.4], vec![2.0, 2.2, 2.4]],
    )
    .unwrap()
}

fn point(rpm: f64, load: f64, stft1: f64, stft2: f64) -> FilteredSample {
    FilteredSample {
        sample: LogSample {
            time: 0.0,
            rpm,
            raw_load: load,
            stft1,
            stft2,
            lambda1: None,
            lambda2: None,
            coolant_temp: None,
        },
        corrected_load: load,
        correction_factor: 1.0,
    }
}

#[test]
fn test_no_samples_leaves_table_unchanged() {
    let current = table();
    let result = recalculate(&current, &[]).unwrap();

    assert_eq!(result.new_table, current);
    assert!(result.hit_count.iter().flatten().all(|&h| h == 0));
    assert!(result.weight.iter().flatten().all(|&w| w == 0.0));
    assert!(result.diff_percent.iter().flatten().all(|&d| d == 100.0));
    assert!(result.correction.iter().flatten().all(|&c| c == 1.0));
}

#[test]
fn test_node_sample_corrects_single_cell() {
    let current = table();
    let result = recalculate(&current, &[point(2000.0, 20.0, 1.10, 1.00)]).unwrap();

    assert!((result.new_table.data[1][1] - 2.2 * 1.05).abs() < 1e-12);
    assert_eq!(result.hit_count[1][1], 1);
    assert_eq!(result.weight[1][1], 1.0);
    assert!((result.diff_percent[1][1] - 105.0).abs() < 1e-9);

    // Every other cell is untouched
    for (r, c) in [(0, 0), (0, 1), (0, 2), (1, 0), (1, 2)] {
        assert_eq!(result.new_table.data[r][c], current.data[r][c]);
        assert_eq!(result.hit_count[r][c], 0);
        assert_eq!(result.weight[r][c], 0.0);
    }
}

#[test]
fn test_weighted_mean_across_samples() {
    let samples = vec![
        point(1000.0, 10.0, 1.10, 1.10),
        point(1000.0, 10.0, 0.90, 0.90),
        point(1000.0, 10.0, 1.00, 1.00),
    ];
    let result = recalculate(&table(), &samples).unwrap();
    assert!((result.correction[0][0] - 1.0).abs() < 1e-12);
    assert_eq!(result.hit_count[0][0], 3);
    assert_eq!(result.weight[0][0], 3.0);
}

#[test]
fn test_low_weight_cell_is_not_corrected() {
    // 0.95 of the weight lands on [0][0], 0.05 on [0][1]
    let result = recalculate(&table(), &[point(1050.0, 10.0, 1.2, 1.2)]).unwrap();

    assert!((result.new_table.data[0][0] - 1.2).abs() < 1e-12);
    assert_eq!(result.hit_count[0][0], 1);

    assert_eq!(result.new_table.data[0][1], 1.2);
    assert_eq!(result.hit_count[0][1], 0);
    assert_eq!(result.weight[0][1], 0.0);
    assert_eq!(result.diff_percent[0][1], 100.0);
}

#[test]
fn test_out_of_range_sample_binds_to_edge() {
    let result = recalculate(&table(), &[point(9000.0, 150.0, 1.1, 1.1)]).unwrap();
    assert_eq!(result.hit_count[1][2], 1);
    assert!((result.new_table.data[1][2] - 2.4 * 1.1).abs() < 1e-12);
}

#[test]
fn test_axes_are_copied() {
    let current = table();
    let result = recalculate(&current, &[]).unwrap();
    assert_eq!(result.new_table.x_axis, current.x_axis);
    assert_eq!(result.new_table.y_axis, current.y_axis);
}

#[test]
fn test_malformed_table_is_rejected() {
    let broken = VeTable {
        x_axis: vec![1000.0, 2000.0],
        y_axis: vec![10.0],
        data: vec![],
    };
    assert_eq!(
        recalculate(&broken, &[]).unwrap_err(),
        TableError::RowCountMismatch {
            expected: 1,
            actual: 0
        }
    );
}
