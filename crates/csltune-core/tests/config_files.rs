//! Tests for loading configuration and reference files from disk

use csltune_core::config::TuneConfig;
use csltune_core::datalog::FilterConfig;
use csltune_core::derived::StockReference;
use csltune_core::table::VeTable;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tune.json");

    let config = TuneConfig {
        filter: FilterConfig {
            min_temp: 72.0,
            transient_window: 6,
            ..FilterConfig::default()
        },
        ..TuneConfig::default()
    };
    config.save(&path).unwrap();

    let loaded = TuneConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = TuneConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().starts_with("I/O error"));
}

#[test]
fn test_stock_reference_from_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stock.json");
    let table = VeTable::filled(vec![1000.0, 2000.0], vec![10.0, 20.0], 1.0);
    let reference = StockReference {
        main: table.clone(),
        warmup: table.clone(),
        wot: table,
    };
    fs::write(&path, serde_json::to_string(&reference).unwrap()).unwrap();

    assert_eq!(StockReference::from_file(&path).unwrap(), reference);
}
