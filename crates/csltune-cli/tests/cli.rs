//! End-to-end tests for the csltune binary

use std::fs;
use std::path::Path;
use std::process::Command;

use csltune_core::derived::StockReference;
use csltune_core::table::VeTable;
use csltune_core::variant::EcuVariant;
use tempfile::tempdir;

const IMAGE_SIZE: usize = 0x10000;
const VE_ADDRESS: usize = 0xD356;
const CORRECTION_FLAG: usize = 0xE5E4;

fn write_image(path: &Path) {
    let mut bytes = vec![0u8; IMAGE_SIZE];
    // Every VE cell = 1.000
    for cell in bytes[VE_ADDRESS..VE_ADDRESS + 24 * 20 * 2].chunks_exact_mut(2) {
        cell.copy_from_slice(&1000u16.to_be_bytes());
    }
    bytes[CORRECTION_FLAG] = 0x01;
    fs::write(path, bytes).unwrap();
}

fn write_log(path: &Path) {
    let mut text = String::from(
        "Time;RPM;relativer Oeffnungsquerschnitt;Lambda Integrator 1;Lambda Integrator 2\n",
    );
    for i in 0..20 {
        text.push_str(&format!("{:.2};3000;20;1.05;1.05\n", f64::from(i) * 0.05));
    }
    fs::write(path, text).unwrap();
}

fn write_stock(path: &Path) {
    let variant = EcuVariant::mss54hp();
    let stock = StockReference {
        main: VeTable::filled(variant.rpm_axis.clone(), variant.load_axis.clone(), 1.0),
        warmup: VeTable::filled(vec![1000.0, 3000.0, 6000.0], vec![5.0, 20.0], 1.2),
        wot: VeTable::filled(
            vec![2000.0, 4000.0, 6000.0, 8000.0],
            vec![0.0, 1.0, 2.0],
            1.4,
        ),
    };
    fs::write(path, serde_json::to_string(&stock).unwrap()).unwrap();
}

fn csltune() -> Command {
    Command::new(env!("CARGO_BIN_EXE_csltune"))
}

#[test]
fn test_tune_writes_patched_image() {
    let dir = tempdir().unwrap();
    let bin = dir.path().join("stock.bin");
    let log = dir.path().join("drive.csv");
    let out_dir = dir.path().join("out");
    write_image(&bin);
    write_log(&log);

    let output = csltune()
        .args(["tune", "--bin"])
        .arg(&bin)
        .arg("--log")
        .arg(&log)
        .arg("--patch")
        .arg("--out-dir")
        .arg(&out_dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let written: Vec<_> = fs::read_dir(&out_dir).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(written.len(), 1);
    let name = written[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("Tune_"), "{name}");
    assert!(name.ends_with("_stock_PatchON.bin"), "{name}");

    let patched = fs::read(&written[0]).unwrap();
    assert_eq!(patched.len(), IMAGE_SIZE);
    assert_eq!(patched[CORRECTION_FLAG], 0x02);
    // Untouched cell keeps 1.000
    assert_eq!(&patched[VE_ADDRESS..VE_ADDRESS + 2], &1000u16.to_be_bytes());
}

#[test]
fn test_analyze_rejects_log_without_rows() {
    let dir = tempdir().unwrap();
    let bin = dir.path().join("stock.bin");
    let log = dir.path().join("empty.csv");
    write_image(&bin);
    fs::write(&log, "Time;RPM\n;;\n").unwrap();

    let output = csltune()
        .args(["analyze", "--bin"])
        .arg(&bin)
        .arg("--log")
        .arg(&log)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No valid data"));
}

#[test]
fn test_analyze_reports_derived_maps() {
    let dir = tempdir().unwrap();
    let bin = dir.path().join("stock.bin");
    let log = dir.path().join("drive.csv");
    let stock = dir.path().join("reference.json");
    write_image(&bin);
    write_log(&log);
    write_stock(&stock);

    let run = |json: bool| {
        let mut cmd = csltune();
        cmd.args(["analyze", "--bin"])
            .arg(&bin)
            .arg("--log")
            .arg(&log)
            .arg("--stock")
            .arg(&stock);
        if json {
            cmd.arg("--json");
        }
        let output = cmd.output().unwrap();
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        String::from_utf8(output.stdout).unwrap()
    };

    let text = run(false);
    assert!(text.contains("Warmup map"), "{text}");
    assert!(text.contains("WOT map"), "{text}");

    let json: serde_json::Value = serde_json::from_str(&run(true)).unwrap();
    let warmup = json["warmup_map"]["data"].as_array().unwrap();
    assert_eq!(warmup.len(), 2);
    assert_eq!(warmup[0].as_array().unwrap().len(), 3);
    let wot = json["wot_map"]["data"].as_array().unwrap();
    assert_eq!(wot.len(), 3);
    assert_eq!(wot[0], wot[2]);
    assert!(json["new_table"].is_object());
}
