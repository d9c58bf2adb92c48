//! CSL Tune command line
//!
//! Reads a calibration image and a driving log from disk, runs the core
//! recalculation, and prints or writes the results.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use csltune_core::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "MSS54HP VE table recalculation", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a binary and print its VE table and patch status
    Inspect(InspectArgs),
    /// Recalculate the VE table and print the diagnostic grids
    Analyze(RunArgs),
    /// Recalculate and write a patched binary
    Tune(TuneArgs),
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Calibration image
    #[arg(value_hint = ValueHint::FilePath)]
    bin: PathBuf,

    /// Tuning configuration (JSON)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Print JSON instead of text grids
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Calibration image
    #[arg(long, value_hint = ValueHint::FilePath)]
    bin: PathBuf,

    /// Driving log (delimited text)
    #[arg(long, value_hint = ValueHint::FilePath)]
    log: PathBuf,

    /// Tuning configuration (JSON)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Stock reference tables (JSON) for warmup/WOT derivation
    #[arg(long, value_hint = ValueHint::FilePath)]
    stock: Option<PathBuf>,

    /// Print JSON instead of text grids
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Args, Debug)]
struct TuneArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Apply the logging patch (map correction off, 100°C threshold)
    #[arg(long, action = ArgAction::SetTrue)]
    patch: bool,

    /// Directory for the output image
    #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Inspect(args) => handle_inspect(args),
        Command::Analyze(args) => handle_analyze(args),
        Command::Tune(args) => handle_tune(args),
    }
}

fn load_config(path: Option<&Path>) -> Result<TuneConfig> {
    match path {
        Some(path) => TuneConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(TuneConfig::default()),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Warmup and WOT tables derived from the recalculated main table
struct DerivedMaps {
    warmup: VeTable,
    wot: VeTable,
}

/// Everything one recalculation run produces
struct Analysis {
    bin_bytes: Vec<u8>,
    variant: EcuVariant,
    current: VeTable,
    processed: ProcessedLog,
    result: VeCalcResult,
    derived: Option<DerivedMaps>,
}

fn analyze(args: &RunArgs) -> Result<Analysis> {
    let config = load_config(args.config.as_deref())?;
    let variant = config.variant();

    let bin_bytes =
        fs::read(&args.bin).with_context(|| format!("failed to read {}", args.bin.display()))?;
    let current = BinaryImage::new(&bin_bytes)
        .read_ve_table(&variant)
        .context("failed to decode VE table")?;

    let log_text = fs::read_to_string(&args.log)
        .with_context(|| format!("failed to read {}", args.log.display()))?;
    let samples = parse_log(&log_text, &config.columns).context("failed to parse log")?;
    if samples.is_empty() {
        bail!(LogError::NoValidData);
    }

    let curve = config.curve(&variant);
    let processed = process_log(&samples, &file_name(&args.log), &config.filter, &curve)
        .require_data()
        .context("no samples survived filtering")?;
    info!(
        "{}: {} samples valid, {} dropped",
        processed.file_name, processed.valid_count, processed.dropped_count
    );

    let result = recalculate(&current, &processed.samples)?;

    let derived = match &args.stock {
        Some(stock_path) => {
            let stock = StockReference::from_file(stock_path).with_context(|| {
                format!("failed to load stock reference {}", stock_path.display())
            })?;
            Some(DerivedMaps {
                warmup: generate_warmup_map(&result.new_table, &stock),
                wot: generate_wot_map(&result.new_table, &stock),
            })
        }
        None => None,
    };

    Ok(Analysis {
        bin_bytes,
        variant,
        current,
        processed,
        result,
        derived,
    })
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let variant = config.variant();
    let bytes =
        fs::read(&args.bin).with_context(|| format!("failed to read {}", args.bin.display()))?;
    let image = BinaryImage::new(&bytes);
    let table = image.read_ve_table(&variant)?;
    let status = PatchStatus::read(&image, &variant)?;

    if args.json {
        let out = serde_json::json!({
            "variant": variant.name,
            "status": status,
            "patched": status.is_patched(),
            "ve_table": table,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Variant: {}", variant.name);
    println!(
        "Map correction: {}",
        if status.map_correction_off { "OFF" } else { "ON" }
    );
    println!("Adaptation threshold: {}°C", status.temp_threshold);
    println!("Logging patch applied: {}", status.is_patched());
    println!();
    print_grid("VE table", &table.x_axis, &table.y_axis, &table.data);
    Ok(())
}

fn handle_analyze(args: RunArgs) -> Result<()> {
    let analysis = analyze(&args)?;
    let result = &analysis.result;

    if args.json {
        let mut out = serde_json::to_value(result)?;
        if let Some(derived) = &analysis.derived {
            out["warmup_map"] = serde_json::to_value(&derived.warmup)?;
            out["wot_map"] = serde_json::to_value(&derived.wot)?;
        }
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let x = &analysis.current.x_axis;
    let y = &analysis.current.y_axis;
    print_grid("New VE table", x, y, &result.new_table.data);
    print_grid("Correction %", x, y, &result.diff_percent);
    let hits: Vec<Vec<f64>> = result
        .hit_count
        .iter()
        .map(|row| row.iter().map(|&h| f64::from(h)).collect())
        .collect();
    print_grid("Hit count", x, y, &hits);
    print_grid("Cell weight", x, y, &result.weight);
    print_grid(
        "Change vs current %",
        x,
        y,
        &percent_difference(&result.new_table.data, &analysis.current.data),
    );
    if let Some(derived) = &analysis.derived {
        let DerivedMaps { warmup, wot } = derived;
        print_grid("Warmup map", &warmup.x_axis, &warmup.y_axis, &warmup.data);
        print_grid("WOT map", &wot.x_axis, &wot.y_axis, &wot.data);
    }
    Ok(())
}

fn handle_tune(args: TuneArgs) -> Result<()> {
    let analysis = analyze(&args.run)?;
    let mut patcher = Patcher::new(&analysis.bin_bytes, &analysis.variant);
    patcher
        .write_ve_table(&analysis.result.new_table)
        .context("failed to encode VE table")?;

    if let Some(derived) = &analysis.derived {
        if !patcher.write_warmup_table(&derived.warmup)? {
            warn!("Warmup map not written to image");
        }
        if !patcher.write_wot_table(&derived.wot)? {
            warn!("WOT map not written to image");
        }
    }

    patcher
        .apply_logging_patch(args.patch)
        .context("failed to write patch flags")?;

    let name = output_file_name(
        &file_name(&args.run.bin),
        args.patch,
        Local::now().naive_local(),
    );
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    let out_path = args.out_dir.join(name);
    fs::write(&out_path, patcher.into_bytes())
        .with_context(|| format!("failed to write {}", out_path.display()))?;

    info!(
        "Wrote {} ({} of {} samples used)",
        out_path.display(),
        analysis.processed.valid_count,
        analysis.processed.valid_count + analysis.processed.dropped_count
    );
    println!("{}", out_path.display());
    Ok(())
}

fn print_grid(title: &str, x_axis: &[f64], y_axis: &[f64], data: &[Vec<f64>]) {
    println!("{title}");
    print!("{:>8}", "");
    for rpm in x_axis {
        print!("{rpm:>8.0}");
    }
    println!();
    for (load, row) in y_axis.iter().zip(data) {
        print!("{load:>8.1}");
        for value in row {
            print!("{value:>8.3}");
        }
        println!();
    }
    println!();
}
