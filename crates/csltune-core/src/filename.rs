//! Output filename convention
//!
//! `Tune_<YYYYMMDDHHMM>_<base><_PatchON|_PatchOFF>.bin`, where `base` has any
//! earlier tune prefix and patch suffix removed so repeated round-trips do
//! not accumulate them.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

static BIN_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.bin$").expect("valid extension pattern"));

static TUNE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Tune_\d{12}_").expect("valid prefix pattern"));

static PATCH_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(_PatchON|_PatchOFF|_LTFT&MAPOFFPached)$").expect("valid suffix pattern")
});

/// Base name used when the source name cleans down to nothing
const DEFAULT_BASE: &str = "tune";

/// Strip extension, earlier tune prefix and patch suffix from a source name
pub fn clean_base_name(original: &str) -> String {
    let base = BIN_EXTENSION.replace(original, "");
    let base = TUNE_PREFIX.replace(&base, "");
    let base = PATCH_SUFFIX.replace(&base, "");
    if base.is_empty() {
        DEFAULT_BASE.to_string()
    } else {
        base.into_owned()
    }
}

/// Filename for a patched image written at `at`
pub fn output_file_name(original: &str, patched: bool, at: NaiveDateTime) -> String {
    let suffix = if patched { "_PatchON" } else { "_PatchOFF" };
    format!(
        "Tune_{}_{}{}.bin",
        at.format("%Y%m%d%H%M"),
        clean_base_name(original),
        suffix
    )
}
