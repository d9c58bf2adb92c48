//! Delimited log decoder
//!
//! Header matching is case-insensitive and whitespace-trimmed. Rows without
//! a numeric time or rpm are skipped; they are not errors.

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use super::{LogError, LogSample};

/// Delimiters tried when sniffing the header line, in preference order
const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Header names for each logical channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Timestamp column
    pub time: String,
    /// Engine speed column
    pub rpm: String,
    /// Relative throttle opening column
    pub raw_load: String,
    /// Short-term trim, bank 1
    pub stft_1: String,
    /// Short-term trim, bank 2
    pub stft_2: String,
    /// Display lambda, bank 1
    pub lambda_1: String,
    /// Display lambda, bank 2
    pub lambda_2: String,
    /// Preferred coolant temperature column
    pub coolant_temp: String,
    /// Tried in order when `coolant_temp` has no numeric value
    pub coolant_temp_fallbacks: Vec<String>,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            time: "Time".to_string(),
            rpm: "RPM".to_string(),
            raw_load: "relativer Oeffnungsquerschnitt".to_string(),
            stft_1: "Lambda Integrator 1".to_string(),
            stft_2: "Lambda Integrator 2".to_string(),
            // The logger exposes the integrators as the display lambda too
            lambda_1: "Lambda Integrator 1".to_string(),
            lambda_2: "Lambda Integrator 2".to_string(),
            coolant_temp: "Coolant Temperature".to_string(),
            coolant_temp_fallbacks: vec!["motor temp.".to_string(), "coolant temp".to_string()],
        }
    }
}

/// Resolved column indices for one header row
struct ColumnIndex {
    time: Option<usize>,
    rpm: Option<usize>,
    raw_load: Option<usize>,
    stft_1: Option<usize>,
    stft_2: Option<usize>,
    lambda_1: Option<usize>,
    lambda_2: Option<usize>,
    coolant: Vec<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, mapping: &ColumnMapping) -> Self {
        let find = |name: &str| {
            let name = name.trim().to_lowercase();
            headers.iter().position(|h| h.trim().to_lowercase() == name)
        };

        let coolant = std::iter::once(&mapping.coolant_temp)
            .chain(mapping.coolant_temp_fallbacks.iter())
            .filter_map(|name| find(name.as_str()))
            .collect();

        Self {
            time: find(mapping.time.as_str()),
            rpm: find(mapping.rpm.as_str()),
            raw_load: find(mapping.raw_load.as_str()),
            stft_1: find(mapping.stft_1.as_str()),
            stft_2: find(mapping.stft_2.as_str()),
            lambda_1: find(mapping.lambda_1.as_str()),
            lambda_2: find(mapping.lambda_2.as_str()),
            coolant,
        }
    }
}

/// Finite numeric value of a field, `None` when absent or not a number
fn number(record: &StringRecord, idx: Option<usize>) -> Option<f64> {
    record
        .get(idx?)
        .and_then(|field| field.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Pick the delimiter that splits the header line the most
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut best = (DELIMITERS[0], 0usize);
    for &delim in &DELIMITERS {
        let count = header.bytes().filter(|&b| b == delim).count();
        if count > best.1 {
            best = (delim, count);
        }
    }
    best.0
}

fn decode_row(record: &StringRecord, cols: &ColumnIndex) -> Option<LogSample> {
    let time = number(record, cols.time)?;
    let rpm = number(record, cols.rpm)?;

    let (stft1, stft2) = match (number(record, cols.stft_1), number(record, cols.stft_2)) {
        (Some(a), Some(b)) => (a, b),
        (Some(a), None) => (a, a),
        (None, Some(b)) => (b, b),
        (None, None) => (1.0, 1.0),
    };

    let coolant_temp = cols
        .coolant
        .iter()
        .find_map(|&idx| number(record, Some(idx)));

    Some(LogSample {
        time,
        rpm,
        raw_load: number(record, cols.raw_load).unwrap_or(0.0),
        stft1,
        stft2,
        lambda1: number(record, cols.lambda_1),
        lambda2: number(record, cols.lambda_2),
        coolant_temp,
    })
}

/// Decode log text into samples in source row order
///
/// Only a structurally unreadable header is an error; an empty result is
/// returned as `Ok` and left for the caller to report.
pub fn parse_log(text: &str, mapping: &ColumnMapping) -> Result<Vec<LogSample>, LogError> {
    let text = text.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(text);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let cols = ColumnIndex::resolve(&headers, mapping);
    if cols.time.is_none() || cols.rpm.is_none() {
        tracing::warn!(
            "Log header is missing '{}' or '{}'; no rows can be decoded",
            mapping.time,
            mapping.rpm
        );
    }

    let mut samples = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Skipping unreadable log record: {e}");
                skipped += 1;
                continue;
            }
        };
        match decode_row(&record, &cols) {
            Some(sample) => samples.push(sample),
            None => skipped += 1,
        }
    }

    tracing::debug!(
        "Decoded {} log rows ({} skipped, delimiter {:?})",
        samples.len(),
        skipped,
        delimiter as char
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_semicolon_delimiter() {
        assert_eq!(detect_delimiter("Time;RPM;Load\n1;2;3"), b';');
        assert_eq!(detect_delimiter("Time,RPM\n"), b',');
        assert_eq!(detect_delimiter("Time\n1"), b',');
    }

    #[test]
    fn headers_match_case_insensitively() {
        let text = "time ; rpm ; RELATIVER OEFFNUNGSQUERSCHNITT\n0.1;2000;12.5\n";
        let samples = parse_log(text, &ColumnMapping::default()).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].rpm, 2000.0);
        assert_eq!(samples[0].raw_load, 12.5);
    }

    #[test]
    fn non_numeric_load_defaults_to_zero() {
        let text = "Time,RPM,relativer Oeffnungsquerschnitt\n0.1,2000,n/a\n";
        let samples = parse_log(text, &ColumnMapping::default()).unwrap();
        assert_eq!(samples[0].raw_load, 0.0);
    }

    #[test]
    fn coolant_uses_fallback_header() {
        let text = "Time,RPM,Motor Temp.\n0.1,2000,82\n";
        let samples = parse_log(text, &ColumnMapping::default()).unwrap();
        assert_eq!(samples[0].coolant_temp, Some(82.0));
    }
}
