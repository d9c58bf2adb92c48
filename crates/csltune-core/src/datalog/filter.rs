//! Log filter and throttle-opening corrector
//!
//! Stages run in a fixed order per sample; the first stage that rejects a
//! sample drops it and counts it. The transient lookback always compares
//! against the unfiltered input sequence.

use serde::{Deserialize, Serialize};

use super::{FilteredSample, LogSample, ProcessedLog};
use crate::interpolation::CorrectionCurve;

/// Throttle openings at or below this count as closed for the idle filter
const IDLE_MAX_LOAD: f64 = 1.0;

/// Number of leading corrections echoed at debug level
const DEBUG_ECHO_ROWS: usize = 5;

/// Inclusion filters and correction switch for log processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Divide throttle opening by the RPM correction curve
    pub enable_correction: bool,
    /// Drop samples colder than `min_temp`
    pub enable_min_temp: bool,
    /// Minimum coolant temperature in °C
    pub min_temp: f64,
    /// Drop closed-throttle samples below `idle_rpm`
    pub enable_idle: bool,
    /// Closed-throttle samples below this rpm are dropped
    pub idle_rpm: f64,
    /// Drop samples whose rpm or throttle moved too much over the window
    pub enable_transient: bool,
    /// Lookback distance in frames
    pub transient_window: usize,
    /// Relative rpm change allowed over the window, percent
    pub rpm_stable_threshold: f64,
    /// Absolute throttle-opening change allowed over the window, points
    pub tps_stable_threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enable_correction: true,
            enable_min_temp: true,
            min_temp: 65.0,
            enable_idle: true,
            idle_rpm: 1000.0,
            enable_transient: true,
            transient_window: 4,
            rpm_stable_threshold: 10.0,
            tps_stable_threshold: 5.0,
        }
    }
}

impl FilterConfig {
    fn rejects_temp(&self, sample: &LogSample) -> bool {
        // A log without a coolant channel is never filtered on temperature
        self.enable_min_temp
            && sample
                .coolant_temp
                .is_some_and(|temp| temp < self.min_temp)
    }

    fn rejects_idle(&self, sample: &LogSample) -> bool {
        self.enable_idle && sample.raw_load <= IDLE_MAX_LOAD && sample.rpm < self.idle_rpm
    }

    fn rejects_transient(&self, samples: &[LogSample], i: usize) -> bool {
        if !self.enable_transient || i < self.transient_window {
            return false;
        }
        let current = &samples[i];
        let prev = &samples[i - self.transient_window];

        let rpm_change_pct = if prev.rpm != 0.0 {
            ((current.rpm - prev.rpm) / prev.rpm).abs() * 100.0
        } else if current.rpm == 0.0 {
            0.0
        } else {
            f64::INFINITY
        };
        if rpm_change_pct > self.rpm_stable_threshold {
            return true;
        }

        (current.raw_load - prev.raw_load).abs() > self.tps_stable_threshold
    }
}

/// Filter `samples` and annotate survivors with their corrected load
///
/// Pure: the same input always yields the same output and counts.
pub fn process_log(
    samples: &[LogSample],
    file_name: &str,
    config: &FilterConfig,
    curve: &CorrectionCurve,
) -> ProcessedLog {
    let mut kept = Vec::with_capacity(samples.len());
    let mut dropped_count = 0usize;

    for (i, sample) in samples.iter().enumerate() {
        if config.rejects_temp(sample)
            || config.rejects_idle(sample)
            || config.rejects_transient(samples, i)
        {
            dropped_count += 1;
            continue;
        }

        let (corrected_load, correction_factor) = if config.enable_correction {
            let factor = curve.factor_at(sample.rpm);
            let divisor = if factor == 0.0 { 1.0 } else { factor };
            (sample.raw_load / divisor, divisor)
        } else {
            (sample.raw_load, 1.0)
        };

        if kept.len() < DEBUG_ECHO_ROWS {
            tracing::debug!(
                "Corrector rpm={} raw={} factor={} corrected={}",
                sample.rpm,
                sample.raw_load,
                correction_factor,
                corrected_load
            );
        }

        kept.push(FilteredSample {
            sample: sample.clone(),
            corrected_load,
            correction_factor,
        });
    }

    tracing::debug!(
        "Processed {}: {} valid, {} dropped",
        file_name,
        kept.len(),
        dropped_count
    );

    ProcessedLog {
        file_name: file_name.to_string(),
        valid_count: kept.len(),
        samples: kept,
        dropped_count,
    }
}
