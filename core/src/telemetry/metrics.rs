use crate::prelude::PipelineError;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Audit trail of everything read, kept or dropped during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub records_read: usize,
    pub samples_accepted: usize,
    pub station_records_accepted: usize,
    pub validation_errors: usize,
    pub calibration_missing: usize,
    pub windows_estimated: usize,
    pub windows_insufficient_coverage: usize,
    pub windows_missing_baseline: usize,
    pub estimates_clamped: usize,
    pub estimates_with_coverage_gaps: usize,
}

impl RunSummary {
    pub fn records_skipped(&self) -> usize {
        self.validation_errors + self.calibration_missing
    }

    pub fn windows_omitted(&self) -> usize {
        self.windows_insufficient_coverage + self.windows_missing_baseline
    }
}

/// Thread-safe counters shared by stages running over separate partitions.
pub struct RunCounters {
    inner: Mutex<RunSummary>,
}

impl RunCounters {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunSummary::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut RunSummary)) {
        if let Ok(mut summary) = self.inner.lock() {
            apply(&mut summary);
        }
    }

    /// Zeroes every counter ahead of a new run.
    pub fn reset(&self) {
        self.update(|s| *s = RunSummary::default());
    }

    pub fn record_read(&self, count: usize) {
        self.update(|s| s.records_read += count);
    }

    pub fn record_sample(&self) {
        self.update(|s| s.samples_accepted += 1);
    }

    pub fn record_station(&self) {
        self.update(|s| s.station_records_accepted += 1);
    }

    pub fn record_estimate(&self, clamped: bool, has_gaps: bool) {
        self.update(|s| {
            s.windows_estimated += 1;
            if clamped {
                s.estimates_clamped += 1;
            }
            if has_gaps {
                s.estimates_with_coverage_gaps += 1;
            }
        });
    }

    /// Counts a recoverable failure under its kind. Other errors are not counted.
    pub fn record_error(&self, error: &PipelineError) {
        self.update(|s| match error {
            PipelineError::Validation { .. } => s.validation_errors += 1,
            PipelineError::CalibrationMissing { .. } => s.calibration_missing += 1,
            PipelineError::InsufficientCoverage { .. } => s.windows_insufficient_coverage += 1,
            PipelineError::MissingBaseline { .. } => s.windows_missing_baseline += 1,
            _ => {}
        });
    }

    pub fn snapshot(&self) -> RunSummary {
        self.inner
            .lock()
            .map(|summary| summary.clone())
            .unwrap_or_default()
    }
}

impl Default for RunCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_counted_by_kind() {
        let counters = RunCounters::new();
        counters.record_error(&PipelineError::Validation {
            index: 3,
            source_label: "spectrometer.csv".into(),
            reason: "unknown site antenna-42".into(),
        });
        counters.record_error(&PipelineError::CalibrationMissing {
            site: "urban-1".into(),
            instrument: "sdr-1".into(),
        });
        counters.record_error(&PipelineError::Internal("ignored".into()));
        let summary = counters.snapshot();
        assert_eq!(summary.validation_errors, 1);
        assert_eq!(summary.calibration_missing, 1);
        assert_eq!(summary.records_skipped(), 2);
    }

    #[test]
    fn estimates_track_clamping_and_gaps() {
        let counters = RunCounters::new();
        counters.record_estimate(true, false);
        counters.record_estimate(false, true);
        let summary = counters.snapshot();
        assert_eq!(summary.windows_estimated, 2);
        assert_eq!(summary.estimates_clamped, 1);
        assert_eq!(summary.estimates_with_coverage_gaps, 1);
    }
}
