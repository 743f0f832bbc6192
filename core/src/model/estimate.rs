use crate::model::sample::FrequencyBand;
use crate::model::site::SiteCategory;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[start, end)` aligned to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of `width_seconds` containing `timestamp`. The end saturates at
    /// the latest representable instant.
    pub fn containing(timestamp: DateTime<Utc>, width_seconds: i64) -> Self {
        let width = width_seconds.max(1);
        let start_secs = timestamp.timestamp().div_euclid(width) * width;
        let start = Utc
            .timestamp_opt(start_secs, 0)
            .single()
            .unwrap_or(timestamp);
        let end = Duration::try_seconds(width)
            .and_then(|span| start.checked_add_signed(span))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// One integrated frequency bin of an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralBin {
    pub band: FrequencyBand,
    pub psd_w_m2_hz: f64,
    pub absorption_fraction: f64,
    pub contribution_w_m2: f64,
    pub uncertainty_w_m2: f64,
    pub readings: usize,
    /// Bin synthesised by bridging a gap no wider than the configured maximum.
    pub interpolated: bool,
}

/// Frequency coverage of the samples behind an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub band: FrequencyBand,
    pub covered_hz: f64,
    /// Gaps left out of the integral.
    pub missing: Vec<FrequencyBand>,
    /// Gaps bridged by interpolation.
    pub interpolated: Vec<FrequencyBand>,
}

impl Coverage {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn fraction(&self) -> f64 {
        let width = self.band.width();
        if width > 0.0 {
            self.covered_hz / width
        } else {
            0.0
        }
    }
}

/// Residual radiative forcing of one site over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcingEstimate {
    pub site_id: String,
    pub category: SiteCategory,
    pub window: TimeWindow,
    /// Net forcing after baseline subtraction, clamped at zero (W/m²).
    pub forcing_w_m2: f64,
    pub unclamped_forcing_w_m2: f64,
    pub clamped: bool,
    pub gross_w_m2: f64,
    pub baseline_w_m2: f64,
    /// Propagated 1-sigma uncertainty (W/m²).
    pub uncertainty_w_m2: f64,
    /// Site samples that entered the integral.
    pub sample_count: usize,
    pub bins: Vec<SpectralBin>,
    pub coverage: Coverage,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ForcingEstimate {
    /// Symmetric bounds at `z` standard deviations around the unclamped value.
    pub fn bounds(&self, z: f64) -> (f64, f64) {
        let half = z * self.uncertainty_w_m2;
        (
            self.unclamped_forcing_w_m2 - half,
            self.unclamped_forcing_w_m2 + half,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_epoch_aligned() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 42, 7).unwrap();
        let window = TimeWindow::containing(ts, 3600);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap());
        assert!(window.contains(ts));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn huge_window_width_saturates_instead_of_overflowing() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 10, 42, 7).unwrap();
        let window = TimeWindow::containing(ts, i64::MAX / 10);
        assert_eq!(window.start, Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(window.end, DateTime::<Utc>::MAX_UTC);
        assert!(window.contains(ts));
    }

    #[test]
    fn coverage_fraction_of_full_band_is_one() {
        let coverage = Coverage {
            band: FrequencyBand::new(0.0, 10.0),
            covered_hz: 10.0,
            missing: Vec::new(),
            interpolated: Vec::new(),
        };
        assert!(coverage.is_complete());
        assert_eq!(coverage.fraction(), 1.0);
    }
}
