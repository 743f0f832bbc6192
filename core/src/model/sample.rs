use crate::model::site::SiteCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed frequency interval in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub lower_hz: f64,
    pub upper_hz: f64,
}

impl FrequencyBand {
    /// Default analysis range of the experiment, 1 MHz to 30 GHz.
    pub const ANALYSIS: FrequencyBand = FrequencyBand {
        lower_hz: 1.0e6,
        upper_hz: 30.0e9,
    };

    pub fn new(lower_hz: f64, upper_hz: f64) -> Self {
        Self { lower_hz, upper_hz }
    }

    pub fn is_valid(&self) -> bool {
        self.lower_hz.is_finite()
            && self.upper_hz.is_finite()
            && self.lower_hz >= 0.0
            && self.upper_hz > self.lower_hz
    }

    pub fn width(&self) -> f64 {
        self.upper_hz - self.lower_hz
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.lower_hz + self.upper_hz)
    }

    pub fn contains(&self, frequency_hz: f64) -> bool {
        frequency_hz >= self.lower_hz && frequency_hz <= self.upper_hz
    }

    /// Part of `self` inside `bounds`, if any width remains.
    pub fn clip(&self, bounds: &FrequencyBand) -> Option<FrequencyBand> {
        let lower = self.lower_hz.max(bounds.lower_hz);
        let upper = self.upper_hz.min(bounds.upper_hz);
        (upper > lower).then(|| FrequencyBand::new(lower, upper))
    }

    /// Bit-exact key for grouping readings of the same band.
    pub(crate) fn key(&self) -> (u64, u64) {
        (self.lower_hz.to_bits(), self.upper_hz.to_bits())
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6e} Hz, {:.6e} Hz]", self.lower_hz, self.upper_hz)
    }
}

/// Quantity as reported by the instrument, before conversion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    PowerSpectralDensity { w_m2_hz: f64 },
    BrightnessTemperature { kelvin: f64 },
}

/// A single validated instrument reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub site_id: String,
    pub category: SiteCategory,
    pub instrument_id: String,
    pub band: FrequencyBand,
    pub measurement: Measurement,
    /// Spectral flux density after unit conversion (W/m²/Hz).
    pub psd_w_m2_hz: f64,
}

/// A meteorological station reading co-located with an RF site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub timestamp: DateTime<Utc>,
    pub site_id: String,
    pub instrument_id: String,
    pub temperature_k: f64,
    pub humidity_percent: f64,
}
