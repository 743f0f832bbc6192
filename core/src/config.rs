//! Analysis configuration and the versioned physical constants it carries.

use crate::model::FrequencyBand;
use crate::prelude::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Anthropogenic CO2 forcing used as the comparison yardstick (W/m²).
pub const CO2_REFERENCE_FORCING_W_M2: f64 = 2.7;

/// Frequency-dependent absorbed fraction of incident RF power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsorptionModel {
    pub default_fraction: f64,
    /// Overrides checked in order; the first band containing the frequency wins.
    pub overrides: Vec<AbsorptionOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsorptionOverride {
    pub band: FrequencyBand,
    pub fraction: f64,
}

impl Default for AbsorptionModel {
    fn default() -> Self {
        Self {
            default_fraction: 0.01,
            overrides: Vec::new(),
        }
    }
}

impl AbsorptionModel {
    pub fn fraction_at(&self, frequency_hz: f64) -> f64 {
        self.overrides
            .iter()
            .find(|o| o.band.contains(frequency_hz))
            .map(|o| o.fraction)
            .unwrap_or(self.default_fraction)
    }
}

/// Unit-conversion and radiative-transfer constants. Versioned because the
/// experiment protocol marks them as subject to revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    pub version: String,
    pub boltzmann_j_per_k: f64,
    pub speed_of_light_m_s: f64,
    /// Solid angle the radiometer brightness is integrated over (sr).
    pub solid_angle_sr: f64,
    pub absorption: AbsorptionModel,
    pub co2_reference_forcing_w_m2: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            version: "rf-forcing-constants/1".to_string(),
            boltzmann_j_per_k: 1.380_649e-23,
            speed_of_light_m_s: 299_792_458.0,
            solid_angle_sr: std::f64::consts::PI,
            absorption: AbsorptionModel::default(),
            co2_reference_forcing_w_m2: CO2_REFERENCE_FORCING_W_M2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Upper confidence bound below which a category supports the null hypothesis.
    pub null_upper_w_m2: f64,
    /// Lower confidence bound above which a category supports the alternative.
    pub alternative_lower_w_m2: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            null_upper_w_m2: 0.001,
            alternative_lower_w_m2: 0.01,
        }
    }
}

/// How confidence intervals are derived from a category's estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum IntervalMethod {
    StudentT,
    Bootstrap { resamples: usize, seed: u64 },
}

impl Default for IntervalMethod {
    fn default() -> Self {
        Self::StudentT
    }
}

/// Longest accepted window: one leap year.
pub const MAX_WINDOW_SECONDS: i64 = 366 * 24 * 3600;

/// Shared configuration for every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub band: FrequencyBand,
    pub min_frequency_bins: usize,
    /// Widest gap (Hz) that may be bridged by interpolation.
    pub max_gap_hz: f64,
    pub window_seconds: i64,
    pub confidence_level: f64,
    pub interval: IntervalMethod,
    pub thresholds: Thresholds,
    /// Abort on the first rejected record instead of skipping it.
    pub strict: bool,
    pub baseline_site: Option<String>,
    pub include_baseline_site: bool,
    pub constants: PhysicalConstants,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            band: FrequencyBand::ANALYSIS,
            min_frequency_bins: 8,
            max_gap_hz: 10.0e6,
            window_seconds: 3600,
            confidence_level: 0.95,
            interval: IntervalMethod::default(),
            thresholds: Thresholds::default(),
            strict: false,
            baseline_site: None,
            include_baseline_site: false,
            constants: PhysicalConstants::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.band.is_valid() {
            return Err(PipelineError::InvalidConfig(format!(
                "analysis band {} is empty or inverted",
                self.band
            )));
        }
        if self.min_frequency_bins == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_frequency_bins must be at least 1".into(),
            ));
        }
        if !(self.max_gap_hz.is_finite() && self.max_gap_hz >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "max_gap_hz must be a non-negative number".into(),
            ));
        }
        if self.window_seconds <= 0 {
            return Err(PipelineError::InvalidConfig(
                "window_seconds must be positive".into(),
            ));
        }
        if self.window_seconds > MAX_WINDOW_SECONDS {
            return Err(PipelineError::InvalidConfig(format!(
                "window_seconds {} exceeds {}",
                self.window_seconds, MAX_WINDOW_SECONDS
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "confidence_level {} outside (0, 1)",
                self.confidence_level
            )));
        }
        if let IntervalMethod::Bootstrap { resamples, .. } = self.interval {
            if resamples < 100 {
                return Err(PipelineError::InvalidConfig(
                    "bootstrap needs at least 100 resamples".into(),
                ));
            }
        }
        if self.thresholds.null_upper_w_m2 > self.thresholds.alternative_lower_w_m2 {
            return Err(PipelineError::InvalidConfig(
                "null threshold exceeds alternative threshold".into(),
            ));
        }
        let constants = &self.constants;
        let fractions = std::iter::once(constants.absorption.default_fraction)
            .chain(constants.absorption.overrides.iter().map(|o| o.fraction));
        for fraction in fractions {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(PipelineError::InvalidConfig(format!(
                    "absorption fraction {} outside [0, 1]",
                    fraction
                )));
            }
        }
        if constants.solid_angle_sr <= 0.0 || constants.co2_reference_forcing_w_m2 <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "solid angle and CO2 reference must be positive".into(),
            ));
        }
        Ok(())
    }
}
