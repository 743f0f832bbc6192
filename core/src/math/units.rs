use crate::config::PhysicalConstants;

/// Deterministic conversions into spectral flux density (W/m²/Hz).
pub struct UnitConverter<'a> {
    constants: &'a PhysicalConstants,
}

impl<'a> UnitConverter<'a> {
    pub fn new(constants: &'a PhysicalConstants) -> Self {
        Self { constants }
    }

    /// Rayleigh-Jeans flux density `Ω · 2kTν²/c²` at `frequency_hz`.
    pub fn brightness_to_psd(&self, kelvin: f64, frequency_hz: f64) -> f64 {
        let c = self.constants.speed_of_light_m_s;
        self.constants.solid_angle_sr
            * 2.0
            * self.constants.boltzmann_j_per_k
            * kelvin
            * frequency_hz
            * frequency_hz
            / (c * c)
    }

    /// Inverse of [`Self::brightness_to_psd`].
    pub fn psd_to_brightness(&self, psd_w_m2_hz: f64, frequency_hz: f64) -> f64 {
        let per_kelvin = self.brightness_to_psd(1.0, frequency_hz);
        if per_kelvin > 0.0 {
            psd_w_m2_hz / per_kelvin
        } else {
            0.0
        }
    }

    pub fn dbm_to_watts(dbm: f64) -> f64 {
        10f64.powf((dbm - 30.0) / 10.0)
    }
}
