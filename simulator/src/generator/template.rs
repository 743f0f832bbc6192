use forcingcore::model::FrequencyBand;
use std::f64::consts::PI;

/// Daily modulation `1 + A·sin(2π(h − 12)/24)` for a UTC hour of day.
pub fn diurnal_factor(hour_of_day: f64, amplitude: f64) -> f64 {
    1.0 + amplitude * (2.0 * PI * (hour_of_day - 12.0) / 24.0).sin()
}

/// Contiguous log-spaced bins tiling `band` exactly.
pub fn log_spaced_bands(band: &FrequencyBand, bins: usize) -> Vec<FrequencyBand> {
    let bins = bins.max(1);
    let ratio = (band.upper_hz / band.lower_hz).powf(1.0 / bins as f64);
    let edge = |i: usize| match i {
        0 => band.lower_hz,
        i if i == bins => band.upper_hz,
        i => band.lower_hz * ratio.powi(i as i32),
    };
    (0..bins)
        .map(|i| FrequencyBand::new(edge(i), edge(i + 1)))
        .collect()
}
