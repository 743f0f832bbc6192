//! Frequency coverage of a window's bins over the analysis band.
//!
//! Interior gaps no wider than the configured maximum are bridged with a bin
//! whose PSD is interpolated between its neighbours. Wider gaps, and any gap
//! at either edge of the band, are reported as missing and contribute nothing.

use crate::math::spectral::SpectralHelper;
use crate::model::{Coverage, FrequencyBand};

/// Time-averaged reading of one frequency bin.
#[derive(Debug, Clone, PartialEq)]
pub struct BinReading {
    pub band: FrequencyBand,
    pub psd_w_m2_hz: f64,
    /// Standard error of the time-averaged PSD.
    pub sem_w_m2_hz: f64,
    pub readings: usize,
    pub fractional_error: f64,
    pub interpolated: bool,
}

#[derive(Debug, Clone)]
pub struct CoverageLayout {
    pub bins: Vec<BinReading>,
    pub coverage: Coverage,
    pub notes: Vec<String>,
}

/// Orders bins, trims overlaps and classifies the gaps between them.
pub fn lay_out(mut bins: Vec<BinReading>, band: &FrequencyBand, max_gap_hz: f64) -> CoverageLayout {
    bins.sort_by(|a, b| {
        a.band
            .lower_hz
            .total_cmp(&b.band.lower_hz)
            .then_with(|| a.band.upper_hz.total_cmp(&b.band.upper_hz))
    });

    let mut notes = Vec::new();
    let mut measured: Vec<BinReading> = Vec::with_capacity(bins.len());
    for mut bin in bins {
        if let Some(previous) = measured.last() {
            if bin.band.upper_hz <= previous.band.upper_hz {
                notes.push(format!("bin {} shadowed by {}", bin.band, previous.band));
                continue;
            }
            if bin.band.lower_hz < previous.band.upper_hz {
                bin.band.lower_hz = previous.band.upper_hz;
            }
        }
        measured.push(bin);
    }

    let covered_hz = measured.iter().map(|b| b.band.width()).sum();
    let mut missing = Vec::new();
    let mut interpolated = Vec::new();
    let mut laid_out = Vec::with_capacity(measured.len());

    match (measured.first(), measured.last()) {
        (Some(first), Some(last)) => {
            if first.band.lower_hz > band.lower_hz {
                missing.push(FrequencyBand::new(band.lower_hz, first.band.lower_hz));
            }
            for pair in measured.windows(2) {
                let (left, right) = (&pair[0], &pair[1]);
                laid_out.push(left.clone());
                if right.band.lower_hz <= left.band.upper_hz {
                    continue;
                }
                let gap = FrequencyBand::new(left.band.upper_hz, right.band.lower_hz);
                if gap.width() <= max_gap_hz {
                    let psd = SpectralHelper::interpolate(
                        (left.band.center(), left.psd_w_m2_hz),
                        (right.band.center(), right.psd_w_m2_hz),
                        gap.center(),
                    );
                    laid_out.push(BinReading {
                        band: gap,
                        psd_w_m2_hz: psd,
                        sem_w_m2_hz: left.sem_w_m2_hz.max(right.sem_w_m2_hz),
                        readings: 0,
                        fractional_error: left.fractional_error.max(right.fractional_error),
                        interpolated: true,
                    });
                    interpolated.push(gap);
                } else {
                    missing.push(gap);
                }
            }
            laid_out.push(last.clone());
            if last.band.upper_hz < band.upper_hz {
                missing.push(FrequencyBand::new(last.band.upper_hz, band.upper_hz));
            }
        }
        _ => missing.push(*band),
    }

    CoverageLayout {
        bins: laid_out,
        coverage: Coverage {
            band: *band,
            covered_hz,
            missing,
            interpolated,
        },
        notes,
    }
}
