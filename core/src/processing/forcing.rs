use crate::config::AnalysisConfig;
use crate::math::spectral::SpectralHelper;
use crate::math::stats::StatsHelper;
use crate::model::{Coverage, ForcingEstimate, FrequencyBand, Sample, SpectralBin, TimeWindow};
use crate::prelude::{PipelineError, PipelineResult, ProcessingStage};
use crate::processing::coverage::{lay_out, BinReading};
use crate::processing::windowing::WindowPartition;
use crate::telemetry::log::LogManager;
use ndarray::Array1;
use std::collections::BTreeMap;

/// Integrated absorbed power of one site's samples over one window.
#[derive(Debug, Clone)]
struct SideIntegral {
    gross_w_m2: f64,
    sigma_w_m2: f64,
    bins: Vec<SpectralBin>,
    coverage: Coverage,
    /// Samples inside the analysis band.
    integrated_samples: usize,
    notes: Vec<String>,
}

/// Forcing estimator: integrates spectral power, subtracts the rural
/// baseline and propagates calibration uncertainty.
pub struct ForcingStage {
    config: Option<AnalysisConfig>,
    logger: LogManager,
}

impl ForcingStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("forcing"),
        }
    }

    fn integrate(
        config: &AnalysisConfig,
        site_id: &str,
        window: TimeWindow,
        samples: &[Sample],
        calibration: &BTreeMap<String, f64>,
    ) -> PipelineResult<SideIntegral> {
        let mut notes = Vec::new();
        let mut grouped: BTreeMap<(u64, u64), (Vec<f64>, f64)> = BTreeMap::new();
        let mut outside = 0usize;
        let mut integrated_samples = 0usize;
        for sample in samples {
            let error = *calibration.get(&sample.instrument_id).ok_or_else(|| {
                PipelineError::CalibrationMissing {
                    site: site_id.to_string(),
                    instrument: sample.instrument_id.clone(),
                }
            })?;
            if sample.band.clip(&config.band).is_none() {
                outside += 1;
                continue;
            }
            let entry = grouped
                .entry(sample.band.key())
                .or_insert_with(|| (Vec::new(), 0.0));
            entry.0.push(sample.psd_w_m2_hz);
            entry.1 = entry.1.max(error);
            integrated_samples += 1;
        }
        if outside > 0 {
            notes.push(format!("{} samples outside {} ignored", outside, config.band));
        }

        if grouped.len() < config.min_frequency_bins {
            return Err(PipelineError::InsufficientCoverage {
                site: site_id.to_string(),
                window,
                bins: grouped.len(),
                required: config.min_frequency_bins,
            });
        }

        let readings: Vec<BinReading> = grouped
            .into_iter()
            .filter_map(|((lower, upper), (values, fractional_error))| {
                let band = FrequencyBand::new(f64::from_bits(lower), f64::from_bits(upper))
                    .clip(&config.band)?;
                Some(BinReading {
                    band,
                    psd_w_m2_hz: StatsHelper::mean(&values),
                    sem_w_m2_hz: StatsHelper::standard_error(&values),
                    readings: values.len(),
                    fractional_error,
                    interpolated: false,
                })
            })
            .collect();

        let layout = lay_out(readings, &config.band, config.max_gap_hz);
        notes.extend(layout.notes);

        let absorption_model = &config.constants.absorption;
        let psd: Array1<f64> = layout.bins.iter().map(|b| b.psd_w_m2_hz).collect();
        let widths: Array1<f64> = layout.bins.iter().map(|b| b.band.width()).collect();
        let absorption: Array1<f64> = layout
            .bins
            .iter()
            .map(|b| absorption_model.fraction_at(b.band.center()))
            .collect();

        let contributions = SpectralHelper::contributions(psd.view(), absorption.view(), widths.view());
        let gross_w_m2 = SpectralHelper::integrate(psd.view(), absorption.view(), widths.view());

        let bins: Vec<SpectralBin> = layout
            .bins
            .iter()
            .enumerate()
            .map(|(i, reading)| {
                let contribution = contributions[i];
                let calibration_term = reading.fractional_error * contribution;
                let sampling_term = absorption[i] * widths[i] * reading.sem_w_m2_hz;
                SpectralBin {
                    band: reading.band,
                    psd_w_m2_hz: reading.psd_w_m2_hz,
                    absorption_fraction: absorption[i],
                    contribution_w_m2: contribution,
                    uncertainty_w_m2: StatsHelper::quadrature([calibration_term, sampling_term]),
                    readings: reading.readings,
                    interpolated: reading.interpolated,
                }
            })
            .collect();
        let sigma_w_m2 = StatsHelper::quadrature(bins.iter().map(|b| b.uncertainty_w_m2));

        Ok(SideIntegral {
            gross_w_m2,
            sigma_w_m2,
            bins,
            coverage: layout.coverage,
            integrated_samples,
            notes,
        })
    }
}

impl Default for ForcingStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for ForcingStage {
    type Input = WindowPartition;
    type Output = ForcingEstimate;

    fn initialize(&mut self, config: &AnalysisConfig) -> PipelineResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: Self::Input) -> PipelineResult<Self::Output> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("stage not initialized".into()))?;

        if input.samples.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "no samples for {} in {}",
                input.site_id, input.window
            )));
        }
        if input.baseline.is_empty() {
            return Err(PipelineError::MissingBaseline {
                site: input.site_id.clone(),
                window: input.window,
            });
        }

        let site = Self::integrate(
            config,
            &input.site_id,
            input.window,
            &input.samples,
            &input.calibration,
        )?;
        let baseline = Self::integrate(
            config,
            &input.baseline_site_id,
            input.window,
            &input.baseline,
            &input.baseline_calibration,
        )?;

        let unclamped = site.gross_w_m2 - baseline.gross_w_m2;
        let clamped = unclamped < 0.0;
        let mut notes = site.notes;
        let uncertainty = if input.is_baseline() {
            notes.push("baseline site: referenced against itself".into());
            0.0
        } else {
            StatsHelper::quadrature([site.sigma_w_m2, baseline.sigma_w_m2])
        };
        if clamped {
            notes.push(format!("negative residual {:.6e} W/m2 clamped to zero", unclamped));
        }
        if !baseline.coverage.is_complete() {
            notes.push(format!(
                "baseline {} has {} coverage gaps",
                input.baseline_site_id,
                baseline.coverage.missing.len()
            ));
        }

        self.logger.detail(&format!(
            "{} {} forcing {:.6e} +/- {:.3e} W/m2",
            input.site_id, input.window, unclamped, uncertainty
        ));

        Ok(ForcingEstimate {
            site_id: input.site_id,
            category: input.category,
            window: input.window,
            forcing_w_m2: unclamped.max(0.0),
            unclamped_forcing_w_m2: unclamped,
            clamped,
            gross_w_m2: site.gross_w_m2,
            baseline_w_m2: baseline.gross_w_m2,
            uncertainty_w_m2: uncertainty,
            sample_count: site.integrated_samples,
            bins: site.bins,
            coverage: site.coverage,
            notes,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Measurement, SiteCategory};
    use chrono::{Duration, TimeZone, Utc};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const BINS: usize = 20;

    /// Log-spaced contiguous bins tiling the analysis band.
    fn bands() -> Vec<FrequencyBand> {
        let (lo, hi) = (FrequencyBand::ANALYSIS.lower_hz, FrequencyBand::ANALYSIS.upper_hz);
        let ratio = (hi / lo).powf(1.0 / BINS as f64);
        (0..BINS)
            .map(|i| {
                let lower = if i == 0 { lo } else { lo * ratio.powi(i as i32) };
                let upper = if i + 1 == BINS { hi } else { lo * ratio.powi(i as i32 + 1) };
                FrequencyBand::new(lower, upper)
            })
            .collect()
    }

    /// Samples whose absorbed power integrates to `gross` W/m², with uniform noise.
    fn synthetic(site: &str, gross: f64, noise: f64, readings: usize, seed: u64) -> Vec<Sample> {
        let absorption = AnalysisConfig::default().constants.absorption.default_fraction;
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut samples = Vec::new();
        for reading in 0..readings {
            for band in bands() {
                let psd = gross / (BINS as f64 * absorption * band.width());
                let psd = if noise > 0.0 {
                    psd * (1.0 + rng.gen_range(-noise..noise))
                } else {
                    psd
                };
                samples.push(Sample {
                    timestamp: start + Duration::minutes(reading as i64 * 5),
                    site_id: site.into(),
                    category: SiteCategory::Urban,
                    instrument_id: "sdr".into(),
                    band,
                    measurement: Measurement::PowerSpectralDensity { w_m2_hz: psd },
                    psd_w_m2_hz: psd,
                });
            }
        }
        samples
    }

    fn partition(site: Vec<Sample>, baseline: Vec<Sample>, baseline_site: &str) -> WindowPartition {
        let calibration: BTreeMap<String, f64> = [("sdr".to_string(), 0.05)].into_iter().collect();
        WindowPartition {
            site_id: site[0].site_id.clone(),
            category: site[0].category,
            window: TimeWindow::containing(site[0].timestamp, 3600),
            samples: site,
            calibration: calibration.clone(),
            baseline_site_id: baseline_site.into(),
            baseline,
            baseline_calibration: calibration,
        }
    }

    fn stage() -> ForcingStage {
        let mut stage = ForcingStage::new();
        stage.initialize(&AnalysisConfig::default()).unwrap();
        stage
    }

    #[test]
    fn injected_forcing_is_recovered_within_interval() {
        let (baseline, injected) = (0.002, 0.004);
        for seed in 0..5u64 {
            let site = synthetic("urban-1", baseline + injected, 0.01, 5, seed);
            let rural = synthetic("rural-1", baseline, 0.01, 5, seed + 100);
            let estimate = stage().execute(partition(site, rural, "rural-1")).unwrap();
            let (lower, upper) = estimate.bounds(1.96);
            assert!(
                lower <= injected && injected <= upper,
                "seed {}: {} not in [{}, {}]",
                seed,
                injected,
                lower,
                upper
            );
            assert!(estimate.coverage.is_complete());
            assert_eq!(estimate.bins.len(), BINS);
        }
    }

    #[test]
    fn identical_baseline_yields_exact_zero() {
        let samples = synthetic("rural-1", 0.003, 0.02, 3, 9);
        let estimate = stage()
            .execute(partition(samples.clone(), samples, "rural-1"))
            .unwrap();
        assert_eq!(estimate.unclamped_forcing_w_m2, 0.0);
        assert_eq!(estimate.forcing_w_m2, 0.0);
        assert!(!estimate.clamped);
        assert_eq!(estimate.uncertainty_w_m2, 0.0);
    }

    #[test]
    fn negative_residual_is_clamped_and_flagged() {
        let site = synthetic("urban-1", 0.001, 0.0, 1, 1);
        let rural = synthetic("rural-1", 0.002, 0.0, 1, 2);
        let estimate = stage().execute(partition(site, rural, "rural-1")).unwrap();
        assert!(estimate.clamped);
        assert_eq!(estimate.forcing_w_m2, 0.0);
        assert!(estimate.unclamped_forcing_w_m2 < 0.0);
    }

    #[test]
    fn too_few_bins_is_insufficient_coverage() {
        let site: Vec<Sample> = synthetic("urban-1", 0.001, 0.0, 1, 1)
            .into_iter()
            .take(5)
            .collect();
        let rural = synthetic("rural-1", 0.001, 0.0, 1, 2);
        match stage().execute(partition(site, rural, "rural-1")) {
            Err(PipelineError::InsufficientCoverage { bins, required, .. }) => {
                assert_eq!(bins, 5);
                assert_eq!(required, 8);
            }
            other => panic!("expected insufficient coverage, got {:?}", other),
        }
    }

    #[test]
    fn missing_baseline_omits_window() {
        let site = synthetic("urban-1", 0.001, 0.0, 1, 1);
        let result = stage().execute(partition(site, Vec::new(), "rural-1"));
        assert!(matches!(result, Err(PipelineError::MissingBaseline { .. })));
    }

    #[test]
    fn unknown_calibration_is_fatal_for_the_window() {
        let site = synthetic("urban-1", 0.001, 0.0, 1, 1);
        let rural = synthetic("rural-1", 0.001, 0.0, 1, 2);
        let mut input = partition(site, rural, "rural-1");
        input.calibration.clear();
        assert!(matches!(
            stage().execute(input),
            Err(PipelineError::CalibrationMissing { .. })
        ));
    }

    #[test]
    fn dropped_bin_leaves_flagged_gap() {
        let mut site = synthetic("urban-1", 0.002, 0.0, 1, 1);
        site.remove(10);
        let rural = synthetic("rural-1", 0.001, 0.0, 1, 2);
        let estimate = stage().execute(partition(site, rural, "rural-1")).unwrap();
        assert_eq!(estimate.coverage.missing.len(), 1);
        assert!(estimate.bins.iter().all(|b| !b.interpolated));
        assert_eq!(estimate.bins.len(), BINS - 1);
    }

    #[test]
    fn out_of_band_samples_are_not_counted() {
        let mut site = synthetic("urban-1", 0.002, 0.0, 2, 1);
        let mut stray = site[0].clone();
        stray.band = FrequencyBand::new(40.0e9, 41.0e9);
        site.push(stray);
        let rural = synthetic("rural-1", 0.001, 0.0, 1, 2);
        let estimate = stage().execute(partition(site, rural, "rural-1")).unwrap();
        assert_eq!(estimate.sample_count, 2 * BINS);
        assert!(estimate.notes.iter().any(|n| n.contains("1 samples outside")));
    }
}
