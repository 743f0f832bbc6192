use crate::config::AnalysisConfig;
use crate::model::{Sample, SiteCategory, SiteRegistry, TimeWindow};
use crate::prelude::{PipelineError, PipelineResult};
use std::collections::BTreeMap;

/// Everything the forcing estimator needs for one (site, window) pair.
#[derive(Debug, Clone)]
pub struct WindowPartition {
    pub site_id: String,
    pub category: SiteCategory,
    pub window: TimeWindow,
    pub samples: Vec<Sample>,
    pub calibration: BTreeMap<String, f64>,
    pub baseline_site_id: String,
    /// Baseline-site samples from the same window; empty when none were recorded.
    pub baseline: Vec<Sample>,
    pub baseline_calibration: BTreeMap<String, f64>,
}

impl WindowPartition {
    pub fn is_baseline(&self) -> bool {
        self.site_id == self.baseline_site_id
    }
}

/// Splits samples into epoch-aligned windows per site, ordered by (site, window).
pub fn partition(
    samples: &[Sample],
    registry: &SiteRegistry,
    config: &AnalysisConfig,
) -> PipelineResult<Vec<WindowPartition>> {
    let baseline_site = registry.baseline_site(config)?;
    let mut grouped: BTreeMap<(String, TimeWindow), Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        let window = TimeWindow::containing(sample.timestamp, config.window_seconds);
        grouped
            .entry((sample.site_id.clone(), window))
            .or_default()
            .push(sample.clone());
    }

    let baseline_calibration = registry.calibration_map(&baseline_site.id);
    let mut partitions = Vec::with_capacity(grouped.len());
    for ((site_id, window), site_samples) in &grouped {
        let site = registry.get(site_id).ok_or_else(|| {
            PipelineError::Internal(format!("sample for unregistered site {}", site_id))
        })?;
        let baseline = grouped
            .get(&(baseline_site.id.clone(), *window))
            .cloned()
            .unwrap_or_default();
        partitions.push(WindowPartition {
            site_id: site_id.clone(),
            category: site.category,
            window: *window,
            samples: site_samples.clone(),
            calibration: registry.calibration_map(site_id),
            baseline_site_id: baseline_site.id.clone(),
            baseline,
            baseline_calibration: baseline_calibration.clone(),
        });
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FrequencyBand, Instrument, InstrumentKind, Measurement, Site};
    use chrono::{TimeZone, Utc};

    fn site(id: &str, category: SiteCategory) -> Site {
        Site {
            id: id.into(),
            latitude: 0.0,
            longitude: 0.0,
            category,
            instruments: vec![Instrument {
                id: "sdr".into(),
                kind: InstrumentKind::Spectrometer,
                fractional_error: Some(0.05),
            }],
        }
    }

    fn sample(site_id: &str, category: SiteCategory, hour: u32) -> Sample {
        Sample {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, hour, 15, 0).unwrap(),
            site_id: site_id.into(),
            category,
            instrument_id: "sdr".into(),
            band: FrequencyBand::new(1.0e6, 2.0e6),
            measurement: Measurement::PowerSpectralDensity { w_m2_hz: 1.0e-12 },
            psd_w_m2_hz: 1.0e-12,
        }
    }

    #[test]
    fn partitions_attach_same_window_baseline() {
        let registry = SiteRegistry::from_sites(vec![
            site("urban-1", SiteCategory::Urban),
            site("rural-1", SiteCategory::Rural),
        ])
        .unwrap();
        let samples = vec![
            sample("urban-1", SiteCategory::Urban, 0),
            sample("urban-1", SiteCategory::Urban, 1),
            sample("rural-1", SiteCategory::Rural, 0),
        ];
        let partitions = partition(&samples, &registry, &AnalysisConfig::default()).unwrap();
        assert_eq!(partitions.len(), 3);

        let rural = &partitions[0];
        assert_eq!(rural.site_id, "rural-1");
        assert!(rural.is_baseline());

        let urban_first = &partitions[1];
        assert_eq!(urban_first.site_id, "urban-1");
        assert_eq!(urban_first.baseline.len(), 1);

        let urban_second = &partitions[2];
        assert!(urban_second.baseline.is_empty());
        assert!(urban_first.window < urban_second.window);
    }
}
