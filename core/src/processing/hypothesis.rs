use crate::config::{AnalysisConfig, IntervalMethod};
use crate::math::stats::StatsHelper;
use crate::model::{
    CategorySummary, Classification, ConfidenceInterval, ForcingEstimate, HypothesisVerdict,
    SiteCategory,
};
use crate::prelude::{PipelineError, PipelineResult, ProcessingStage};
use crate::telemetry::log::LogManager;
use std::collections::BTreeMap;

/// Pure reduction of the estimate series to a verdict. Estimates from
/// `baseline_site` are left out unless the configuration includes them.
pub fn evaluate(
    estimates: &[ForcingEstimate],
    config: &AnalysisConfig,
    baseline_site: Option<&str>,
) -> HypothesisVerdict {
    let excluded = |estimate: &ForcingEstimate| {
        !config.include_baseline_site && Some(estimate.site_id.as_str()) == baseline_site
    };

    let mut by_category: BTreeMap<SiteCategory, Vec<f64>> = BTreeMap::new();
    let mut pooled = Vec::new();
    let mut excluded_sites = Vec::new();
    for estimate in estimates {
        if excluded(estimate) {
            if !excluded_sites.contains(&estimate.site_id) {
                excluded_sites.push(estimate.site_id.clone());
            }
            continue;
        }
        by_category
            .entry(estimate.category)
            .or_default()
            .push(estimate.forcing_w_m2);
        pooled.push(estimate.forcing_w_m2);
    }
    excluded_sites.sort();

    let categories: Vec<CategorySummary> = by_category
        .iter()
        .map(|(category, values)| summarize(Some(*category), values, config))
        .collect();
    let classification = combine(&categories);

    HypothesisVerdict {
        pooled: summarize(None, &pooled, config),
        categories,
        classification,
        confidence_level: config.confidence_level,
        method: config.interval.clone(),
        excluded_sites,
    }
}

/// Mean, spread and interval of one group of estimates.
pub fn summarize(
    category: Option<SiteCategory>,
    values: &[f64],
    config: &AnalysisConfig,
) -> CategorySummary {
    let level = config.confidence_level;
    let bounds = match config.interval {
        IntervalMethod::StudentT => StatsHelper::student_t_interval(values, level),
        IntervalMethod::Bootstrap { resamples, seed } => {
            StatsHelper::bootstrap_interval(values, level, resamples, seed)
        }
    };
    let interval = bounds.map(|(lower, upper)| ConfidenceInterval {
        lower,
        upper,
        level,
    });
    CategorySummary {
        category,
        n: values.len(),
        mean_w_m2: StatsHelper::mean(values),
        std_dev_w_m2: StatsHelper::std_dev(values),
        classification: classify(interval.as_ref(), config),
        interval,
    }
}

pub fn classify(interval: Option<&ConfidenceInterval>, config: &AnalysisConfig) -> Classification {
    match interval {
        Some(ci) if ci.upper < config.thresholds.null_upper_w_m2 => Classification::SupportsNull,
        Some(ci) if ci.lower > config.thresholds.alternative_lower_w_m2 => {
            Classification::SupportsAlternative
        }
        _ => Classification::Inconclusive,
    }
}

/// Unanimous category classification, otherwise inconclusive.
fn combine(categories: &[CategorySummary]) -> Classification {
    let mut classes = categories.iter().map(|c| c.classification);
    match classes.next() {
        Some(first) if classes.all(|c| c == first) => first,
        _ => Classification::Inconclusive,
    }
}

/// Hypothesis evaluator stage over the complete estimate series.
pub struct HypothesisStage {
    baseline_site: Option<String>,
    config: Option<AnalysisConfig>,
    logger: LogManager,
}

impl HypothesisStage {
    pub fn new(baseline_site: Option<String>) -> Self {
        Self {
            baseline_site,
            config: None,
            logger: LogManager::new("hypothesis"),
        }
    }
}

impl ProcessingStage for HypothesisStage {
    type Input = Vec<ForcingEstimate>;
    type Output = HypothesisVerdict;

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

        let verdict = evaluate(&input, config, self.baseline_site.as_deref());
        for summary in &verdict.categories {
            if let Some(category) = summary.category {
                self.logger.record(&format!(
                    "{} n={} mean={:.6e} W/m2 -> {}",
                    category, summary.n, summary.mean_w_m2, summary.classification
                ));
            }
        }
        self.logger
            .record(&format!("verdict {}", verdict.classification));
        Ok(verdict)
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coverage, FrequencyBand, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn estimate(site: &str, category: SiteCategory, hour: u32, forcing: f64) -> ForcingEstimate {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        ForcingEstimate {
            site_id: site.into(),
            category,
            window: TimeWindow::containing(ts, 3600),
            forcing_w_m2: forcing,
            unclamped_forcing_w_m2: forcing,
            clamped: false,
            gross_w_m2: forcing,
            baseline_w_m2: 0.0,
            uncertainty_w_m2: 0.0,
            sample_count: 20,
            bins: Vec::new(),
            coverage: Coverage {
                band: FrequencyBand::ANALYSIS,
                covered_hz: FrequencyBand::ANALYSIS.width(),
                missing: Vec::new(),
                interpolated: Vec::new(),
            },
            notes: Vec::new(),
        }
    }

    fn series(site: &str, category: SiteCategory, level: f64) -> Vec<ForcingEstimate> {
        (0..5)
            .map(|h| estimate(site, category, h, level * (1.0 + 0.01 * h as f64)))
            .collect()
    }

    #[test]
    fn mixed_categories_are_inconclusive() {
        let mut estimates = series("urban-1", SiteCategory::Urban, 0.0005);
        estimates.extend(series("industrial-1", SiteCategory::Industrial, 0.02));
        estimates.extend(series("rural-1", SiteCategory::Rural, 0.0));
        let verdict = evaluate(&estimates, &AnalysisConfig::default(), Some("rural-1"));

        assert_eq!(verdict.classification, Classification::Inconclusive);
        assert_eq!(verdict.excluded_sites, vec!["rural-1".to_string()]);
        assert_eq!(
            verdict.category(SiteCategory::Urban).unwrap().classification,
            Classification::SupportsNull
        );
        assert_eq!(
            verdict.category(SiteCategory::Industrial).unwrap().classification,
            Classification::SupportsAlternative
        );
        assert!(verdict.category(SiteCategory::Rural).is_none());
    }

    #[test]
    fn unanimous_alternative_is_reported() {
        let estimates = series("industrial-1", SiteCategory::Industrial, 0.05);
        let verdict = evaluate(&estimates, &AnalysisConfig::default(), None);
        assert_eq!(verdict.classification, Classification::SupportsAlternative);
        assert_eq!(verdict.pooled.n, 5);
    }

    #[test]
    fn single_estimate_has_no_interval() {
        let estimates = vec![estimate("urban-1", SiteCategory::Urban, 0, 0.0001)];
        let verdict = evaluate(&estimates, &AnalysisConfig::default(), None);
        let urban = verdict.category(SiteCategory::Urban).unwrap();
        assert!(urban.interval.is_none());
        assert_eq!(urban.classification, Classification::Inconclusive);
    }

    #[test]
    fn empty_series_is_inconclusive() {
        let verdict = evaluate(&[], &AnalysisConfig::default(), None);
        assert_eq!(verdict.classification, Classification::Inconclusive);
        assert!(verdict.categories.is_empty());
    }

    #[test]
    fn positive_offset_never_moves_toward_null() {
        let config = AnalysisConfig::default();
        let mut base = series("urban-1", SiteCategory::Urban, 0.0004);
        base.extend(series("industrial-1", SiteCategory::Industrial, 0.006));
        base.extend(series("rural-2", SiteCategory::Rural, 0.03));
        let before = evaluate(&base, &config, None);

        for offset in [0.0001, 0.002, 0.01, 0.5] {
            let shifted: Vec<ForcingEstimate> = base
                .iter()
                .cloned()
                .map(|mut e| {
                    e.forcing_w_m2 += offset;
                    e
                })
                .collect();
            let after = evaluate(&shifted, &config, None);
            for (b, a) in before.categories.iter().zip(&after.categories) {
                assert!(a.classification.rank() >= b.classification.rank());
            }
            if before.classification == Classification::SupportsAlternative {
                assert_eq!(after.classification, Classification::SupportsAlternative);
            }
        }
    }

    #[test]
    fn bootstrap_verdict_is_reproducible() {
        let config = AnalysisConfig {
            interval: IntervalMethod::Bootstrap {
                resamples: 1000,
                seed: 2024,
            },
            ..Default::default()
        };
        let estimates = series("industrial-1", SiteCategory::Industrial, 0.02);
        let first = evaluate(&estimates, &config, None);
        assert_eq!(first, evaluate(&estimates, &config, None));
        assert_eq!(
            first.method,
            IntervalMethod::Bootstrap {
                resamples: 1000,
                seed: 2024
            }
        );
    }

    #[test]
    fn stage_requires_initialization() {
        let mut stage = HypothesisStage::new(None);
        assert!(matches!(
            stage.execute(Vec::new()),
            Err(PipelineError::Internal(_))
        ));
        stage.initialize(&AnalysisConfig::default()).unwrap();
        assert!(stage.execute(Vec::new()).is_ok());
        stage.cleanup();
    }
}
