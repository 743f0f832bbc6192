use crate::math::stats::StatsHelper;
use crate::model::{ForcingEstimate, StationRecord, TimeWindow};
use crate::telemetry::log::LogManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fewer paired windows than this yield no correlation.
pub const MIN_PAIRS: usize = 10;

/// Association between per-window forcing and co-located air temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSummary {
    pub n_pairs: usize,
    pub correlation_coefficient: f64,
    pub regression_slope_k_per_w_m2: f64,
    pub regression_intercept_k: f64,
    pub forcing_mean_w_m2: f64,
    pub forcing_std_w_m2: f64,
    pub temperature_mean_k: f64,
    pub temperature_std_k: f64,
}

pub fn correlate(
    estimates: &[ForcingEstimate],
    stations: &[StationRecord],
    window_seconds: i64,
) -> Option<CorrelationSummary> {
    let logger = LogManager::new("correlation");

    let mut temperatures: BTreeMap<(&str, TimeWindow), Vec<f64>> = BTreeMap::new();
    for record in stations {
        let window = TimeWindow::containing(record.timestamp, window_seconds);
        temperatures
            .entry((record.site_id.as_str(), window))
            .or_default()
            .push(record.temperature_k);
    }

    let (forcing, temperature): (Vec<f64>, Vec<f64>) = estimates
        .iter()
        .filter_map(|estimate| {
            temperatures
                .get(&(estimate.site_id.as_str(), estimate.window))
                .map(|values| (estimate.forcing_w_m2, StatsHelper::mean(values)))
        })
        .unzip();

    if forcing.len() < MIN_PAIRS {
        logger.skipped(&format!(
            "only {} forcing/temperature pairs, {} needed for correlation",
            forcing.len(),
            MIN_PAIRS
        ));
        return None;
    }

    let correlation = StatsHelper::pearson(&forcing, &temperature);
    let fit = StatsHelper::linear_fit(&forcing, &temperature);
    let (Some(r), Some((slope, intercept))) = (correlation, fit) else {
        logger.skipped("forcing or temperature series has no variance");
        return None;
    };
    logger.record(&format!("forcing/temperature r = {:.4} over {} pairs", r, forcing.len()));

    Some(CorrelationSummary {
        n_pairs: forcing.len(),
        correlation_coefficient: r,
        regression_slope_k_per_w_m2: slope,
        regression_intercept_k: intercept,
        forcing_mean_w_m2: StatsHelper::mean(&forcing),
        forcing_std_w_m2: StatsHelper::std_dev(&forcing),
        temperature_mean_k: StatsHelper::mean(&temperature),
        temperature_std_k: StatsHelper::std_dev(&temperature),
    })
}
