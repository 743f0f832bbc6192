//! Persisted output of an analysis run.
//!
//! Three files are written to the output directory: `report.json`,
//! `estimates.csv` and `summary.txt`. None of them carries wall-clock data,
//! so reruns over the same input are byte-identical.

use crate::config::AnalysisConfig;
use crate::model::{Co2Comparison, ForcingEstimate, FrequencyBand, HypothesisVerdict};
use crate::pipeline::Analysis;
use crate::prelude::{PipelineError, PipelineResult};
use crate::processing::{correlate, CorrelationSummary, InventoryAssessment};
use crate::telemetry::{LogManager, RunSummary};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_JSON: &str = "report.json";
pub const ESTIMATES_CSV: &str = "estimates.csv";
pub const SUMMARY_TXT: &str = "summary.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub experiment: String,
    pub constants_version: String,
    pub band: FrequencyBand,
    pub confidence_level: f64,
    pub baseline_site: String,
    pub estimates: Vec<ForcingEstimate>,
    pub verdict: HypothesisVerdict,
    /// Pooled mean forcing against the CO2 reference.
    pub co2: Co2Comparison,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventoryAssessment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationSummary>,
    pub summary: RunSummary,
}

#[derive(Debug, Serialize)]
struct EstimateRow<'a> {
    site_id: &'a str,
    category: String,
    window_start: String,
    window_end: String,
    forcing_w_m2: f64,
    unclamped_forcing_w_m2: f64,
    clamped: bool,
    gross_w_m2: f64,
    baseline_w_m2: f64,
    uncertainty_w_m2: f64,
    sample_count: usize,
    bins: usize,
    coverage_fraction: f64,
    missing_gaps: usize,
    interpolated_gaps: usize,
}

impl<'a> From<&'a ForcingEstimate> for EstimateRow<'a> {
    fn from(estimate: &'a ForcingEstimate) -> Self {
        Self {
            site_id: &estimate.site_id,
            category: estimate.category.to_string(),
            window_start: estimate.window.start.to_rfc3339(),
            window_end: estimate.window.end.to_rfc3339(),
            forcing_w_m2: estimate.forcing_w_m2,
            unclamped_forcing_w_m2: estimate.unclamped_forcing_w_m2,
            clamped: estimate.clamped,
            gross_w_m2: estimate.gross_w_m2,
            baseline_w_m2: estimate.baseline_w_m2,
            uncertainty_w_m2: estimate.uncertainty_w_m2,
            sample_count: estimate.sample_count,
            bins: estimate.bins.len(),
            coverage_fraction: estimate.coverage.fraction(),
            missing_gaps: estimate.coverage.missing.len(),
            interpolated_gaps: estimate.coverage.interpolated.len(),
        }
    }
}

impl AnalysisReport {
    pub fn new(
        experiment: impl Into<String>,
        config: &AnalysisConfig,
        analysis: Analysis,
        inventory: Option<InventoryAssessment>,
    ) -> Self {
        let correlation = correlate(&analysis.estimates, &analysis.stations, config.window_seconds);
        let co2 = Co2Comparison::new(
            analysis.verdict.pooled.mean_w_m2,
            config.constants.co2_reference_forcing_w_m2,
        );
        Self {
            experiment: experiment.into(),
            constants_version: config.constants.version.clone(),
            band: config.band,
            confidence_level: config.confidence_level,
            baseline_site: analysis.baseline_site,
            estimates: analysis.estimates,
            verdict: analysis.verdict,
            co2,
            inventory,
            correlation,
            summary: analysis.summary,
        }
    }

    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_csv(&self) -> PipelineResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for estimate in &self.estimates {
            writer.serialize(EstimateRow::from(estimate))?;
        }
        writer
            .into_inner()
            .map_err(|e| PipelineError::io("flushing estimates table", e.into_error()))
    }

    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let verdict = &self.verdict;
        let _ = writeln!(out, "Experiment: {}", self.experiment);
        let _ = writeln!(out, "Constants: {}", self.constants_version);
        let _ = writeln!(out, "Band: {}", self.band);
        let _ = writeln!(out, "Baseline site: {}", self.baseline_site);
        let _ = writeln!(
            out,
            "Estimates: {} windows ({} clamped, {} with coverage gaps)",
            self.estimates.len(),
            self.summary.estimates_clamped,
            self.summary.estimates_with_coverage_gaps
        );
        let _ = writeln!(
            out,
            "Skipped: {} records, {} windows",
            self.summary.records_skipped(),
            self.summary.windows_omitted()
        );
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Per-category forcing ({:.0}% interval):",
            verdict.confidence_level * 100.0
        );
        for summary in verdict.categories.iter().chain(std::iter::once(&verdict.pooled)) {
            let label = summary
                .category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "pooled".into());
            let interval = summary
                .interval
                .map(|ci| format!("[{:.6e}, {:.6e}]", ci.lower, ci.upper))
                .unwrap_or_else(|| "n/a".into());
            let _ = writeln!(
                out,
                "  {:<11} n={:<4} mean={:.6e} W/m2 interval={} -> {}",
                label, summary.n, summary.mean_w_m2, interval, summary.classification
            );
        }
        if !verdict.excluded_sites.is_empty() {
            let _ = writeln!(out, "  excluded: {}", verdict.excluded_sites.join(", "));
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "CO2 comparison: {:.6e} W/m2 is {:.4}% of {} W/m2",
            self.co2.forcing_w_m2,
            self.co2.ratio * 100.0,
            self.co2.reference_w_m2
        );
        if let Some(inventory) = &self.inventory {
            let _ = writeln!(
                out,
                "Inventory: {} transmitters, {:.1} W total, forcing {:.6e} W/m2 ({})",
                inventory.transmitters,
                inventory.total_power_w,
                inventory.forcing.forcing_w_m2,
                inventory.forcing.conclusion()
            );
        }
        if let Some(correlation) = &self.correlation {
            let _ = writeln!(
                out,
                "Temperature correlation: r={:.4} over {} windows, slope {:.4e} K per W/m2",
                correlation.correlation_coefficient,
                correlation.n_pairs,
                correlation.regression_slope_k_per_w_m2
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Conclusion: {}; {}",
            verdict.classification,
            self.co2.conclusion()
        );
        out
    }

    /// Writes all report files into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        let logger = LogManager::new("report");
        fs::create_dir_all(dir)
            .map_err(|e| PipelineError::io(format!("creating {}", dir.display()), e))?;

        let files = [
            (REPORT_JSON, self.to_json()?.into_bytes()),
            (ESTIMATES_CSV, self.to_csv()?),
            (SUMMARY_TXT, self.render_summary().into_bytes()),
        ];
        let mut written = Vec::with_capacity(files.len());
        for (name, contents) in files {
            let path = dir.join(name);
            fs::write(&path, contents)
                .map_err(|e| PipelineError::io(format!("writing {}", path.display()), e))?;
            written.push(path);
        }
        logger.record(&format!("report written to {}", dir.display()));
        Ok(written)
    }

    pub fn load(path: &Path) -> PipelineResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Coverage, SiteCategory, TimeWindow};
    use crate::processing::evaluate;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn estimate(site: &str, category: SiteCategory, hour: u32, forcing: f64) -> ForcingEstimate {
        let ts = Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap();
        ForcingEstimate {
            site_id: site.into(),
            category,
            window: TimeWindow::containing(ts, 3600),
            forcing_w_m2: forcing,
            unclamped_forcing_w_m2: forcing,
            clamped: false,
            gross_w_m2: forcing + 0.001,
            baseline_w_m2: 0.001,
            uncertainty_w_m2: forcing * 0.05,
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

    fn report() -> AnalysisReport {
        let config = AnalysisConfig::default();
        let estimates: Vec<ForcingEstimate> = (0..4)
            .flat_map(|h| {
                [
                    estimate("industrial-1", SiteCategory::Industrial, h, 0.02 + 0.0001 * h as f64),
                    estimate("urban-1", SiteCategory::Urban, h, 0.0005),
                ]
            })
            .collect();
        let verdict = evaluate(&estimates, &config, Some("rural-1"));
        let analysis = Analysis {
            estimates,
            verdict,
            stations: Vec::new(),
            baseline_site: "rural-1".into(),
            summary: RunSummary::default(),
        };
        AnalysisReport::new("unit", &config, analysis, None)
    }

    #[test]
    fn co2_comparison_uses_pooled_mean() {
        let report = report();
        assert!((report.co2.forcing_w_m2 - report.verdict.pooled.mean_w_m2).abs() < 1e-15);
        assert_eq!(report.co2.reference_w_m2, 2.7);
        assert!(report.correlation.is_none());
    }

    #[test]
    fn files_round_trip_and_are_stable() {
        let report = report();
        let dir = tempdir().unwrap();
        let written = report.write(dir.path()).unwrap();
        assert_eq!(written.len(), 3);

        let first: Vec<Vec<u8>> = written.iter().map(|p| fs::read(p).unwrap()).collect();
        report.write(dir.path()).unwrap();
        let second: Vec<Vec<u8>> = written.iter().map(|p| fs::read(p).unwrap()).collect();
        assert_eq!(first, second);

        let loaded = AnalysisReport::load(&dir.path().join(REPORT_JSON)).unwrap();
        assert_eq!(loaded.estimates.len(), report.estimates.len());
        assert_eq!(loaded.verdict.classification, report.verdict.classification);
        assert_eq!(loaded.baseline_site, "rural-1");
    }

    #[test]
    fn csv_has_one_row_per_estimate() {
        let report = report();
        let csv = String::from_utf8(report.to_csv().unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), report.estimates.len() + 1);
        assert!(lines[0].starts_with("site_id,category,window_start"));
        assert!(lines[1].starts_with("industrial-1,industrial,2024-06-01T00:00:00+00:00"));
    }

    #[test]
    fn summary_ends_with_conclusion() {
        let text = report().render_summary();
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("Conclusion: inconclusive"));
        assert!(!text.contains("excluded:"));
        assert!(text.contains("pooled"));
        assert!(text.contains("industrial"));
    }
}
