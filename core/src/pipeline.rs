//! One-pass batch pipeline: ingest, partition, estimate, evaluate.
//!
//! Each step is exposed on its own so a driver can fan the estimation step
//! out over partitions and reduce afterwards.

use crate::config::AnalysisConfig;
use crate::ingest::{IngestOutput, IngestStage, SourceBatch};
use crate::model::{ForcingEstimate, HypothesisVerdict, SiteRegistry, StationRecord};
use crate::prelude::{PipelineResult, ProcessingStage};
use crate::processing::{partition, ForcingStage, HypothesisStage, WindowPartition};
use crate::telemetry::{LogManager, RunCounters, RunSummary};
use std::sync::Arc;

/// Everything a run produces before it is written out.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub estimates: Vec<ForcingEstimate>,
    pub verdict: HypothesisVerdict,
    pub stations: Vec<StationRecord>,
    pub baseline_site: String,
    pub summary: RunSummary,
}

#[derive(Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
    registry: Arc<SiteRegistry>,
    counters: Arc<RunCounters>,
    baseline_site: String,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(config: AnalysisConfig, registry: SiteRegistry) -> PipelineResult<Self> {
        config.validate()?;
        let baseline_site = registry.baseline_site(&config)?.id.clone();
        Ok(Self {
            config,
            registry: Arc::new(registry),
            counters: Arc::new(RunCounters::new()),
            baseline_site,
            logger: LogManager::new("pipeline"),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn baseline_site(&self) -> &str {
        &self.baseline_site
    }

    pub fn summary(&self) -> RunSummary {
        self.counters.snapshot()
    }

    /// Starts a run: counters from any earlier run are cleared.
    pub fn ingest(&self, batches: Vec<SourceBatch>) -> PipelineResult<IngestOutput> {
        self.counters.reset();
        let mut stage = IngestStage::new(self.registry.clone(), self.counters.clone());
        stage.initialize(&self.config)?;
        let output = stage.execute(batches);
        stage.cleanup();
        output
    }

    pub fn partitions(&self, ingested: &IngestOutput) -> PipelineResult<Vec<WindowPartition>> {
        let partitions = partition(&ingested.samples, &self.registry, &self.config)?;
        self.logger.record(&format!(
            "{} samples split into {} site windows (baseline {})",
            ingested.samples.len(),
            partitions.len(),
            self.baseline_site
        ));
        Ok(partitions)
    }

    /// Estimates one partition. Recoverable failures omit the window and are
    /// counted; anything else is returned.
    pub fn estimate(&self, input: WindowPartition) -> PipelineResult<Option<ForcingEstimate>> {
        let mut stage = ForcingStage::new();
        stage.initialize(&self.config)?;
        let result = stage.execute(input);
        stage.cleanup();
        match result {
            Ok(estimate) => {
                self.counters
                    .record_estimate(estimate.clamped, !estimate.coverage.is_complete());
                Ok(Some(estimate))
            }
            Err(error) if error.is_recoverable() => {
                self.counters.record_error(&error);
                self.logger.skipped(&format!("window omitted: {}", error));
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    pub fn evaluate(&self, estimates: Vec<ForcingEstimate>) -> PipelineResult<HypothesisVerdict> {
        let mut stage = HypothesisStage::new(Some(self.baseline_site.clone()));
        stage.initialize(&self.config)?;
        let verdict = stage.execute(estimates);
        stage.cleanup();
        verdict
    }

    /// Sequential run over in-memory batches.
    pub fn run(&self, batches: Vec<SourceBatch>) -> PipelineResult<Analysis> {
        let ingested = self.ingest(batches)?;
        let mut estimates = Vec::new();
        for input in self.partitions(&ingested)? {
            if let Some(estimate) = self.estimate(input)? {
                estimates.push(estimate);
            }
        }
        self.conclude(estimates, ingested.stations)
    }

    /// Reduction barrier once every partition has been estimated.
    pub fn conclude(
        &self,
        estimates: Vec<ForcingEstimate>,
        stations: Vec<StationRecord>,
    ) -> PipelineResult<Analysis> {
        let verdict = self.evaluate(estimates.clone())?;
        let summary = self.summary();
        self.logger.record(&format!(
            "{} estimates, {} records skipped, {} windows omitted",
            summary.windows_estimated,
            summary.records_skipped(),
            summary.windows_omitted()
        ));
        Ok(Analysis {
            estimates,
            verdict,
            stations,
            baseline_site: self.baseline_site.clone(),
            summary,
        })
    }
}
