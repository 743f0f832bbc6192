use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use forcingcore::ingest::read_source;
use forcingcore::model::ForcingEstimate;
use forcingcore::processing::{assess, load_inventory, InventoryAssessment, WindowPartition};
use forcingcore::{AnalysisReport, Pipeline};
use log::info;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;

pub struct WorkflowResult {
    pub report: AnalysisReport,
    pub files: Vec<PathBuf>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Runs the pipeline end to end without touching the output directory.
    pub fn analyse(&self) -> anyhow::Result<AnalysisReport> {
        let registry = self.config.to_registry()?;
        let pipeline = Pipeline::new(self.config.analysis.clone(), registry)
            .context("configuring pipeline")?;

        let mut batches = Vec::with_capacity(self.config.sources.len());
        for source in &self.config.sources {
            let batch = read_source(source)
                .with_context(|| format!("reading source {}", source.path.display()))?;
            info!("read {} records from {}", batch.len(), batch.label);
            batches.push(batch);
        }

        let ingested = pipeline.ingest(batches).context("ingesting sources")?;
        let partitions = pipeline
            .partitions(&ingested)
            .context("partitioning samples")?;
        let estimates = if self.config.workers > 1 {
            estimate_parallel(&pipeline, partitions, self.config.workers)?
        } else {
            let mut estimates = Vec::with_capacity(partitions.len());
            for partition in partitions {
                if let Some(estimate) = pipeline.estimate(partition).context("estimating window")? {
                    estimates.push(estimate);
                }
            }
            estimates
        };
        let analysis = pipeline
            .conclude(estimates, ingested.stations)
            .context("evaluating hypothesis")?;

        let inventory = self.inventory(&pipeline)?;
        Ok(AnalysisReport::new(
            self.config.experiment.clone(),
            pipeline.config(),
            analysis,
            inventory,
        ))
    }

    fn inventory(&self, pipeline: &Pipeline) -> anyhow::Result<Option<InventoryAssessment>> {
        let Some(spec) = &self.config.inventory else {
            return Ok(None);
        };
        let transmitters = load_inventory(&spec.path)
            .with_context(|| format!("loading inventory {}", spec.path.display()))?;
        let assessment = assess(
            &transmitters,
            pipeline.registry(),
            spec.resolution_deg,
            &pipeline.config().constants,
        )
        .context("assessing transmitter inventory")?;
        Ok(Some(assessment))
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let report = self.analyse()?;
        let files = report
            .write(&self.config.output_dir)
            .with_context(|| format!("writing report to {}", self.config.output_dir.display()))?;
        Ok(WorkflowResult { report, files })
    }
}

/// Estimates partitions on a blocking pool and joins them in partition order.
fn estimate_parallel(
    pipeline: &Pipeline,
    partitions: Vec<WindowPartition>,
    workers: usize,
) -> anyhow::Result<Vec<ForcingEstimate>> {
    let runtime = TokioBuilder::new_multi_thread()
        .worker_threads(workers)
        .max_blocking_threads(workers)
        .build()
        .context("creating estimation runtime")?;

    runtime.block_on(async {
        let handles: Vec<_> = partitions
            .into_iter()
            .map(|partition| {
                let pipeline = pipeline.clone();
                tokio::task::spawn_blocking(move || pipeline.estimate(partition))
            })
            .collect();

        let mut estimates = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle.await.context("joining estimation task")?;
            if let Some(estimate) = outcome.context("estimating window")? {
                estimates.push(estimate);
            }
        }
        Ok::<_, anyhow::Error>(estimates)
    })
}
