use crate::config::AnalysisConfig;
use crate::model::TimeWindow;

/// Common error type for pipeline stages.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("validation error at record {index} ({source_label}): {reason}")]
    Validation {
        index: usize,
        source_label: String,
        reason: String,
    },
    #[error("insufficient coverage for {site} in {window}: {bins} bins, {required} required")]
    InsufficientCoverage {
        site: String,
        window: TimeWindow,
        bins: usize,
        required: usize,
    },
    #[error("calibration missing for instrument {instrument} at site {site}")]
    CalibrationMissing { site: String, instrument: String },
    #[error("no baseline samples for {site} in {window}")]
    MissingBaseline { site: String, window: TimeWindow },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("io error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for errors that only discard a record or window and let the run continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::CalibrationMissing { .. }
                | Self::InsufficientCoverage { .. }
                | Self::MissingBaseline { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Free-form notes a stage attaches to its output for the run log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageMetadata {
    pub notes: Vec<String>,
}

/// Lifecycle shared by the ingestion, estimation and evaluation stages.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn initialize(&mut self, config: &AnalysisConfig) -> PipelineResult<()>;
    fn execute(&mut self, input: Self::Input) -> PipelineResult<Self::Output>;
    fn cleanup(&mut self);
}
