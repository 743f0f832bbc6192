//! Core pipeline for estimating radiative forcing from anthropogenic RF
//! emissions.
//!
//! Raw spectrometer, satellite and station records are validated and
//! normalised by the ingestion adapter, integrated into per-window forcing
//! estimates against a rural baseline, and reduced to a hypothesis verdict.

pub mod config;
pub mod ingest;
pub mod math;
pub mod model;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod report;
pub mod telemetry;

pub use config::{AnalysisConfig, IntervalMethod, PhysicalConstants, Thresholds};
pub use pipeline::{Analysis, Pipeline};
pub use prelude::{PipelineError, PipelineResult, ProcessingStage};
pub use report::AnalysisReport;
