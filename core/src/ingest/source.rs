//! Readers turning CSV or JSON-lines files into raw, unvalidated records.
//!
//! Row-level parse failures are kept alongside the row index so the ingest
//! stage can count and report them; only failures to open or read a file
//! abort.

use crate::prelude::{PipelineError, PipelineResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Unit of the `psd` column in spectrometer logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PsdUnit {
    #[default]
    WM2Hz,
    DbmM2Hz,
}

/// Ground RF spectrometer log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumRow {
    pub timestamp: String,
    pub site_id: String,
    pub instrument_id: String,
    pub freq_lower_hz: f64,
    pub freq_upper_hz: f64,
    pub psd: f64,
    #[serde(default)]
    pub unit: PsdUnit,
}

/// Satellite or radiometer brightness-temperature row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrightnessRow {
    pub timestamp: String,
    pub site_id: String,
    pub instrument_id: String,
    pub freq_lower_hz: f64,
    pub freq_upper_hz: f64,
    pub brightness_k: f64,
}

/// Meteorological station row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRow {
    pub timestamp: String,
    pub site_id: String,
    pub instrument_id: String,
    pub temperature_k: f64,
    pub humidity_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Spectrum(SpectrumRow),
    Brightness(BrightnessRow),
    Station(StationRow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Spectrometer,
    Satellite,
    Station,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    JsonLines,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// One input file declared in a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub path: PathBuf,
    pub kind: SourceKind,
    /// Inferred from the file extension when absent.
    #[serde(default)]
    pub format: Option<SourceFormat>,
}

/// A record, or the reason it could not be parsed, with its position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    pub index: usize,
    pub record: Result<RawRecord, String>,
}

/// All records read from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBatch {
    pub label: String,
    pub records: Vec<IndexedRecord>,
}

impl SourceBatch {
    pub fn from_records(label: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            label: label.into(),
            records: records
                .into_iter()
                .enumerate()
                .map(|(index, record)| IndexedRecord {
                    index,
                    record: Ok(record),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn read_source(spec: &SourceSpec) -> PipelineResult<SourceBatch> {
    let format = spec
        .format
        .or_else(|| SourceFormat::from_path(&spec.path))
        .ok_or_else(|| {
            PipelineError::InvalidInput(format!(
                "cannot infer format of {}",
                spec.path.display()
            ))
        })?;
    let label = spec.path.display().to_string();
    let records = match spec.kind {
        SourceKind::Spectrometer => read_rows(&spec.path, format, RawRecord::Spectrum)?,
        SourceKind::Satellite => read_rows(&spec.path, format, RawRecord::Brightness)?,
        SourceKind::Station => read_rows(&spec.path, format, RawRecord::Station)?,
    };
    Ok(SourceBatch { label, records })
}

fn read_rows<T, F>(path: &Path, format: SourceFormat, wrap: F) -> PipelineResult<Vec<IndexedRecord>>
where
    T: DeserializeOwned,
    F: Fn(T) -> RawRecord,
{
    match format {
        SourceFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(path)?;
            Ok(reader
                .deserialize::<T>()
                .enumerate()
                .map(|(index, row)| IndexedRecord {
                    index,
                    record: row.map(&wrap).map_err(|e| e.to_string()),
                })
                .collect())
        }
        SourceFormat::JsonLines => {
            let text = fs::read_to_string(path)
                .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
            Ok(text
                .lines()
                .enumerate()
                // blank lines are skipped but still count toward the line index
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(index, line)| IndexedRecord {
                    index,
                    record: serde_json::from_str::<T>(line)
                        .map(&wrap)
                        .map_err(|e| e.to_string()),
                })
                .collect())
        }
    }
}
