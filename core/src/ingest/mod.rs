//! Ingestion adapter: validates raw records against the site registry and
//! converts every RF quantity to spectral flux density.

pub mod source;

pub use source::{
    read_source, BrightnessRow, IndexedRecord, PsdUnit, RawRecord, SourceBatch, SourceFormat,
    SourceKind, SourceSpec, SpectrumRow, StationRow,
};

use crate::config::AnalysisConfig;
use crate::math::units::UnitConverter;
use crate::model::{
    FrequencyBand, Instrument, InstrumentKind, Measurement, Sample, Site, SiteRegistry,
    StationRecord,
};
use crate::prelude::{PipelineError, PipelineResult, ProcessingStage, StageMetadata};
use crate::telemetry::{LogManager, RunCounters};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;

/// Validated, time-ordered output of ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestOutput {
    pub samples: Vec<Sample>,
    pub stations: Vec<StationRecord>,
    pub metadata: StageMetadata,
}

enum Accepted {
    Sample(Sample),
    Station(StationRecord),
}

pub struct IngestStage {
    registry: Arc<SiteRegistry>,
    counters: Arc<RunCounters>,
    config: Option<AnalysisConfig>,
    logger: LogManager,
}

impl IngestStage {
    pub fn new(registry: Arc<SiteRegistry>, counters: Arc<RunCounters>) -> Self {
        Self {
            registry,
            counters,
            config: None,
            logger: LogManager::new("ingest"),
        }
    }

    fn accept(
        &self,
        config: &AnalysisConfig,
        label: &str,
        entry: &IndexedRecord,
    ) -> PipelineResult<Accepted> {
        let invalid = |reason: String| PipelineError::Validation {
            index: entry.index,
            source_label: label.to_string(),
            reason,
        };
        let record = entry
            .record
            .as_ref()
            .map_err(|e| invalid(format!("malformed record: {}", e)))?;

        match record {
            RawRecord::Spectrum(row) => {
                let (site, instrument) = self.resolve(
                    &row.site_id,
                    &row.instrument_id,
                    InstrumentKind::Spectrometer,
                    &invalid,
                )?;
                let timestamp = parse_timestamp(&row.timestamp).map_err(&invalid)?;
                let band = checked_band(row.freq_lower_hz, row.freq_upper_hz).map_err(&invalid)?;
                if !row.psd.is_finite() {
                    return Err(invalid(format!("non-finite psd {}", row.psd)));
                }
                let psd_w_m2_hz = match row.unit {
                    PsdUnit::WM2Hz if row.psd < 0.0 => {
                        return Err(invalid(format!("negative psd {}", row.psd)))
                    }
                    PsdUnit::WM2Hz => row.psd,
                    PsdUnit::DbmM2Hz => UnitConverter::dbm_to_watts(row.psd),
                };
                require_calibration(site, instrument)?;
                Ok(Accepted::Sample(Sample {
                    timestamp,
                    site_id: site.id.clone(),
                    category: site.category,
                    instrument_id: instrument.id.clone(),
                    band,
                    measurement: Measurement::PowerSpectralDensity {
                        w_m2_hz: psd_w_m2_hz,
                    },
                    psd_w_m2_hz,
                }))
            }
            RawRecord::Brightness(row) => {
                let (site, instrument) = self.resolve(
                    &row.site_id,
                    &row.instrument_id,
                    InstrumentKind::Radiometer,
                    &invalid,
                )?;
                let timestamp = parse_timestamp(&row.timestamp).map_err(&invalid)?;
                let band = checked_band(row.freq_lower_hz, row.freq_upper_hz).map_err(&invalid)?;
                if !row.brightness_k.is_finite() || row.brightness_k < 0.0 {
                    return Err(invalid(format!(
                        "brightness temperature {} K is not physical",
                        row.brightness_k
                    )));
                }
                require_calibration(site, instrument)?;
                let psd_w_m2_hz = UnitConverter::new(&config.constants)
                    .brightness_to_psd(row.brightness_k, band.center());
                Ok(Accepted::Sample(Sample {
                    timestamp,
                    site_id: site.id.clone(),
                    category: site.category,
                    instrument_id: instrument.id.clone(),
                    band,
                    measurement: Measurement::BrightnessTemperature {
                        kelvin: row.brightness_k,
                    },
                    psd_w_m2_hz,
                }))
            }
            RawRecord::Station(row) => {
                let (site, instrument) = self.resolve(
                    &row.site_id,
                    &row.instrument_id,
                    InstrumentKind::Station,
                    &invalid,
                )?;
                let timestamp = parse_timestamp(&row.timestamp).map_err(&invalid)?;
                if !row.temperature_k.is_finite() || row.temperature_k <= 0.0 {
                    return Err(invalid(format!(
                        "temperature {} K is not physical",
                        row.temperature_k
                    )));
                }
                if !(0.0..=100.0).contains(&row.humidity_percent) {
                    return Err(invalid(format!(
                        "humidity {} % outside [0, 100]",
                        row.humidity_percent
                    )));
                }
                Ok(Accepted::Station(StationRecord {
                    timestamp,
                    site_id: site.id.clone(),
                    instrument_id: instrument.id.clone(),
                    temperature_k: row.temperature_k,
                    humidity_percent: row.humidity_percent,
                }))
            }
        }
    }

    fn resolve<'r>(
        &'r self,
        site_id: &str,
        instrument_id: &str,
        kind: InstrumentKind,
        invalid: &dyn Fn(String) -> PipelineError,
    ) -> PipelineResult<(&'r Site, &'r Instrument)> {
        let site = self
            .registry
            .get(site_id)
            .ok_or_else(|| invalid(format!("unknown site {}", site_id)))?;
        let instrument = site.instrument(instrument_id).ok_or_else(|| {
            invalid(format!(
                "instrument {} is not registered at site {}",
                instrument_id, site_id
            ))
        })?;
        if instrument.kind != kind {
            return Err(invalid(format!(
                "instrument {} is a {:?}, expected {:?}",
                instrument_id, instrument.kind, kind
            )));
        }
        Ok((site, instrument))
    }
}

impl ProcessingStage for IngestStage {
    type Input = Vec<SourceBatch>;
    type Output = IngestOutput;

    fn initialize(&mut self, config: &AnalysisConfig) -> PipelineResult<()> {
        config.validate()?;
        if self.registry.is_empty() {
            return Err(PipelineError::InvalidConfig("site registry is empty".into()));
        }
        self.config = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, input: Self::Input) -> PipelineResult<Self::Output> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| PipelineError::Internal("stage not initialized".into()))?;

        let mut output = IngestOutput::default();
        let mut converted = 0usize;
        for batch in &input {
            self.counters.record_read(batch.len());
            for entry in &batch.records {
                match self.accept(config, &batch.label, entry) {
                    Ok(Accepted::Sample(sample)) => {
                        if matches!(sample.measurement, Measurement::BrightnessTemperature { .. }) {
                            converted += 1;
                        }
                        self.counters.record_sample();
                        output.samples.push(sample);
                    }
                    Ok(Accepted::Station(record)) => {
                        self.counters.record_station();
                        output.stations.push(record);
                    }
                    Err(error) => {
                        self.counters.record_error(&error);
                        self.logger.skipped(&error.to_string());
                        if config.strict {
                            return Err(error);
                        }
                    }
                }
            }
        }

        output.samples.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.site_id.cmp(&b.site_id))
                .then_with(|| a.instrument_id.cmp(&b.instrument_id))
                .then_with(|| a.band.lower_hz.total_cmp(&b.band.lower_hz))
                .then_with(|| a.band.upper_hz.total_cmp(&b.band.upper_hz))
        });
        output.stations.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.site_id.cmp(&b.site_id))
                .then_with(|| a.instrument_id.cmp(&b.instrument_id))
        });

        let summary = format!(
            "accepted {} samples ({} from brightness temperature) and {} station records",
            output.samples.len(),
            converted,
            output.stations.len()
        );
        self.logger.record(&summary);
        output.metadata.notes.push(summary);
        Ok(output)
    }

    fn cleanup(&mut self) {
        self.config = None;
    }
}

fn require_calibration(site: &Site, instrument: &Instrument) -> PipelineResult<()> {
    match instrument.fractional_error {
        Some(_) => Ok(()),
        None => Err(PipelineError::CalibrationMissing {
            site: site.id.clone(),
            instrument: instrument.id.clone(),
        }),
    }
}

fn checked_band(lower_hz: f64, upper_hz: f64) -> Result<FrequencyBand, String> {
    let band = FrequencyBand::new(lower_hz, upper_hz);
    if band.is_valid() {
        Ok(band)
    } else {
        Err(format!("invalid frequency band {}", band))
    }
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| format!("malformed timestamp {:?}", raw))
}
