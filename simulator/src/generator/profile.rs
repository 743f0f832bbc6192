use crate::generator::template::{diurnal_factor, log_spaced_bands};
use crate::workflow::config::{InventorySpec, WorkflowConfig};
use anyhow::Context;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Timelike, Utc};
use forcingcore::config::AnalysisConfig;
use forcingcore::ingest::{BrightnessRow, PsdUnit, SourceKind, SourceSpec, SpectrumRow, StationRow};
use forcingcore::math::UnitConverter;
use forcingcore::model::{Instrument, InstrumentKind, Site, SiteCategory};
use forcingcore::processing::Transmitter;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SPECTRA_FILE: &str = "spectra.csv";
pub const BRIGHTNESS_FILE: &str = "brightness.csv";
pub const STATIONS_FILE: &str = "stations.csv";
pub const INVENTORY_FILE: &str = "inventory.csv";
pub const WORKFLOW_FILE: &str = "workflow.yaml";

const SERVICES: [(&str, f64); 4] = [
    ("GSM", 900.0e6),
    ("LTE", 1800.0e6),
    ("LTE", 2600.0e6),
    ("5G", 3500.0e6),
];

/// A synthetic site and the net forcing injected on top of the background.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub id: String,
    pub category: SiteCategory,
    pub latitude: f64,
    pub longitude: f64,
    pub forcing_w_m2: f64,
}

impl SiteProfile {
    fn new(id: &str, category: SiteCategory, latitude: f64, longitude: f64, forcing_w_m2: f64) -> Self {
        Self {
            id: id.to_string(),
            category,
            latitude,
            longitude,
            forcing_w_m2,
        }
    }
}

/// Configuration for generating a synthetic dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub windows: usize,
    pub bins: usize,
    pub readings_per_bin: usize,
    /// Half-width of the multiplicative uniform noise.
    pub noise: f64,
    /// Absorbed power every site sees, baseline included (W/m²).
    pub background_w_m2: f64,
    pub diurnal_amplitude: f64,
    pub start: DateTime<Utc>,
    pub window_seconds: i64,
    pub sites: Vec<SiteProfile>,
    /// Adds a radiometer brightness product over the same bins.
    pub brightness: bool,
    pub stations: bool,
    pub temperature_sensitivity_k_per_w_m2: f64,
    pub transmitters: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            windows: 12,
            bins: 20,
            readings_per_bin: 1,
            noise: 0.01,
            background_w_m2: 0.001,
            diurnal_amplitude: 0.0,
            start: Utc
                .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            window_seconds: 3600,
            sites: vec![
                SiteProfile::new("urban-1", SiteCategory::Urban, 40.42, -3.70, 0.0005),
                SiteProfile::new("rural-1", SiteCategory::Rural, 40.95, -4.12, 0.0),
                SiteProfile::new("industrial-1", SiteCategory::Industrial, 40.30, -3.45, 0.02),
            ],
            brightness: false,
            stations: true,
            temperature_sensitivity_k_per_w_m2: 50.0,
            transmitters: 25,
        }
    }
}

/// Files produced by one generator run.
#[derive(Debug, Clone)]
pub struct GeneratedDataset {
    pub workflow_path: PathBuf,
    pub files: Vec<PathBuf>,
    pub spectra_rows: usize,
}

fn instrument_id(site: &str, suffix: &str) -> String {
    format!("{}-{}", site, suffix)
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl GeneratorConfig {
    fn normalized_readings(&self) -> usize {
        self.readings_per_bin.max(1)
    }

    fn sites(&self) -> Vec<Site> {
        self.sites
            .iter()
            .map(|profile| {
                let mut instruments = vec![
                    Instrument {
                        id: instrument_id(&profile.id, "sdr"),
                        kind: InstrumentKind::Spectrometer,
                        fractional_error: Some(0.05),
                    },
                    Instrument {
                        id: instrument_id(&profile.id, "met"),
                        kind: InstrumentKind::Station,
                        fractional_error: None,
                    },
                ];
                if self.brightness {
                    instruments.push(Instrument {
                        id: instrument_id(&profile.id, "rad"),
                        kind: InstrumentKind::Radiometer,
                        fractional_error: Some(0.08),
                    });
                }
                Site {
                    id: profile.id.clone(),
                    latitude: profile.latitude,
                    longitude: profile.longitude,
                    category: profile.category,
                    instruments,
                }
            })
            .collect()
    }

    fn window_start(&self, window: usize) -> DateTime<Utc> {
        self.start + Duration::seconds(self.window_seconds * window as i64)
    }

    /// Absorbed power a site integrates to in a window, before noise.
    fn level(&self, profile: &SiteProfile, window: usize) -> f64 {
        let hour = self.window_start(window).hour() as f64;
        (self.background_w_m2 + profile.forcing_w_m2)
            * diurnal_factor(hour, self.diurnal_amplitude)
    }

    pub fn generate(&self, dir: &Path) -> anyhow::Result<GeneratedDataset> {
        if self.windows == 0 || self.bins == 0 {
            anyhow::bail!("generator needs at least one window and one bin");
        }
        if !(0.0..1.0).contains(&self.noise) {
            anyhow::bail!("noise {} must lie in [0, 1)", self.noise);
        }
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let analysis = AnalysisConfig {
            window_seconds: self.window_seconds,
            ..Default::default()
        };
        let absorption = &analysis.constants.absorption;
        let converter = UnitConverter::new(&analysis.constants);
        let bands = log_spaced_bands(&analysis.band, self.bins);
        let readings = self.normalized_readings();
        let step = self.window_seconds / (readings as i64 + 1);

        let jitter = |rng: &mut StdRng| {
            if self.noise > 0.0 {
                1.0 + rng.gen_range(-self.noise..self.noise)
            } else {
                1.0
            }
        };

        let mut spectra = csv::Writer::from_path(dir.join(SPECTRA_FILE))
            .with_context(|| format!("creating {}", SPECTRA_FILE))?;
        let mut brightness = if self.brightness {
            Some(
                csv::Writer::from_path(dir.join(BRIGHTNESS_FILE))
                    .with_context(|| format!("creating {}", BRIGHTNESS_FILE))?,
            )
        } else {
            None
        };
        let mut spectra_rows = 0;

        for window in 0..self.windows {
            let start = self.window_start(window);
            for profile in &self.sites {
                let level = self.level(profile, window);
                for band in &bands {
                    let fraction = absorption.fraction_at(band.center());
                    let psd = level / (self.bins as f64 * fraction * band.width());
                    for reading in 0..readings {
                        let ts = timestamp(start + Duration::seconds(step * (reading as i64 + 1)));
                        spectra.serialize(SpectrumRow {
                            timestamp: ts.clone(),
                            site_id: profile.id.clone(),
                            instrument_id: instrument_id(&profile.id, "sdr"),
                            freq_lower_hz: band.lower_hz,
                            freq_upper_hz: band.upper_hz,
                            psd: psd * jitter(&mut rng),
                            unit: PsdUnit::WM2Hz,
                        })?;
                        spectra_rows += 1;
                        if let Some(writer) = brightness.as_mut() {
                            let kelvin =
                                converter.psd_to_brightness(psd * jitter(&mut rng), band.center());
                            writer.serialize(BrightnessRow {
                                timestamp: ts,
                                site_id: profile.id.clone(),
                                instrument_id: instrument_id(&profile.id, "rad"),
                                freq_lower_hz: band.lower_hz,
                                freq_upper_hz: band.upper_hz,
                                brightness_k: kelvin,
                            })?;
                        }
                    }
                }
            }
        }
        spectra.flush().context("flushing spectra")?;
        if let Some(writer) = brightness.as_mut() {
            writer.flush().context("flushing brightness")?;
        }

        let mut files = vec![dir.join(SPECTRA_FILE)];
        let mut sources = vec![SourceSpec {
            path: PathBuf::from(SPECTRA_FILE),
            kind: SourceKind::Spectrometer,
            format: None,
        }];
        if self.brightness {
            files.push(dir.join(BRIGHTNESS_FILE));
            sources.push(SourceSpec {
                path: PathBuf::from(BRIGHTNESS_FILE),
                kind: SourceKind::Satellite,
                format: None,
            });
        }
        if self.stations {
            self.write_stations(&dir.join(STATIONS_FILE), &mut rng)?;
            files.push(dir.join(STATIONS_FILE));
            sources.push(SourceSpec {
                path: PathBuf::from(STATIONS_FILE),
                kind: SourceKind::Station,
                format: None,
            });
        }
        let inventory = if self.transmitters > 0 {
            self.write_inventory(&dir.join(INVENTORY_FILE), &mut rng)?;
            files.push(dir.join(INVENTORY_FILE));
            Some(InventorySpec {
                path: PathBuf::from(INVENTORY_FILE),
                resolution_deg: 0.1,
            })
        } else {
            None
        };

        let workflow = WorkflowConfig {
            experiment: format!("synthetic-seed-{}", self.seed),
            sites: self.sites(),
            sources,
            inventory,
            analysis,
            output_dir: PathBuf::from("report"),
            workers: 1,
        };
        let workflow_path = dir.join(WORKFLOW_FILE);
        workflow.save(&workflow_path)?;
        files.push(workflow_path.clone());

        Ok(GeneratedDataset {
            workflow_path,
            files,
            spectra_rows,
        })
    }

    /// One reading per site and window, warmed by the injected forcing.
    fn write_stations(&self, path: &Path, rng: &mut StdRng) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for window in 0..self.windows {
            let start = self.window_start(window);
            let ts = timestamp(start + Duration::seconds(self.window_seconds / 2));
            for profile in &self.sites {
                let net = self.level(profile, window) - self.background_w_m2;
                writer.serialize(StationRow {
                    timestamp: ts.clone(),
                    site_id: profile.id.clone(),
                    instrument_id: instrument_id(&profile.id, "met"),
                    temperature_k: 285.0
                        + self.temperature_sensitivity_k_per_w_m2 * net
                        + rng.gen_range(-0.1..0.1),
                    humidity_percent: rng.gen_range(40.0..70.0),
                })?;
            }
        }
        writer.flush().context("flushing stations")?;
        Ok(())
    }

    /// Transmitters scattered around the non-rural sites.
    fn write_inventory(&self, path: &Path, rng: &mut StdRng) -> anyhow::Result<()> {
        let anchors: Vec<&SiteProfile> = self
            .sites
            .iter()
            .filter(|s| s.category != SiteCategory::Rural)
            .collect();
        if anchors.is_empty() {
            anyhow::bail!("inventory needs at least one urban or industrial site");
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("creating {}", path.display()))?;
        for i in 0..self.transmitters {
            let anchor = anchors[i % anchors.len()];
            let (service, frequency_hz) = SERVICES[rng.gen_range(0..SERVICES.len())];
            writer.serialize(Transmitter {
                frequency_hz,
                power_w: rng.gen_range(100.0..2000.0),
                latitude: anchor.latitude + rng.gen_range(-0.05..0.05),
                longitude: anchor.longitude + rng.gen_range(-0.05..0.05),
                height_m: Some(rng.gen_range(15.0..45.0)),
                service: Some(service.to_string()),
            })?;
        }
        writer.flush().context("flushing inventory")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generator_writes_expected_row_count() {
        let dir = tempdir().unwrap();
        let config = GeneratorConfig {
            windows: 3,
            bins: 10,
            readings_per_bin: 2,
            ..Default::default()
        };
        let dataset = config.generate(dir.path()).unwrap();
        assert_eq!(dataset.spectra_rows, 3 * 3 * 10 * 2);

        let spectra = fs::read_to_string(dir.path().join(SPECTRA_FILE)).unwrap();
        assert_eq!(spectra.lines().count(), dataset.spectra_rows + 1);
        assert!(spectra.starts_with("timestamp,site_id,instrument_id,freq_lower_hz"));
        assert!(dir.path().join(STATIONS_FILE).exists());
        assert!(dir.path().join(INVENTORY_FILE).exists());
        assert!(!dir.path().join(BRIGHTNESS_FILE).exists());

        let workflow = WorkflowConfig::load(&dataset.workflow_path).unwrap();
        assert_eq!(workflow.sites.len(), 3);
        assert_eq!(workflow.sources.len(), 2);
        assert_eq!(workflow.sources[0].path, dir.path().join(SPECTRA_FILE));
    }

    #[test]
    fn same_seed_reproduces_dataset() {
        let (a, b, c) = (tempdir().unwrap(), tempdir().unwrap(), tempdir().unwrap());
        let config = GeneratorConfig {
            windows: 2,
            ..Default::default()
        };
        config.generate(a.path()).unwrap();
        config.generate(b.path()).unwrap();
        GeneratorConfig {
            seed: 8,
            ..config.clone()
        }
        .generate(c.path())
        .unwrap();

        let read = |dir: &Path| fs::read(dir.join(SPECTRA_FILE)).unwrap();
        assert_eq!(read(a.path()), read(b.path()));
        assert_ne!(read(a.path()), read(c.path()));
    }

    #[test]
    fn brightness_product_registers_radiometers() {
        let dir = tempdir().unwrap();
        let config = GeneratorConfig {
            windows: 1,
            brightness: true,
            ..Default::default()
        };
        let dataset = config.generate(dir.path()).unwrap();
        assert!(dir.path().join(BRIGHTNESS_FILE).exists());
        let workflow = WorkflowConfig::load(&dataset.workflow_path).unwrap();
        assert!(workflow.sites.iter().all(|s| s
            .instruments
            .iter()
            .any(|i| i.kind == InstrumentKind::Radiometer)));
    }

    #[test]
    fn invalid_noise_is_rejected() {
        let dir = tempdir().unwrap();
        let config = GeneratorConfig {
            noise: 1.5,
            ..Default::default()
        };
        assert!(config.generate(dir.path()).is_err());
    }
}
