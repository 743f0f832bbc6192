use anyhow::Context;
use forcingcore::config::AnalysisConfig;
use forcingcore::ingest::SourceSpec;
use forcingcore::model::{Site, SiteRegistry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventorySpec {
    pub path: PathBuf,
    #[serde(default = "default_resolution")]
    pub resolution_deg: f64,
}

fn default_resolution() -> f64 {
    0.1
}

fn default_experiment() -> String {
    "rf-forcing".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("report")
}

fn default_workers() -> usize {
    1
}

/// Everything one run needs: sites, input files and analysis settings.
/// Relative paths are taken relative to the YAML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_experiment")]
    pub experiment: String,
    pub sites: Vec<Site>,
    pub sources: Vec<SourceSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<InventorySpec>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let mut config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        if let Some(base) = path_ref.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path_ref = path.as_ref();
        let contents = serde_yaml::to_string(self).context("serializing workflow config")?;
        fs::write(path_ref, contents)
            .with_context(|| format!("writing workflow config {}", path_ref.display()))
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for source in &mut self.sources {
            resolve(&mut source.path);
        }
        if let Some(inventory) = &mut self.inventory {
            resolve(&mut inventory.path);
        }
        resolve(&mut self.output_dir);
    }

    /// Command-line overrides on top of the file.
    pub fn with_overrides(
        mut self,
        output_dir: Option<PathBuf>,
        workers: Option<usize>,
        strict: bool,
    ) -> Self {
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        if let Some(workers) = workers {
            self.workers = workers;
        }
        self.analysis.strict |= strict;
        self
    }

    pub fn to_registry(&self) -> anyhow::Result<SiteRegistry> {
        SiteRegistry::from_sites(self.sites.clone()).context("building site registry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forcingcore::ingest::SourceKind;
    use forcingcore::model::SiteCategory;
    use tempfile::tempdir;

    const WORKFLOW: &str = "\
experiment: madrid-pilot
sites:
  - id: urban-1
    latitude: 40.42
    longitude: -3.70
    category: urban
    instruments:
      - id: urban-1-sdr
        kind: spectrometer
        fractional_error: 0.05
  - id: rural-1
    latitude: 40.95
    longitude: -4.12
    category: rural
sources:
  - path: data/spectra.csv
    kind: spectrometer
inventory:
  path: data/inventory.csv
analysis:
  confidence_level: 0.9
  interval:
    method: bootstrap
    resamples: 500
    seed: 11
workers: 2
";

    #[test]
    fn config_load_reads_yaml_and_resolves_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflow.yaml");
        fs::write(&path, WORKFLOW).unwrap();

        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.experiment, "madrid-pilot");
        assert_eq!(cfg.sites.len(), 2);
        assert_eq!(cfg.sites[1].category, SiteCategory::Rural);
        assert_eq!(cfg.sources[0].kind, SourceKind::Spectrometer);
        assert_eq!(cfg.sources[0].path, dir.path().join("data/spectra.csv"));
        assert_eq!(cfg.output_dir, dir.path().join("report"));
        let inventory = cfg.inventory.as_ref().unwrap();
        assert_eq!(inventory.resolution_deg, 0.1);
        assert_eq!(cfg.analysis.confidence_level, 0.9);
        assert_eq!(cfg.analysis.min_frequency_bins, 8);
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.to_registry().unwrap().len(), 2);
    }

    #[test]
    fn overrides_take_precedence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflow.yaml");
        fs::write(&path, WORKFLOW).unwrap();
        let cfg = WorkflowConfig::load(&path)
            .unwrap()
            .with_overrides(Some(PathBuf::from("/tmp/out")), Some(8), true);
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(cfg.workers, 8);
        assert!(cfg.analysis.strict);
    }

    #[test]
    fn duplicate_sites_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workflow.yaml");
        fs::write(&path, WORKFLOW).unwrap();
        let mut cfg = WorkflowConfig::load(&path).unwrap();
        cfg.sites.push(cfg.sites[0].clone());
        assert!(cfg.to_registry().is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = WorkflowConfig::load("/nonexistent/workflow.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/workflow.yaml"));
    }
}
