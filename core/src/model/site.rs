use crate::config::AnalysisConfig;
use crate::prelude::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteCategory {
    Urban,
    Rural,
    Industrial,
}

impl fmt::Display for SiteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SiteCategory::Urban => "urban",
            SiteCategory::Rural => "rural",
            SiteCategory::Industrial => "industrial",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    Spectrometer,
    Radiometer,
    Station,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub kind: InstrumentKind,
    /// Fractional calibration error (0.05 = 5 %). Required for RF instruments.
    #[serde(default)]
    pub fractional_error: Option<f64>,
}

/// Fixed measurement location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: SiteCategory,
    #[serde(default)]
    pub instruments: Vec<Instrument>,
}

impl Site {
    pub fn instrument(&self, id: &str) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.id == id)
    }
}

/// Read-only set of sites known to a run, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<String, Site>,
}

impl SiteRegistry {
    pub fn from_sites(sites: Vec<Site>) -> PipelineResult<Self> {
        let mut map = BTreeMap::new();
        for site in sites {
            if !(-90.0..=90.0).contains(&site.latitude)
                || !(-180.0..=180.0).contains(&site.longitude)
            {
                return Err(PipelineError::InvalidConfig(format!(
                    "site {} has coordinates out of range",
                    site.id
                )));
            }
            for instrument in &site.instruments {
                if let Some(error) = instrument.fractional_error {
                    if !error.is_finite() || error < 0.0 {
                        return Err(PipelineError::InvalidConfig(format!(
                            "instrument {} at {} has invalid calibration error {}",
                            instrument.id, site.id, error
                        )));
                    }
                }
            }
            if map.contains_key(&site.id) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate site id {}",
                    site.id
                )));
            }
            map.insert(site.id.clone(), site);
        }
        Ok(Self { sites: map })
    }

    pub fn get(&self, id: &str) -> Option<&Site> {
        self.sites.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Site> {
        self.sites.values()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Configured baseline site, or the first rural site by id.
    pub fn baseline_site(&self, config: &AnalysisConfig) -> PipelineResult<&Site> {
        match config.baseline_site.as_deref() {
            Some(id) => self.get(id).ok_or_else(|| {
                PipelineError::InvalidConfig(format!("baseline site {} is not registered", id))
            }),
            None => self
                .iter()
                .find(|s| s.category == SiteCategory::Rural)
                .ok_or_else(|| {
                    PipelineError::InvalidConfig("no rural site available as baseline".into())
                }),
        }
    }

    /// Calibration errors of every instrument that declares one, keyed by instrument id.
    pub fn calibration_map(&self, site_id: &str) -> BTreeMap<String, f64> {
        self.get(site_id)
            .map(|site| {
                site.instruments
                    .iter()
                    .filter_map(|i| i.fractional_error.map(|e| (i.id.clone(), e)))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(id: &str, category: SiteCategory) -> Site {
        Site {
            id: id.to_string(),
            latitude: 40.4,
            longitude: -3.7,
            category,
            instruments: vec![Instrument {
                id: format!("{}-spec", id),
                kind: InstrumentKind::Spectrometer,
                fractional_error: Some(0.05),
            }],
        }
    }

    #[test]
    fn registry_rejects_duplicates() {
        let result = SiteRegistry::from_sites(vec![
            site("urban-1", SiteCategory::Urban),
            site("urban-1", SiteCategory::Urban),
        ]);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn baseline_defaults_to_first_rural_site() {
        let registry = SiteRegistry::from_sites(vec![
            site("urban-1", SiteCategory::Urban),
            site("rural-2", SiteCategory::Rural),
            site("rural-1", SiteCategory::Rural),
        ])
        .unwrap();
        let baseline = registry.baseline_site(&AnalysisConfig::default()).unwrap();
        assert_eq!(baseline.id, "rural-1");
    }

    #[test]
    fn calibration_map_lists_declared_errors() {
        let registry =
            SiteRegistry::from_sites(vec![site("urban-1", SiteCategory::Urban)]).unwrap();
        let map = registry.calibration_map("urban-1");
        assert_eq!(map.get("urban-1-spec"), Some(&0.05));
        assert!(registry.calibration_map("antenna-42").is_empty());
    }
}
