use crate::config::IntervalMethod;
use crate::model::site::SiteCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    SupportsNull,
    Inconclusive,
    SupportsAlternative,
}

impl Classification {
    /// Position on the null-to-alternative scale.
    pub fn rank(&self) -> u8 {
        match self {
            Classification::SupportsNull => 0,
            Classification::Inconclusive => 1,
            Classification::SupportsAlternative => 2,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Classification::SupportsNull => "supports_null",
            Classification::Inconclusive => "inconclusive",
            Classification::SupportsAlternative => "supports_alternative",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    /// `None` for the pooled summary across categories.
    pub category: Option<SiteCategory>,
    pub n: usize,
    pub mean_w_m2: f64,
    pub std_dev_w_m2: f64,
    pub interval: Option<ConfidenceInterval>,
    pub classification: Classification,
}

/// Final outcome of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisVerdict {
    pub categories: Vec<CategorySummary>,
    pub pooled: CategorySummary,
    pub classification: Classification,
    pub confidence_level: f64,
    /// Carries the bootstrap seed when one was used.
    pub method: IntervalMethod,
    pub excluded_sites: Vec<String>,
}

impl HypothesisVerdict {
    pub fn category(&self, category: SiteCategory) -> Option<&CategorySummary> {
        self.categories
            .iter()
            .find(|s| s.category == Some(category))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    VeryLow,
    Low,
    Moderate,
}

/// A forcing figure set against the anthropogenic CO2 reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Co2Comparison {
    pub forcing_w_m2: f64,
    pub reference_w_m2: f64,
    pub ratio: f64,
    pub significance: Significance,
}

impl Co2Comparison {
    pub fn new(forcing_w_m2: f64, reference_w_m2: f64) -> Self {
        let ratio = if reference_w_m2 > 0.0 {
            forcing_w_m2 / reference_w_m2
        } else {
            0.0
        };
        let significance = if ratio < 0.001 {
            Significance::VeryLow
        } else if ratio < 0.01 {
            Significance::Low
        } else {
            Significance::Moderate
        };
        Self {
            forcing_w_m2,
            reference_w_m2,
            ratio,
            significance,
        }
    }

    pub fn conclusion(&self) -> &'static str {
        match self.significance {
            Significance::VeryLow => "negligible impact (< 0.1% of the CO2 effect)",
            Significance::Low => "very small impact (< 1% of the CO2 effect)",
            Significance::Moderate => {
                "potentially significant impact (> 1% of the CO2 effect); further study required"
            }
        }
    }
}
