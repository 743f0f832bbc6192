//! Records exchanged between the ingestion, estimation and evaluation stages.

pub mod estimate;
pub mod sample;
pub mod site;
pub mod verdict;

pub use estimate::{Coverage, ForcingEstimate, SpectralBin, TimeWindow};
pub use sample::{FrequencyBand, Measurement, Sample, StationRecord};
pub use site::{Instrument, InstrumentKind, Site, SiteCategory, SiteRegistry};
pub use verdict::{
    CategorySummary, Classification, Co2Comparison, ConfidenceInterval, HypothesisVerdict,
    Significance,
};
