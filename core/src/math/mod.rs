pub mod spectral;
pub mod stats;
pub mod units;

pub use spectral::SpectralHelper;
pub use stats::StatsHelper;
pub use units::UnitConverter;
