pub mod correlation;
pub mod coverage;
pub mod forcing;
pub mod hypothesis;
pub mod inventory;
pub mod windowing;

pub use correlation::{correlate, CorrelationSummary};
pub use forcing::ForcingStage;
pub use hypothesis::{evaluate, HypothesisStage};
pub use inventory::{assess, load_inventory, InventoryAssessment, Transmitter};
pub use windowing::{partition, WindowPartition};
