pub mod engine;
pub mod state;

pub use engine::{local_hostname, CycleReport, Monitor};
pub use state::{Evaluation, Failure, HealthTracker, InvalidBitmap, StatusBitmap};
