mod aggregator;
mod server;
mod status;
mod thresholds;

pub use aggregator::{HealthAggregator, HealthReport};
pub use server::{build_router, serve};
pub use status::{ComponentReport, Status};
pub use thresholds::{evaluate_storage, evaluate_time, UploaderThresholds};
