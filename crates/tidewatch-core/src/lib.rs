//! Shared data model for the Tidewatch collection pipeline.
//!
//! Every other crate in the workspace depends on this one for the
//! definition of a [`Sample`], its dedup identity, and the
//! [`MetricsSink`] seam used by self-observation (meta-metrics).

mod dedup;
pub mod meta;
mod sample;
mod tags;

pub use dedup::dedup_key;
pub use sample::{MetricValue, Sample};
pub use tags::Tags;

/// Sink that accepts freshly produced samples, shared by collectors and
/// the meta-metrics emitter so both ride the same durability path.
pub trait MetricsSink: Send + Sync {
    /// Accepts zero or more samples. Implementations should treat this as
    /// fire-and-forget from the producer's perspective; duplicates are the
    /// store's concern, not the sink's.
    fn emit(&self, samples: Vec<Sample>);
}
