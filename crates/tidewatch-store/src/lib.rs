//! Durable store for the Tidewatch pipeline: an idempotent write path, a
//! deterministic read-unsent path, cursor advance, and bounded resource
//! usage over an embedded SQLite database.

mod error;
mod row;
mod schema;
mod store;

pub use error::{Result, StoreError};
pub use row::StoredSample;
pub use schema::CURRENT_SCHEMA_VERSION;
pub use store::{InsertOutcome, Store, StoreSizes};
