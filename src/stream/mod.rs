//! Stream module
//!
//! One [`StreamDefinition`] value per resource type, record [`Transform`]s,
//! and the generic per-instance sync algorithm.

mod definition;
mod sync;
mod transform;

pub use definition::{Incremental, IncrementalFilter, StreamDefinition};
pub use sync::{
    checkpoint, run_instance, InstanceOutcome, RunOptions, StreamInstance, StreamStatus,
    SyncContext,
};
pub use transform::{apply_all, Transform};
