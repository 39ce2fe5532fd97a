//! Partition routing module
//!
//! Supports: configured id lists and materialized parent records
//!
//! # Overview
//!
//! Partitions split a stream into one instance per parent:
//! - Top-level streams run once per configured group or project id
//! - Child streams run once per record their parent stream produced

mod routers;
mod types;

pub use routers::{extract_json_path, ListRouter, ParentRouter};
pub use types::{PartitionRouter, PartitionValue};

#[cfg(test)]
mod tests;
