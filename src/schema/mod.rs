//! Record schema module
//!
//! Provides the JSON-Schema subset used to describe stream records and the
//! shaping step applied to every record before emission.
//!
//! # Features
//!
//! - **Type Checking**: single or nullable (`["null", "string"]`) types
//! - **Drift Tolerance**: undeclared or mismatched fields are dropped, not errored
//! - **Date-Time Normalisation**: `date-time` strings become RFC 3339 UTC
//! - **Nested Object Support**: objects and arrays are shaped recursively
//! - **Field Selection**: deselected fields are removed, key properties kept

mod shaping;
mod types;

pub use shaping::{apply_field_selection, normalize_date_time, Shaped};
pub use types::{JsonType, JsonTypeOrArray, RecordSchema, SchemaProperty};
