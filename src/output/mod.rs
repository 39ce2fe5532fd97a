//! Output module
//!
//! Handles the message stream written for downstream consumers.
//!
//! # Overview
//!
//! This module provides:
//! - Singer-style `SCHEMA`, `RECORD` and `STATE` messages
//! - The [`Emitter`] sink trait used by the sync engine
//! - A JSON-lines emitter for stdout and an in-memory emitter

mod emitter;
mod messages;

pub use emitter::{Emitter, JsonLinesEmitter, MemoryEmitter};
pub use messages::Message;

#[cfg(test)]
mod tests;
