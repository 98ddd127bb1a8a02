//! # overdub-proto
//!
//! Shared types and the wire codec for the Overdub session engine.
//!
//! This crate provides the foundational pieces used across all Overdub crates:
//! - `EventRecord` and its `Payload` variants, one per captured action
//! - `DocumentId` for naming documents and takes
//! - The flat line-oriented codec for the persisted event log
//! - Codec error types

mod codec;
mod error;
mod record;

pub use codec::{DELETE_SENTINEL, encode_line, parse_line};
pub use error::CodecError;
pub use record::{DocumentId, EventRecord, Payload};
