//! Codec error types.

use thiserror::Error;

/// Errors produced while parsing wire-format log lines.
///
/// Parsing is per-line; one bad line yields one error and never poisons the
/// rest of the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The line did not split into the five expected fields.
    #[error("expected 5 fields, found {found}")]
    FieldCount { found: usize },

    /// The timestamp field was missing, negative, or not a number.
    #[error("invalid timestamp: {value:?}")]
    Timestamp { value: String },

    /// The position field was not a non-negative integer.
    #[error("invalid position: {value:?}")]
    Position { value: String },

    /// The length field was not a non-negative integer.
    #[error("invalid length: {value:?}")]
    Length { value: String },

    /// A backslash escape with nothing after it.
    #[error("escape sequence ends mid-field")]
    DanglingEscape,

    /// A backslash followed by a character outside the escape table.
    #[error("unknown escape sequence: \\{0}")]
    UnknownEscape(char),
}
