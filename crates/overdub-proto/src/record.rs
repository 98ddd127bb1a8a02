//! Event records captured during a recording session.
//!
//! A record is one timestamped action against one document: inserted text, a
//! deletion, an out-of-band evaluation, or a mode declaration. Timestamps are
//! elapsed time since the session began, with sub-second precision, so a log
//! replays with the same relative spacing it was performed with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Name of the document (or take) a record targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document id from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DocumentId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// The action a record captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Raw text inserted at the record's position.
    Text(String),

    /// Removal of `length` characters at the record's position.
    /// Carries no text; the length lives on the record.
    Delete,

    /// Out-of-band action dispatched through the evaluation sink at playback
    /// time. Not a text edit.
    Eval {
        procedure: String,
        arguments: String,
    },

    /// Declares the editing mode the target document needs before further
    /// events apply.
    Mode(String),
}

impl Payload {
    /// Returns true for the variants that mutate document text.
    pub fn is_edit(&self) -> bool {
        matches!(self, Payload::Text(_) | Payload::Delete)
    }
}

/// One timestamped action against one document.
///
/// Positions are offsets into the document *as recorded*: the log stores raw,
/// unreconciled coordinates, and playback translates them through the target
/// document's offset tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Elapsed time since the recording session began.
    pub timestamp: Duration,

    /// What happened.
    pub payload: Payload,

    /// Character offset at record time, unadjusted for later drift.
    pub position: usize,

    /// Characters removed for deletions; length of the replaced span for
    /// text; zero otherwise.
    pub length: usize,

    /// Document this record belongs to.
    pub target: DocumentId,
}

impl EventRecord {
    /// Creates a record from its parts.
    pub fn new(
        timestamp: Duration,
        payload: Payload,
        position: usize,
        length: usize,
        target: impl Into<DocumentId>,
    ) -> Self {
        Self {
            timestamp,
            payload,
            position,
            length,
            target: target.into(),
        }
    }
}
