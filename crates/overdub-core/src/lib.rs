//! Recording and replay engine for live text-editing sessions.
//!
//! A [`SessionRecorder`] turns live document mutations into timestamped
//! records in an [`EventLog`]. A [`Performance`] replays that log into
//! documents served by a [`DocumentHost`], translating every recorded
//! position through a per-document [`OffsetTracker`] so replayed content
//! lands correctly even while the user keeps editing the same documents.

mod config;
mod document;
mod eval;
mod event_log;
mod log_reader;
mod offset_tracker;
mod performance;
mod session_recorder;
mod takes;

pub mod testing;

pub use config::{ConfigError, OverdubConfig};
pub use document::{Document, DocumentHost, MemoryHost, TextDocument};
pub use eval::{CapturingSink, DiscardSink, EvalError, EvalSink};
pub use event_log::{EventLog, LogError};
pub use log_reader::{LogReader, MalformedLine, ParseOutcome};
pub use offset_tracker::OffsetTracker;
pub use performance::{
    AppliedAction, Performance, PlaybackError, PlaybackState, PlaybackSummary, PlayerCommand,
    PlayerConfig,
};
pub use session_recorder::{Mutation, MutationFilter, SessionClock, SessionRecorder};
pub use takes::{free_take_name, next_take_name};
