//! The ordered, append-only collection of recorded events.
//!
//! Records accumulate in per-document staging sub-logs while a session is
//! live, then merge into the persistent log in one sorted pass. The merged
//! log is the single durable artifact; it changes only by append, merge,
//! whole-target removal, or whole-target re-timing.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use overdub_proto::{DocumentId, EventRecord, encode_line};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::log_reader::{MalformedLine, parse_lines};
use crate::takes;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("failed to read event log {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write event log {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recorded events, merged plus per-document staging.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
    staging: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages one record under its target's sub-log.
    ///
    /// Timestamps are expected to be monotonic within a sub-log; a regression
    /// is logged and the record kept, since the merge sort repairs order.
    pub fn append(&mut self, record: EventRecord) {
        if let Some(previous) = self
            .staging
            .iter()
            .rev()
            .find(|staged| staged.target == record.target)
            && previous.timestamp > record.timestamp
        {
            debug!(
                target = %record.target,
                "timestamp regression in staging sub-log"
            );
        }
        self.staging.push(record);
    }

    /// Moves every staged record into the persistent log, then stably sorts
    /// the whole log by target document, then timestamp.
    pub fn merge_session(&mut self) {
        let staged = std::mem::take(&mut self.staging);
        let merged = staged.len();
        self.records.extend(staged);
        self.records.sort_by(log_order);
        if merged > 0 {
            info!(merged, total = self.records.len(), "session merged into log");
        }
    }

    /// Deletes every record (merged or staged) targeting `id`. Returns how
    /// many were dropped.
    pub fn remove_session(&mut self, id: &DocumentId) -> usize {
        let before = self.records.len() + self.staging.len();
        self.records.retain(|record| record.target != *id);
        self.staging.retain(|record| record.target != *id);
        let removed = before - self.records.len() - self.staging.len();
        info!(target = %id, removed, "session removed from log");
        removed
    }

    /// Adds `delta_seconds` to every merged record targeting `id`. Negative
    /// deltas saturate at zero rather than producing negative timestamps.
    /// Returns how many records were re-timed.
    pub fn shift_session(&mut self, id: &DocumentId, delta_seconds: f64) -> usize {
        if !delta_seconds.is_finite() {
            warn!(target = %id, delta_seconds, "ignoring non-finite timestamp shift");
            return 0;
        }
        let mut shifted = 0;
        let mut saturated = 0;
        for record in self.records.iter_mut().filter(|r| r.target == *id) {
            let moved = record.timestamp.as_secs_f64() + delta_seconds;
            record.timestamp = if moved <= 0.0 {
                if moved < 0.0 {
                    saturated += 1;
                }
                Duration::ZERO
            } else {
                Duration::try_from_secs_f64(moved).unwrap_or(record.timestamp)
            };
            shifted += 1;
        }
        if saturated > 0 {
            warn!(
                target = %id,
                saturated,
                "shift pushed timestamps below zero; clamped"
            );
        }
        shifted
    }

    /// Merged records, in (target, timestamp) order.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Merged records targeting one document, in log order.
    pub fn records_for<'a>(
        &'a self,
        id: &'a DocumentId,
    ) -> impl Iterator<Item = &'a EventRecord> {
        self.records.iter().filter(move |record| record.target == *id)
    }

    /// Distinct targets in the merged log, sorted.
    pub fn targets(&self) -> Vec<DocumentId> {
        let mut targets: Vec<DocumentId> =
            self.records.iter().map(|record| record.target.clone()).collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// True when any record, merged or staged, targets `id`.
    pub fn has_target(&self, id: &DocumentId) -> bool {
        self.records.iter().any(|record| record.target == *id)
            || self.staging.iter().any(|record| record.target == *id)
    }

    /// Picks the take name a new recording over `name` should target:
    /// `name` itself while unused, otherwise the first free successor
    /// (`name-Take2`, `name-Take3`, ...).
    pub fn derive_take(&self, name: &str) -> DocumentId {
        let id = DocumentId::from(name);
        if !self.has_target(&id) {
            return id;
        }
        let take = takes::free_take_name(name, |candidate| {
            self.has_target(&DocumentId::from(candidate))
        });
        debug!(original = name, take = %take, "derived take name for re-recording");
        DocumentId::from(take)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records staged but not yet merged.
    pub fn staged_len(&self) -> usize {
        self.staging.len()
    }

    /// Writes the merged log, one encoded record per line. Staged records
    /// are not persisted until merged.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LogError> {
        let path = path.as_ref();
        if !self.staging.is_empty() {
            debug!(
                staged = self.staging.len(),
                "saving log with unmerged staged records; they are not written"
            );
        }
        let mut buffer = String::new();
        for record in &self.records {
            buffer.push_str(&encode_line(record));
            buffer.push('\n');
        }
        fs::write(path, buffer).map_err(|source| LogError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), records = self.records.len(), "event log saved");
        Ok(())
    }

    /// Reads a persisted log. Malformed lines are skipped and reported
    /// alongside the log; an unreadable file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Vec<MalformedLine>), LogError> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| LogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let outcome = parse_lines(&input, 1);
        let mut log = Self {
            records: outcome.records,
            staging: Vec::new(),
        };
        // Files written by `save` are already ordered; foreign files get
        // normalized here. Stable, so ordered input is untouched.
        log.records.sort_by(log_order);
        debug!(
            path = %path.display(),
            records = log.records.len(),
            malformed = outcome.malformed.len(),
            "event log loaded"
        );
        Ok((log, outcome.malformed))
    }
}

fn log_order(a: &EventRecord, b: &EventRecord) -> Ordering {
    a.target
        .cmp(&b.target)
        .then_with(|| a.timestamp.cmp(&b.timestamp))
}
