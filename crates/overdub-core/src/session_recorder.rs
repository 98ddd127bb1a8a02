//! Turns live document activity into timestamped event records.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use overdub_proto::{DocumentId, EventRecord, Payload};
use tracing::{debug, info};

use crate::document::Document;
use crate::event_log::EventLog;

/// One observed document change, as presented to the assistive-feature
/// filter.
#[derive(Debug)]
pub struct Mutation<'a> {
    pub document: &'a DocumentId,
    pub begin: usize,
    pub end: usize,
    pub old_length: usize,
    pub text: &'a str,
}

/// Host-supplied predicate deciding whether a change is worth recording.
///
/// Editors produce transient churn (completion overlays, automatic pairing)
/// that is not part of the take. What counts as churn is host-specific, so
/// the host injects the judgement.
pub type MutationFilter = Box<dyn Fn(&Mutation<'_>) -> bool + Send>;

/// Elapsed-time source for one recording session.
///
/// Every document recorded in a session shares one clock, so cross-document
/// timing stays relatively ordered. Pausing freezes elapsed time; resuming
/// shifts the session start forward by the paused duration, keeping
/// post-pause timestamps continuous with pre-pause ones.
#[derive(Debug, Clone)]
pub struct SessionClock {
    start: Instant,
    paused_at: Option<Instant>,
}

impl SessionClock {
    /// Starts counting now.
    pub fn start_now() -> Self {
        Self {
            start: Instant::now(),
            paused_at: None,
        }
    }

    /// Starts counting from an explicit instant.
    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            paused_at: None,
        }
    }

    /// Elapsed recording time; frozen while paused.
    pub fn elapsed(&self) -> Duration {
        match self.paused_at {
            Some(instant) => instant.duration_since(self.start),
            None => self.start.elapsed(),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause(&mut self) {
        if self.paused_at.is_some() {
            debug!("pause ignored; session clock already paused");
            return;
        }
        self.paused_at = Some(Instant::now());
    }

    pub fn resume(&mut self) {
        let Some(paused_at) = self.paused_at.take() else {
            debug!("resume ignored; session clock not paused");
            return;
        };
        self.start += paused_at.elapsed();
    }
}

/// Observes live mutations and evaluation commands, timestamps them, and
/// appends event records to the log's staging area.
pub struct SessionRecorder {
    clock: SessionClock,
    filter: MutationFilter,
    declared_modes: BTreeMap<DocumentId, String>,
    targets: BTreeMap<DocumentId, DocumentId>,
}

impl SessionRecorder {
    /// Starts a recording session now, accepting every mutation.
    pub fn new() -> Self {
        Self::with_clock(SessionClock::start_now())
    }

    /// Starts a session against an explicit clock.
    pub fn with_clock(clock: SessionClock) -> Self {
        Self {
            clock,
            filter: Box::new(|_| true),
            declared_modes: BTreeMap::new(),
            targets: BTreeMap::new(),
        }
    }

    /// Binds a document to this session and returns the take name its
    /// records will target.
    ///
    /// Recording over a name that already has events in the log targets a
    /// fresh take (`Foo` stays `Foo` the first time, then `Foo-Take2`, ...),
    /// so the prior recording survives. The document itself keeps its name;
    /// only the records are re-targeted. Unbound documents record under
    /// their own id.
    pub fn attach(&mut self, log: &EventLog, doc: &dyn Document) -> DocumentId {
        if let Some(existing) = self.targets.get(doc.id()) {
            return existing.clone();
        }
        let target = log.derive_take(doc.id().as_str());
        if target != *doc.id() {
            info!(document = %doc.id(), target = %target, "recording as a new take");
        }
        self.targets.insert(doc.id().clone(), target.clone());
        target
    }

    fn target_for(&self, doc: &dyn Document) -> DocumentId {
        self.targets
            .get(doc.id())
            .cloned()
            .unwrap_or_else(|| doc.id().clone())
    }

    /// Installs the assistive-feature filter.
    #[must_use]
    pub fn with_filter(mut self, filter: MutationFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Freezes elapsed recording time. The log is untouched.
    pub fn pause(&mut self) {
        self.clock.pause();
        info!("recording paused");
    }

    /// Resumes the session clock after a pause.
    pub fn resume(&mut self) {
        self.clock.resume();
        info!("recording resumed");
    }

    /// Called after the document changed between `begin` and `end`, with
    /// `old_length` the length of the span the change replaced.
    ///
    /// A change that inserted nothing is a pure deletion and records a
    /// `Delete` of `old_length` characters; anything else records the new
    /// text. Changes the filter rejects are dropped.
    pub fn on_mutation(
        &mut self,
        log: &mut EventLog,
        doc: &dyn Document,
        begin: usize,
        end: usize,
        old_length: usize,
    ) {
        let inserted = end.saturating_sub(begin);
        if inserted == 0 && old_length == 0 {
            return;
        }
        let text = doc.text_range(begin, end);
        let mutation = Mutation {
            document: doc.id(),
            begin,
            end,
            old_length,
            text: &text,
        };
        if !(self.filter)(&mutation) {
            debug!(target = %doc.id(), begin, "mutation rejected by filter");
            return;
        }

        let payload = if inserted == 0 {
            Payload::Delete
        } else {
            Payload::Text(text)
        };
        let target = self.target_for(doc);
        debug!(%target, position = begin, old_length, "mutation recorded");
        log.append(EventRecord::new(
            self.clock.elapsed(),
            payload,
            begin,
            old_length,
            target,
        ));
    }

    /// Records an out-of-band evaluation command at the document's cursor.
    pub fn on_evaluate(
        &mut self,
        log: &mut EventLog,
        doc: &dyn Document,
        procedure: &str,
        arguments: &str,
    ) {
        let target = self.target_for(doc);
        debug!(%target, procedure, "evaluation recorded");
        log.append(EventRecord::new(
            self.clock.elapsed(),
            Payload::Eval {
                procedure: procedure.to_string(),
                arguments: arguments.to_string(),
            },
            doc.cursor(),
            0,
            target,
        ));
    }

    /// Records the document's editing mode, once per distinct declaration.
    ///
    /// The first declaration for a document always emits; later ones emit
    /// only when the mode differs from the last declared one.
    pub fn on_mode_declare(&mut self, log: &mut EventLog, doc: &dyn Document, mode: &str) {
        let target = self.target_for(doc);
        if self.declared_modes.get(&target).map(String::as_str) == Some(mode) {
            return;
        }
        self.declared_modes.insert(target.clone(), mode.to_string());
        debug!(%target, mode, "mode declared");
        log.append(EventRecord::new(
            self.clock.elapsed(),
            Payload::Mode(mode.to_string()),
            0,
            0,
            target,
        ));
    }
}

impl Default for SessionRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::document::TextDocument;

    fn recorded(log: &mut EventLog) -> Vec<EventRecord> {
        log.merge_session();
        log.records().to_vec()
    }

    #[test]
    fn test_insertion_becomes_text_record() {
        let mut log = EventLog::new();
        let mut recorder = SessionRecorder::new();
        let mut doc = TextDocument::new("riff");

        doc.insert(0, "play :c4");
        recorder.on_mutation(&mut log, &doc, 0, 8, 0);

        let records = recorded(&mut log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, Payload::Text("play :c4".to_string()));
        assert_eq!(records[0].position, 0);
        assert_eq!(records[0].length, 0);
        assert_eq!(records[0].target, DocumentId::from("riff"));
    }

    #[test]
    fn test_pure_deletion_becomes_delete_record() {
        let mut log = EventLog::new();
        let mut recorder = SessionRecorder::new();
        let mut doc = TextDocument::with_content("riff", "play :c4");

        doc.delete(4, 4);
        recorder.on_mutation(&mut log, &doc, 4, 4, 4);

        let records = recorded(&mut log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, Payload::Delete);
        assert_eq!(records[0].position, 4);
        assert_eq!(records[0].length, 4);
    }

    #[test]
    fn test_replacement_keeps_old_length() {
        let mut log = EventLog::new();
        let mut recorder = SessionRecorder::new();
        let mut doc = TextDocument::with_content("riff", "play :c4");

        doc.delete(6, 2);
        doc.insert(6, "e5");
        recorder.on_mutation(&mut log, &doc, 6, 8, 2);

        let records = recorded(&mut log);
        assert_eq!(records[0].payload, Payload::Text("e5".to_string()));
        assert_eq!(records[0].length, 2);
    }

    #[test]
    fn test_filter_drops_rejected_mutations() {
        let mut log = EventLog::new();
        let mut recorder = SessionRecorder::new()
            .with_filter(Box::new(|mutation| !mutation.text.starts_with("overlay")));
        let mut doc = TextDocument::new("riff");

        doc.insert(0, "overlay hint");
        recorder.on_mutation(&mut log, &doc, 0, 12, 0);
        doc.delete(0, 12);
        doc.insert(0, "real input");
        recorder.on_mutation(&mut log, &doc, 0, 10, 0);

        let records = recorded(&mut log);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, Payload::Text("real input".to_string()));
    }

    #[test]
    fn test_evaluation_is_recorded_at_cursor() {
        let mut log = EventLog::new();
        let mut recorder = SessionRecorder::new();
        let mut doc = TextDocument::new("riff");
        doc.insert(0, "sample :bd");

        recorder.on_evaluate(&mut log, &doc, "run-block", "line 1");

        let records = recorded(&mut log);
        assert_eq!(records[0].position, 10);
        assert_eq!(records[0].length, 0);
        assert_eq!(
            records[0].payload,
            Payload::Eval {
                procedure: "run-block".to_string(),
                arguments: "line 1".to_string(),
            }
        );
    }

    #[test]
    fn test_mode_declarations_deduplicate() {
        let mut log = EventLog::new();
        let mut recorder = SessionRecorder::new();
        let doc = TextDocument::new("riff");

        recorder.on_mode_declare(&mut log, &doc, "ruby");
        recorder.on_mode_declare(&mut log, &doc, "ruby");
        recorder.on_mode_declare(&mut log, &doc, "lisp");

        let records = recorded(&mut log);
        let modes: Vec<_> = records.iter().map(|record| &record.payload).collect();
        assert_eq!(
            modes,
            vec![
                &Payload::Mode("ruby".to_string()),
                &Payload::Mode("lisp".to_string()),
            ]
        );
    }

    #[test]
    fn test_documents_share_the_session_clock() {
        let mut log = EventLog::new();
        let start = Instant::now() - Duration::from_secs(2);
        let mut recorder = SessionRecorder::with_clock(SessionClock::started_at(start));
        let mut first = TextDocument::new("one");
        let mut second = TextDocument::new("two");

        first.insert(0, "a");
        recorder.on_mutation(&mut log, &first, 0, 1, 0);
        second.insert(0, "b");
        recorder.on_mutation(&mut log, &second, 0, 1, 0);

        let records = recorded(&mut log);
        assert!(records.iter().all(|r| r.timestamp >= Duration::from_secs(2)));
    }

    #[test]
    fn test_clock_freezes_while_paused() {
        let mut clock = SessionClock::start_now();
        clock.pause();
        let frozen = clock.elapsed();
        thread::sleep(Duration::from_millis(15));
        assert_eq!(clock.elapsed(), frozen);
    }

    #[test]
    fn test_resume_keeps_timestamps_continuous() {
        let mut clock = SessionClock::start_now();
        thread::sleep(Duration::from_millis(10));
        clock.pause();
        let before = clock.elapsed();
        thread::sleep(Duration::from_millis(25));
        clock.resume();
        let after = clock.elapsed();

        assert!(after >= before);
        // The pause itself must not count as elapsed recording time.
        assert!(after < before + Duration::from_millis(20));
    }

    #[test]
    fn test_attach_retargets_records_to_a_new_take() {
        let mut log = EventLog::new();
        log.append(EventRecord::new(
            Duration::ZERO,
            Payload::Text("first take".to_string()),
            0,
            0,
            "Foo",
        ));

        let mut recorder = SessionRecorder::new();
        let mut doc = TextDocument::new("Foo");
        let target = recorder.attach(&log, &doc);
        assert_eq!(target, DocumentId::from("Foo-Take2"));
        // Attaching again within the session reuses the derived take.
        assert_eq!(recorder.attach(&log, &doc), target);

        doc.insert(0, "second");
        recorder.on_mutation(&mut log, &doc, 0, 6, 0);

        log.merge_session();
        assert_eq!(log.records_for(&DocumentId::from("Foo")).count(), 1);
        assert_eq!(log.records_for(&target).count(), 1);
    }

    #[test]
    fn test_pause_twice_and_resume_idle_are_no_ops() {
        let mut clock = SessionClock::start_now();
        clock.resume();
        clock.pause();
        let frozen = clock.elapsed();
        clock.pause();
        assert_eq!(clock.elapsed(), frozen);
    }
}
