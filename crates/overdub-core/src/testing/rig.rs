//! A host-editor stand-in wiring documents, recorder, and log together.

use overdub_proto::DocumentId;

use crate::document::{Document, MemoryHost, TextDocument};
use crate::event_log::EventLog;
use crate::session_recorder::SessionRecorder;

/// Records edits the way a host editor would: mutate the document first,
/// then notify the recorder with the change's extent.
pub struct RecordingRig {
    pub log: EventLog,
    pub recorder: SessionRecorder,
    pub host: MemoryHost,
}

impl RecordingRig {
    pub fn new() -> Self {
        Self {
            log: EventLog::new(),
            recorder: SessionRecorder::new(),
            host: MemoryHost::new(),
        }
    }

    /// Opens a document for recording. When `name` already has recorded
    /// events, the session targets the next free take name instead.
    pub fn open(&mut self, name: &str, content: &str) -> DocumentId {
        let id = self.log.derive_take(name);
        self.host
            .adopt(TextDocument::with_content(id.clone(), content));
        id
    }

    /// Types `text` at `position`.
    pub fn type_text(&mut self, id: &DocumentId, position: usize, text: &str) {
        let doc = self.host.get_mut(id).expect("document not open");
        doc.insert(position, text);
        let end = position + text.chars().count();
        self.recorder
            .on_mutation(&mut self.log, &*doc, position, end, 0);
    }

    /// Deletes `length` characters at `position`.
    pub fn delete_text(&mut self, id: &DocumentId, position: usize, length: usize) {
        let doc = self.host.get_mut(id).expect("document not open");
        doc.delete(position, length);
        self.recorder
            .on_mutation(&mut self.log, &*doc, position, position, length);
    }

    /// Replaces `length` characters at `position` with `text`, reported to
    /// the recorder as one change.
    pub fn replace_text(&mut self, id: &DocumentId, position: usize, length: usize, text: &str) {
        let doc = self.host.get_mut(id).expect("document not open");
        doc.delete(position, length);
        doc.insert(position, text);
        let end = position + text.chars().count();
        self.recorder
            .on_mutation(&mut self.log, &*doc, position, end, length);
    }

    /// Records an evaluation command at the document's cursor.
    pub fn evaluate(&mut self, id: &DocumentId, procedure: &str, arguments: &str) {
        let doc = self.host.get(id).expect("document not open");
        self.recorder
            .on_evaluate(&mut self.log, doc, procedure, arguments);
    }

    /// Declares the document's editing mode.
    pub fn declare_mode(&mut self, id: &DocumentId, mode: &str) {
        let doc = self.host.get(id).expect("document not open");
        self.recorder.on_mode_declare(&mut self.log, doc, mode);
    }

    /// Current text of an open document.
    pub fn text(&self, id: &DocumentId) -> &str {
        self.host.get(id).expect("document not open").text()
    }

    /// Ends the session, merging staged records, and returns the log.
    pub fn finish(mut self) -> EventLog {
        self.log.merge_session();
        self.log
    }
}

impl Default for RecordingRig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use overdub_proto::Payload;

    use super::*;

    #[test]
    fn test_rig_records_typed_text() {
        let mut rig = RecordingRig::new();
        let id = rig.open("sketch", "");
        rig.type_text(&id, 0, "live");
        rig.type_text(&id, 4, " set");

        assert_eq!(rig.text(&id), "live set");
        let log = rig.finish();
        assert_eq!(log.len(), 2);
        assert!(log.records().iter().all(|record| record.target == id));
    }

    #[test]
    fn test_reopening_a_recorded_name_targets_a_new_take() {
        let mut rig = RecordingRig::new();
        let first = rig.open("Foo", "");
        rig.type_text(&first, 0, "one");

        let second = rig.open("Foo", "");
        assert_eq!(second, DocumentId::from("Foo-Take2"));
        rig.type_text(&second, 0, "two");

        let log = rig.finish();
        assert_eq!(log.records_for(&first).count(), 1);
        assert_eq!(log.records_for(&second).count(), 1);
    }

    #[test]
    fn test_rig_reports_replacements_with_old_length() {
        let mut rig = RecordingRig::new();
        let id = rig.open("sketch", "abcdef");
        rig.replace_text(&id, 2, 3, "XY");

        assert_eq!(rig.text(&id), "abXYf");
        let log = rig.finish();
        let record = &log.records()[0];
        assert_eq!(record.payload, Payload::Text("XY".to_string()));
        assert_eq!(record.position, 2);
        assert_eq!(record.length, 3);
    }
}
