//! The editing surface the engine records from and plays into.
//!
//! The engine never owns an editor. It drives anything that can insert and
//! delete character ranges, report a cursor, and accept a mode declaration.
//! [`TextDocument`] is the built-in in-memory implementation, used by the
//! command-line player and throughout the tests.

use std::collections::BTreeMap;

use overdub_proto::DocumentId;

/// Editable text buffer addressed in characters.
///
/// Positions count characters, not bytes. Implementations are expected to
/// tolerate out-of-range positions by clamping to the buffer end rather than
/// panicking; replayed events can land beyond a shrunken document.
pub trait Document {
    /// Stable identifier used to route events to this document.
    fn id(&self) -> &DocumentId;

    /// Number of characters in the buffer.
    fn len_chars(&self) -> usize;

    /// Inserts `text` before the character at `position`.
    fn insert(&mut self, position: usize, text: &str);

    /// Removes `length` characters starting at `position`.
    fn delete(&mut self, position: usize, length: usize);

    /// Declares the editing mode governing subsequent content.
    fn set_mode(&mut self, mode: &str);

    /// Current cursor position in characters.
    fn cursor(&self) -> usize;

    /// Extracts the characters in `begin..end`.
    fn text_range(&self, begin: usize, end: usize) -> String;
}

/// Plain in-memory [`Document`].
#[derive(Debug, Clone)]
pub struct TextDocument {
    id: DocumentId,
    content: String,
    mode: Option<String>,
    cursor: usize,
}

impl TextDocument {
    /// Creates an empty document.
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Self {
            id: id.into(),
            content: String::new(),
            mode: None,
            cursor: 0,
        }
    }

    /// Creates a document pre-filled with `content`, cursor at the end.
    pub fn with_content(id: impl Into<DocumentId>, content: impl Into<String>) -> Self {
        let content = content.into();
        let cursor = content.chars().count();
        Self {
            id: id.into(),
            content,
            mode: None,
            cursor,
        }
    }

    /// Full buffer contents.
    pub fn text(&self) -> &str {
        &self.content
    }

    /// Mode declared for this document, if any.
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// Moves the cursor, clamping to the buffer end.
    pub fn set_cursor(&mut self, position: usize) {
        self.cursor = position.min(self.len_chars());
    }

    fn byte_offset(&self, position: usize) -> usize {
        self.content
            .char_indices()
            .nth(position)
            .map_or(self.content.len(), |(byte, _)| byte)
    }
}

impl Document for TextDocument {
    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn len_chars(&self) -> usize {
        self.content.chars().count()
    }

    fn insert(&mut self, position: usize, text: &str) {
        let position = position.min(self.len_chars());
        let at = self.byte_offset(position);
        self.content.insert_str(at, text);
        self.cursor = position + text.chars().count();
    }

    fn delete(&mut self, position: usize, length: usize) {
        let total = self.len_chars();
        let position = position.min(total);
        let end = (position + length).min(total);
        let start_byte = self.byte_offset(position);
        let end_byte = self.byte_offset(end);
        self.content.replace_range(start_byte..end_byte, "");
        self.cursor = position;
    }

    fn set_mode(&mut self, mode: &str) {
        self.mode = Some(mode.to_string());
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn text_range(&self, begin: usize, end: usize) -> String {
        let total = self.len_chars();
        let begin = begin.min(total);
        let end = end.min(total).max(begin);
        self.content
            .chars()
            .skip(begin)
            .take(end - begin)
            .collect()
    }
}

/// Source of documents for playback.
///
/// Replay creates target documents lazily, on the first event addressed to
/// them. The host decides what "create" means: an editor adapter would open a
/// buffer, [`MemoryHost`] just allocates one.
pub trait DocumentHost {
    /// True when a document with this id already exists.
    fn exists(&self, id: &DocumentId) -> bool;

    /// Returns the document with this id, creating it empty when missing.
    fn materialize(&mut self, id: &DocumentId) -> &mut dyn Document;
}

/// Keeps every materialized document in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    documents: BTreeMap<DocumentId, TextDocument>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document up front, as if the user already had it open.
    pub fn adopt(&mut self, document: TextDocument) {
        self.documents.insert(document.id().clone(), document);
    }

    /// Read access to a materialized document.
    pub fn get(&self, id: &DocumentId) -> Option<&TextDocument> {
        self.documents.get(id)
    }

    /// Write access to a materialized document.
    pub fn get_mut(&mut self, id: &DocumentId) -> Option<&mut TextDocument> {
        self.documents.get_mut(id)
    }

    /// Ids of every document the host holds, in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.keys()
    }
}

impl DocumentHost for MemoryHost {
    fn exists(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    fn materialize(&mut self, id: &DocumentId) -> &mut dyn Document {
        self.documents
            .entry(id.clone())
            .or_insert_with(|| TextDocument::new(id.clone()))
    }
}
