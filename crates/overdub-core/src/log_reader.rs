//! Incremental reading of a persisted event log.
//!
//! [`LogReader`] remembers how far into the file it has read, so a caller
//! can poll a log that another process is still appending to. Only complete
//! lines are consumed; a partially written tail stays in the file for the
//! next read.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use overdub_proto::{CodecError, EventRecord, parse_line};
use tracing::{debug, warn};

use crate::event_log::LogError;

/// One unparseable log line, kept for reporting.
#[derive(Debug, Clone)]
pub struct MalformedLine {
    /// 1-based line number in the file.
    pub line_number: usize,
    /// The offending line, truncated for display.
    pub content: String,
    pub error: CodecError,
}

/// Result of parsing a chunk of log text.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: Vec<EventRecord>,
    pub malformed: Vec<MalformedLine>,
}

/// Reads newly appended records from a log file across repeated calls.
#[derive(Debug)]
pub struct LogReader {
    path: PathBuf,
    position: u64,
    lines_seen: usize,
}

impl LogReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            position: 0,
            lines_seen: 0,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Parses every complete line appended since the previous call.
    ///
    /// A missing file is not an error here; the log may simply not have been
    /// started yet.
    pub fn read_new(&mut self) -> Result<ParseOutcome, LogError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "event log not present yet");
            return Ok(ParseOutcome::default());
        }

        let mut file = File::open(&self.path).map_err(|source| LogError::Read {
            path: self.path.clone(),
            source,
        })?;
        file.seek(SeekFrom::Start(self.position))
            .map_err(|source| LogError::Read {
                path: self.path.clone(),
                source,
            })?;
        let mut buffer = String::new();
        file.read_to_string(&mut buffer)
            .map_err(|source| LogError::Read {
                path: self.path.clone(),
                source,
            })?;

        let consumed = buffer.rfind('\n').map_or(0, |index| index + 1);
        let complete = &buffer[..consumed];
        let outcome = parse_lines(complete, self.lines_seen + 1);
        self.lines_seen += complete.lines().count();
        self.position += consumed as u64;
        Ok(outcome)
    }
}

/// Parses newline-separated records, numbering lines from `first_line`.
/// Malformed lines are reported and skipped; blank lines are ignored.
pub(crate) fn parse_lines(input: &str, first_line: usize) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    for (index, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = first_line + index;
        match parse_line(line) {
            Ok(record) => outcome.records.push(record),
            Err(error) => {
                warn!(line = line_number, %error, "skipping malformed log line");
                outcome.malformed.push(MalformedLine {
                    line_number,
                    content: truncated(line),
                    error,
                });
            }
        }
    }
    outcome
}

fn truncated(line: &str) -> String {
    const LIMIT: usize = 120;
    if line.chars().count() <= LIMIT {
        return line.to_string();
    }
    let mut content: String = line.chars().take(LIMIT).collect();
    content.push_str("...");
    content
}

#[cfg(test)]
mod tests {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn append(path: &std::path::Path, chunk: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(chunk.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = LogReader::new(dir.path().join("absent.log"));
        let outcome = reader.read_new().unwrap();
        assert!(outcome.records.is_empty());
        assert!(outcome.malformed.is_empty());
    }

    #[test]
    fn test_reads_only_new_lines_on_later_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        append(&path, "0.100000 |one|0|0|main\n");

        let mut reader = LogReader::new(&path);
        let first = reader.read_new().unwrap();
        assert_eq!(first.records.len(), 1);

        append(&path, "0.200000 |two|3|0|main\n0.300000 |three|6|0|main\n");
        let second = reader.read_new().unwrap();
        assert_eq!(second.records.len(), 2);
        assert_eq!(second.records[0].timestamp, Duration::from_millis(200));

        assert!(reader.read_new().unwrap().records.is_empty());
    }

    #[test]
    fn test_partial_tail_waits_for_its_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        append(&path, "0.100000 |one|0|0|main\n0.200000 |tw");

        let mut reader = LogReader::new(&path);
        assert_eq!(reader.read_new().unwrap().records.len(), 1);

        append(&path, "o|3|0|main\n");
        let outcome = reader.read_new().unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].timestamp, Duration::from_millis(200));
    }

    #[test]
    fn test_malformed_lines_are_numbered_across_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        append(&path, "0.100000 |ok|0|0|main\n");

        let mut reader = LogReader::new(&path);
        assert!(reader.read_new().unwrap().malformed.is_empty());

        append(&path, "garbage\n");
        let outcome = reader.read_new().unwrap();
        assert_eq!(outcome.malformed.len(), 1);
        assert_eq!(outcome.malformed[0].line_number, 2);
        assert_eq!(outcome.malformed[0].content, "garbage");
    }

    #[test]
    fn test_long_malformed_lines_are_truncated_in_the_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let noise = "x".repeat(300);
        append(&path, &format!("{noise}\n"));

        let mut reader = LogReader::new(&path);
        let outcome = reader.read_new().unwrap();
        assert_eq!(outcome.malformed.len(), 1);
        assert!(outcome.malformed[0].content.len() < noise.len());
        assert!(outcome.malformed[0].content.ends_with("..."));
    }
}
