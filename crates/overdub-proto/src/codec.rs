//! Flat line-oriented wire format for the persisted event log.
//!
//! One record per line:
//!
//! ```text
//! <timestamp> |<payload>|<position>|<length>|<document-id>
//! ```
//!
//! The timestamp is fractional seconds since session start. Payload and
//! document-id fields are escaped so a record never spans lines and `|` stays
//! a reliable separator: `\\` for a backslash, `\n` for a newline, `\p` for a
//! pipe, `\d` for the delete sentinel character. A `Delete` payload is the
//! single raw sentinel character; `Eval` and `Mode` payloads use the
//! `EVAL:<procedure>#<arguments>` and `MODE:<name>` forms. Literal text that
//! would itself parse as one of those forms is written behind a `TEXT:` guard
//! prefix, which keeps decoding unambiguous and round-trips byte-exact.

use crate::error::CodecError;
use crate::record::{DocumentId, EventRecord, Payload};
use std::time::Duration;

/// Reserved one-character stand-in for a deletion payload on the wire.
pub const DELETE_SENTINEL: char = '\u{7f}';

const EVAL_PREFIX: &str = "EVAL:";
const MODE_PREFIX: &str = "MODE:";
const TEXT_GUARD: &str = "TEXT:";

/// Escapes a field so it contains no raw newline, pipe, or sentinel.
fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '|' => out.push_str("\\p"),
            DELETE_SENTINEL => out.push_str("\\d"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`escape`].
fn unescape(field: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('p') => out.push('|'),
            Some('d') => out.push(DELETE_SENTINEL),
            Some(other) => return Err(CodecError::UnknownEscape(other)),
            None => return Err(CodecError::DanglingEscape),
        }
    }
    Ok(out)
}

fn encode_payload(payload: &Payload) -> String {
    match payload {
        Payload::Delete => DELETE_SENTINEL.to_string(),
        Payload::Eval {
            procedure,
            arguments,
        } => escape(&format!("{EVAL_PREFIX}{procedure}#{arguments}")),
        Payload::Mode(name) => escape(&format!("{MODE_PREFIX}{name}")),
        Payload::Text(text) => {
            // Text that looks like a tagged form needs the guard so it does
            // not decode as that form.
            if text.starts_with(EVAL_PREFIX)
                || text.starts_with(MODE_PREFIX)
                || text.starts_with(TEXT_GUARD)
            {
                escape(&format!("{TEXT_GUARD}{text}"))
            } else {
                escape(text)
            }
        }
    }
}

fn decode_payload(field: &str) -> Result<Payload, CodecError> {
    // The raw sentinel only ever appears as an entire Delete payload; a
    // sentinel inside literal text is escaped as `\d`.
    if field.len() == DELETE_SENTINEL.len_utf8() && field.starts_with(DELETE_SENTINEL) {
        return Ok(Payload::Delete);
    }
    let decoded = unescape(field)?;
    if let Some(rest) = decoded.strip_prefix(EVAL_PREFIX) {
        let (procedure, arguments) = rest.split_once('#').unwrap_or((rest, ""));
        return Ok(Payload::Eval {
            procedure: procedure.to_string(),
            arguments: arguments.to_string(),
        });
    }
    if let Some(rest) = decoded.strip_prefix(MODE_PREFIX) {
        return Ok(Payload::Mode(rest.to_string()));
    }
    if let Some(rest) = decoded.strip_prefix(TEXT_GUARD) {
        return Ok(Payload::Text(rest.to_string()));
    }
    Ok(Payload::Text(decoded))
}

/// Encodes one record as a wire line, without a trailing newline.
pub fn encode_line(record: &EventRecord) -> String {
    format!(
        "{:.6} |{}|{}|{}|{}",
        record.timestamp.as_secs_f64(),
        encode_payload(&record.payload),
        record.position,
        record.length,
        escape(record.target.as_str()),
    )
}

/// Parses one wire line back into a record.
pub fn parse_line(line: &str) -> Result<EventRecord, CodecError> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != 5 {
        return Err(CodecError::FieldCount {
            found: fields.len(),
        });
    }

    let ts_raw = fields[0].trim();
    let secs: f64 = ts_raw.parse().map_err(|_| CodecError::Timestamp {
        value: ts_raw.to_string(),
    })?;
    let timestamp = Duration::try_from_secs_f64(secs).map_err(|_| CodecError::Timestamp {
        value: ts_raw.to_string(),
    })?;

    let payload = decode_payload(fields[1])?;
    let position: usize = fields[2].parse().map_err(|_| CodecError::Position {
        value: fields[2].to_string(),
    })?;
    let length: usize = fields[3].parse().map_err(|_| CodecError::Length {
        value: fields[3].to_string(),
    })?;
    let target = DocumentId::new(unescape(fields[4])?);

    Ok(EventRecord {
        timestamp,
        payload,
        position,
        length,
        target,
    })
}
