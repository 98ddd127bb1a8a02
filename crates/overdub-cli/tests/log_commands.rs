//! Integration tests driving the overdub binary end to end.
//!
//! Each test writes an event log into a temp directory, spawns the built
//! binary against it, and asserts on stdout plus the rewritten log file.

use anyhow::Result;
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

use overdub_core::EventLog;
use overdub_proto::{DocumentId, EventRecord, Payload};

/// A small two-take log: "Foo" gets a mode and a line, "Foo-Take2" one word.
fn sample_log() -> EventLog {
    let mut log = EventLog::new();
    log.append(EventRecord::new(
        Duration::from_millis(100),
        Payload::Mode("ruby".to_string()),
        0,
        0,
        "Foo",
    ));
    log.append(EventRecord::new(
        Duration::from_millis(200),
        Payload::Text("play :c4".to_string()),
        0,
        0,
        "Foo",
    ));
    log.append(EventRecord::new(
        Duration::from_millis(500),
        Payload::Text("off".to_string()),
        0,
        0,
        "Foo-Take2",
    ));
    log.merge_session();
    log
}

fn overdub() -> Command {
    Command::new(env!("CARGO_BIN_EXE_overdub"))
}

#[test]
fn test_play_fast_renders_documents() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.log");
    sample_log().save(&path)?;

    let output = overdub()
        .arg("play")
        .arg("--fast")
        .arg("--log")
        .arg(&path)
        .current_dir(dir.path())
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Foo"));
    assert!(stdout.contains("play :c4"));
    assert!(stdout.contains("Replayed 3 events into 2 documents"));

    Ok(())
}

#[test]
fn test_events_filters_by_target() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.log");
    sample_log().save(&path)?;

    let output = overdub()
        .arg("events")
        .arg("--target")
        .arg("Foo-Take2")
        .arg("--log")
        .arg(&path)
        .current_dir(dir.path())
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total: 1 events"));
    assert!(stdout.contains("Foo-Take2"));

    // The base take's content must not leak through the filter.
    assert!(!stdout.contains("play :c4"));

    Ok(())
}

#[test]
fn test_events_json_tags_kinds() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.log");
    sample_log().save(&path)?;

    let output = overdub()
        .arg("events")
        .arg("--format")
        .arg("json")
        .arg("--log")
        .arg(&path)
        .current_dir(dir.path())
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"kind\": \"mode\""));
    assert!(stdout.contains("\"kind\": \"text\""));

    Ok(())
}

#[test]
fn test_remove_rewrites_the_log() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.log");
    sample_log().save(&path)?;

    let output = overdub()
        .arg("remove")
        .arg("Foo-Take2")
        .arg("--log")
        .arg(&path)
        .current_dir(dir.path())
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Removed 1 events for Foo-Take2"));

    // The file on disk shrinks; the surviving take is untouched.
    let (log, malformed) = EventLog::load(&path)?;
    assert!(malformed.is_empty());
    assert_eq!(log.targets(), vec![DocumentId::from("Foo")]);
    assert_eq!(log.len(), 2);

    Ok(())
}

#[test]
fn test_shift_retimes_a_take() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.log");
    sample_log().save(&path)?;

    let output = overdub()
        .arg("shift")
        .arg("Foo-Take2")
        .arg("1.5")
        .arg("--log")
        .arg(&path)
        .current_dir(dir.path())
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Shifted 1 events for Foo-Take2"));

    let (log, _) = EventLog::load(&path)?;
    let take = DocumentId::from("Foo-Take2");
    assert_eq!(
        log.records_for(&take).next().map(|record| record.timestamp),
        Some(Duration::from_secs(2))
    );

    Ok(())
}

#[test]
fn test_missing_log_reports_cleanly() -> Result<()> {
    let dir = TempDir::new()?;

    let output = overdub()
        .arg("events")
        .arg("--log")
        .arg("absent.log")
        .current_dir(dir.path())
        .output()?;

    // Asking about a log that was never recorded is not an error.
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No event log found"));

    Ok(())
}

#[test]
fn test_takes_summarizes_targets() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("session.log");
    sample_log().save(&path)?;

    let output = overdub()
        .arg("takes")
        .arg("--log")
        .arg(&path)
        .current_dir(dir.path())
        .output()?;

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Foo"));
    assert!(stdout.contains("Foo-Take2"));

    Ok(())
}
