//! Hand-off point for replayed evaluation events.

use thiserror::Error;

/// Failure reported by an [`EvalSink`].
///
/// Playback logs these and keeps going; a broken run command must not stop
/// the take.
#[derive(Debug, Error)]
#[error("evaluation of `{procedure}` failed: {reason}")]
pub struct EvalError {
    pub procedure: String,
    pub reason: String,
}

impl EvalError {
    pub fn new(procedure: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            procedure: procedure.into(),
            reason: reason.into(),
        }
    }
}

/// Receives evaluation events as playback reaches them.
pub trait EvalSink {
    /// Invokes `procedure` with the recorded `arguments`.
    fn invoke(&mut self, procedure: &str, arguments: &str) -> Result<(), EvalError>;
}

/// Swallows every evaluation. The sink for headless replay.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl EvalSink for DiscardSink {
    fn invoke(&mut self, _procedure: &str, _arguments: &str) -> Result<(), EvalError> {
        Ok(())
    }
}

/// Remembers every evaluation in order.
#[derive(Debug, Default)]
pub struct CapturingSink {
    calls: Vec<(String, String)>,
}

impl CapturingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(procedure, arguments)` pair seen so far.
    pub fn calls(&self) -> &[(String, String)] {
        &self.calls
    }
}

impl EvalSink for CapturingSink {
    fn invoke(&mut self, procedure: &str, arguments: &str) -> Result<(), EvalError> {
        self.calls
            .push((procedure.to_string(), arguments.to_string()));
        Ok(())
    }
}
