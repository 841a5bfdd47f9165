//! Diagnostic callback (spec.md §6): the bridge never panics or prints
//! directly on caller-visible error paths; it reports through a
//! caller-supplied callback in addition to the `log` facade, mirroring
//! how a host application embeds its own message pump.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DiagnosticLevel {
    Status,
    Warning,
    Error,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticLevel::Status => "status",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// A single diagnostic event. Owned (not borrowed) so it can be queued or
/// forwarded across threads without lifetime entanglement.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

/// Receives diagnostics emitted by the bridge, in addition to whatever
/// the `log` facade records. `FnMut` so a closure can accumulate state
/// (e.g. a test harness collecting events into a `Vec`).
pub trait DiagnosticSink {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic);
}

impl<F: FnMut(&Diagnostic)> DiagnosticSink for F {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

/// Forwards every diagnostic to the `log` facade at the matching level,
/// used when the caller hasn't installed a sink of their own.
#[derive(Default)]
pub struct LogDiagnosticSink;

impl DiagnosticSink for LogDiagnosticSink {
    fn on_diagnostic(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.level {
            DiagnosticLevel::Status => log::info!("{}", diagnostic.message),
            DiagnosticLevel::Warning => log::warn!("{}", diagnostic.message),
            DiagnosticLevel::Error => log::error!("{}", diagnostic.message),
        }
    }
}

/// Dispatches to both the `log` facade (always) and an optional
/// caller-installed sink. Held by [`crate::engine::Engine`].
#[derive(Default)]
pub struct Diagnostics {
    sink: Option<Box<dyn DiagnosticSink + Send>>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sink(&mut self, sink: Box<dyn DiagnosticSink + Send>) {
        self.sink = Some(sink);
    }

    pub fn emit(&mut self, level: DiagnosticLevel, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            level,
            message: message.into(),
        };
        LogDiagnosticSink.on_diagnostic(&diagnostic);
        if let Some(sink) = &mut self.sink {
            sink.on_diagnostic(&diagnostic);
        }
    }

    pub fn status(&mut self, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Status, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(DiagnosticLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_sink_receives_every_emission() {
        let mut diagnostics = Diagnostics::new();
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let events_clone = events.clone();
        diagnostics.set_sink(Box::new(move |d: &Diagnostic| {
            events_clone.lock().unwrap().push(d.level);
        }));
        diagnostics.status("starting");
        diagnostics.error("boom");
        let recorded = events.lock().unwrap();
        assert_eq!(*recorded, [DiagnosticLevel::Status, DiagnosticLevel::Error]);
    }
}
