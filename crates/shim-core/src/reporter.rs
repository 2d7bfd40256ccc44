//! Reporter trait for dependency injection
//!
//! Core logic reports user-facing progress through this trait instead of
//! writing to stderr directly, so tests can capture what an operator would see.

use std::io::Write;

use shim_schema::PROGRAM_NAME;

pub trait Reporter: Send + Sync {
    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
}

/// Writes `agent-desktop: <msg>` lines to stderr.
///
/// Stdout is left alone: during a package install it belongs to the package
/// manager, and the launcher hands it to the wrapped program.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl StderrReporter {
    fn line(msg: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{PROGRAM_NAME}: {msg}");
    }
}

impl Reporter for StderrReporter {
    fn info(&self, msg: &str) {
        Self::line(msg);
    }
    fn success(&self, msg: &str) {
        Self::line(msg);
    }
    fn warning(&self, msg: &str) {
        Self::line(msg);
    }
    fn error(&self, msg: &str) {
        Self::line(msg);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
}

/// Captures messages in memory, tagged by level.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: std::sync::Mutex<Vec<(Level, String)>>,
}

/// Severity of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Whether any message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }

    fn push(&self, level: Level, msg: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, msg.to_string()));
        }
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, msg: &str) {
        self.push(Level::Info, msg);
    }
    fn success(&self, msg: &str) {
        self.push(Level::Success, msg);
    }
    fn warning(&self, msg: &str) {
        self.push(Level::Warning, msg);
    }
    fn error(&self, msg: &str) {
        self.push(Level::Error, msg);
    }
}
