//! Append-only run journal.
//!
//! Every phase receives a [`Journal`] handle instead of writing to shared
//! process state. Entries are mirrored to `tracing` as they are recorded and
//! the whole journal is written into the staging root at the end of a run.
//! Errors can additionally be appended, with their cause chain and a
//! backtrace, to a persistent error log file.

use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalLevel {
    Info,
    Warn,
    Error,
}

impl JournalLevel {
    fn label(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

/// A single recorded line.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub at: DateTime<Utc>,
    pub level: JournalLevel,
    pub message: String,
}

/// Cloneable handle to the run journal.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    inner: Arc<JournalInner>,
}

#[derive(Debug, Default)]
struct JournalInner {
    entries: Mutex<Vec<JournalEntry>>,
    error_log: Option<PathBuf>,
}

impl Journal {
    /// Journal without a persistent error log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal that also appends error details to `path`.
    pub fn with_error_log(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(JournalInner {
                entries: Mutex::new(Vec::new()),
                error_log: Some(path.into()),
            }),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "botdiag::journal", "{}", message);
        self.push(JournalLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "botdiag::journal", "{}", message);
        self.push(JournalLevel::Warn, message);
    }

    /// Record an error. When an error log is configured, the full cause
    /// chain and a backtrace are appended to it.
    pub fn error(&self, context: &str, err: &(dyn std::error::Error + 'static)) {
        let message = format!("{context}: {err}");
        error!(target: "botdiag::journal", "{}", message);
        self.push(JournalLevel::Error, message);

        if let Some(path) = &self.inner.error_log {
            let report = render_error_report(context, err);
            if let Err(e) = append(path, &report) {
                warn!(path = %path.display(), error = %e, "failed to append to error log");
            }
        }
    }

    /// Snapshot of all entries so far.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().clone()
    }

    pub fn count(&self, level: JournalLevel) -> usize {
        self.lock().iter().filter(|e| e.level == level).count()
    }

    /// Render the journal as plain text, one entry per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in self.lock().iter() {
            let _ = writeln!(
                out,
                "{} [{}] {}",
                entry.at.to_rfc3339_opts(SecondsFormat::Millis, true),
                entry.level.label(),
                entry.message
            );
        }
        out
    }

    /// Write the rendered journal to `path`, replacing any existing file.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }

    fn push(&self, level: JournalLevel, message: String) {
        self.lock().push(JournalEntry {
            at: Utc::now(),
            level,
            message,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn render_error_report(context: &str, err: &(dyn std::error::Error + 'static)) -> String {
    let mut report = format!(
        "=== {} {context}\nerror: {err}\n",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
    );
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = writeln!(report, "caused by: {cause}");
        source = cause.source();
    }
    let _ = writeln!(report, "backtrace:\n{}", Backtrace::force_capture());
    report
}

fn append(path: &Path, text: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn records_entries_in_order() {
        let journal = Journal::new();
        journal.info("first");
        journal.warn("second");

        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].level, JournalLevel::Warn);
        assert_eq!(journal.count(JournalLevel::Info), 1);
    }

    #[test]
    fn clones_share_the_same_buffer() {
        let journal = Journal::new();
        let handle = journal.clone();
        handle.info("from clone");
        assert_eq!(journal.entries().len(), 1);
    }

    #[test]
    fn error_appends_cause_chain_to_error_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("errors.log");
        let journal = Journal::with_error_log(&log);

        let err = Outer {
            inner: std::io::Error::other("disk on fire"),
        };
        journal.error("exporting settings", &err);
        journal.error("exporting versions", &err);

        let text = std::fs::read_to_string(&log).unwrap();
        assert_eq!(text.matches("=== ").count(), 2);
        assert!(text.contains("exporting settings"));
        assert!(text.contains("error: outer failure"));
        assert!(text.contains("caused by: disk on fire"));
        assert!(text.contains("backtrace:"));
        assert_eq!(journal.count(JournalLevel::Error), 2);
    }

    #[test]
    fn render_has_one_line_per_entry() {
        let journal = Journal::new();
        journal.info("a");
        journal.warn("b");
        let text = journal.render();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().contains("[WARN] b"));
    }
}
