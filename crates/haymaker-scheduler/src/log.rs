//! Activity log: the operator-facing, append-only record of what a
//! deployment did.
//!
//! Lines look like `[2026-10-18T09:14:00+00:00] [INFO] Email sent by ...`.
//! They are kept in memory and optionally appended to a file.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use futures::stream::BoxStream;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

struct LogInner {
    lines: RwLock<Vec<String>>,
    /// Bumped on every append; followers wait on it.
    appended: watch::Sender<usize>,
    /// Opened once, in append mode.
    file: Option<Mutex<File>>,
}

/// Cheap to clone; clones share the same log.
#[derive(Clone)]
pub struct ActivityLog {
    inner: Arc<LogInner>,
}

impl ActivityLog {
    /// In-memory only.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Also append every line to `<log_dir>/<deployment_id>/activity.log`.
    /// Falls back to in-memory only when the file cannot be opened.
    pub fn with_file(log_dir: &Path, deployment_id: &str) -> Self {
        let path = Self::file_path(log_dir, deployment_id);
        let opened = std::fs::create_dir_all(log_dir.join(deployment_id)).and_then(|_| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
        });
        match opened {
            Ok(file) => Self::build(Some(Mutex::new(file))),
            Err(e) => {
                tracing::warn!("⚠️ Cannot open activity log {}: {e}", path.display());
                Self::new()
            }
        }
    }

    fn build(file: Option<Mutex<File>>) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            inner: Arc::new(LogInner {
                lines: RwLock::new(Vec::new()),
                appended,
                file,
            }),
        }
    }

    /// Path of the on-disk log for a deployment.
    pub fn file_path(log_dir: &Path, deployment_id: &str) -> PathBuf {
        log_dir.join(deployment_id).join("activity.log")
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.push(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.push(LogLevel::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.push(LogLevel::Error, message.as_ref());
    }

    pub fn push(&self, level: LogLevel, message: &str) {
        let line = format!("[{}] [{level}] {message}", Utc::now().to_rfc3339());

        if let Some(file) = &self.inner.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = writeln!(file, "{line}") {
                tracing::warn!("⚠️ Failed to append to activity log: {e}");
            }
        }

        let count = {
            let mut lines = self.inner.lines.write().unwrap_or_else(|e| e.into_inner());
            lines.push(line);
            lines.len()
        };
        self.inner.appended.send_replace(count);
    }

    /// Copy of every line so far.
    pub fn lines(&self) -> Vec<String> {
        self.inner
            .lines
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lines.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily yield the log from the first line.
    ///
    /// With `follow`, the stream never ends: it waits for new lines after
    /// catching up. Dropping the stream is the cancellation; nothing runs in
    /// the background.
    pub fn stream(&self, follow: bool) -> BoxStream<'static, String> {
        let inner = Arc::clone(&self.inner);
        let mut rx = inner.appended.subscribe();

        Box::pin(async_stream::stream! {
            let mut next = 0usize;
            loop {
                rx.borrow_and_update();
                let batch: Vec<String> = {
                    let lines = inner.lines.read().unwrap_or_else(|e| e.into_inner());
                    lines.get(next..).map(<[String]>::to_vec).unwrap_or_default()
                };
                next += batch.len();
                for line in batch {
                    yield line;
                }
                if !follow || rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an on-disk activity log, keeping the last `tail` lines.
pub fn read_log_file(path: &Path, tail: usize) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<String> = content.lines().map(String::from).collect();
    let skip = lines.len().saturating_sub(tail);
    Ok(lines.into_iter().skip(skip).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stream_restarts_from_start() {
        let log = ActivityLog::new();
        log.info("one");
        log.warn("two");

        let first: Vec<String> = log.stream(false).collect().await;
        let second: Vec<String> = log.stream(false).collect().await;
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert!(first[0].ends_with("[INFO] one"));
        assert!(first[1].ends_with("[WARNING] two"));
    }

    #[tokio::test]
    async fn test_follow_waits_for_new_lines() {
        let log = ActivityLog::new();
        log.info("before");
        let mut stream = log.stream(true);
        assert!(stream.next().await.unwrap().ends_with("before"));

        let writer = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.error("after");
        });

        let line = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("follow stream should yield the new line")
            .unwrap();
        assert!(line.ends_with("[ERROR] after"));

        // Nothing more: the stream blocks rather than ending.
        let pending = tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(pending.is_err());
        drop(stream);
    }

    #[test]
    fn test_file_log() {
        let dir = std::env::temp_dir().join("haymaker-test-activity-log");
        std::fs::remove_dir_all(&dir).ok();
        let log = ActivityLog::with_file(&dir, "m365-file0001");
        log.info("a");
        log.info("b");
        log.info("c");

        let path = ActivityLog::file_path(&dir, "m365-file0001");
        let tail = read_log_file(&path, 2).unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail[1].ends_with("[INFO] c"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reopened_file_log_appends() {
        let dir = std::env::temp_dir().join("haymaker-test-activity-log-reopen");
        std::fs::remove_dir_all(&dir).ok();
        let first = ActivityLog::with_file(&dir, "m365-file0002");
        first.info("from the first run");
        drop(first);

        let second = ActivityLog::with_file(&dir, "m365-file0002");
        second.warn("from the second run");
        // The in-memory view only holds this run's lines.
        assert_eq!(second.len(), 1);

        let path = ActivityLog::file_path(&dir, "m365-file0002");
        let lines = read_log_file(&path, 10).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] from the first run"));
        assert!(lines[1].ends_with("[WARNING] from the second run"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
