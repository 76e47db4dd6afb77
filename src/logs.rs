use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// File name of the persisted log inside the log directory
pub const LOG_FILE_NAME: &str = "latest.log";

/// Tracing target that carries journal lines to console and file
pub const JOURNAL_TARGET: &str = "course_runner::journal";

/// Category of a journal entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogCategory {
    /// Lifecycle and task messages
    System,
    /// One line per served HTTP request
    Access,
    /// Any other caller-defined category
    Custom(String),
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogCategory::System => write!(f, "SYSTEM"),
            LogCategory::Access => write!(f, "ACCESS"),
            LogCategory::Custom(name) => write!(f, "{}", name.to_uppercase()),
        }
    }
}

impl Serialize for LogCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A single timestamped journal line
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub category: LogCategory,
    pub message: String,
}

impl LogEntry {
    /// Render as `[YYYY-mm-dd HH:MM:SS] [CATEGORY] message`
    pub fn line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.category,
            self.message
        )
    }
}

/// Append-only journal shared by the control plane and the worker.
///
/// Every entry lands in a bounded in-memory buffer and is mirrored to
/// `tracing`, whose subscriber writes it to the console and `latest.log`.
/// Cloning yields another handle onto the same buffer.
#[derive(Clone)]
pub struct LogSink {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogSink {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Append an entry; appends from concurrent writers are serialized
    pub fn append(&self, category: LogCategory, message: impl Into<String>) -> LogEntry {
        let entry = LogEntry {
            timestamp: Local::now(),
            category,
            message: message.into(),
        };

        {
            let mut entries = self.entries.lock();
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        tracing::info!(target: JOURNAL_TARGET, "{}", entry.line());
        entry
    }

    pub fn system(&self, message: impl Into<String>) -> LogEntry {
        self.append(LogCategory::System, message)
    }

    pub fn access(&self, message: impl Into<String>) -> LogEntry {
        self.append(LogCategory::Access, message)
    }

    /// The newest `limit` entries, oldest first (all entries when `None`)
    pub fn entries(&self, limit: Option<usize>) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(5000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_format() {
        let sink = LogSink::new(10);
        let entry = sink.append(LogCategory::Custom("worker".to_string()), "tick");
        let line = entry.line();

        assert!(line.starts_with('['));
        assert!(line.ends_with("] [WORKER] tick"));
        // "[YYYY-mm-dd HH:MM:SS]" is 21 characters
        assert_eq!(&line[20..21], "]");
    }

    #[test]
    fn test_entries_keep_order_and_limit() {
        let sink = LogSink::new(10);
        sink.system("one");
        sink.access("two");
        sink.system("three");

        let all = sink.entries(None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].message, "one");
        assert_eq!(all[1].category, LogCategory::Access);

        let tail = sink.entries(Some(2));
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].message, "two");
        assert_eq!(tail[1].message, "three");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let sink = LogSink::new(2);
        sink.system("a");
        sink.system("b");
        sink.system("c");

        let messages: Vec<_> = sink.entries(None).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
    }

    #[test]
    fn test_concurrent_appends_are_all_recorded() {
        let sink = LogSink::new(1000);
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        sink.system(format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 200);
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_value(LogCategory::Access).unwrap();
        assert_eq!(json, "ACCESS");
    }
}
