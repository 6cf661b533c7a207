use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Local;
use serde::{Deserialize, Serialize};

pub const ACTIVITY_LOG_CAPACITY: usize = 100;

/// A user-facing report line: upload failures, skipped rows, recovery
/// warnings.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogEntry {
    pub time: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

/// Bounded in-memory activity log; the oldest entry is dropped once full.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, level: &str, source: &str, message: &str) -> LogEntry {
        let entry = LogEntry {
            time: Local::now().format("%H:%M:%S").to_string(),
            level: level.to_string(),
            source: source.to_string(),
            message: message.to_string(),
        };

        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.push_back(entry.clone());
        if entries.len() > ACTIVITY_LOG_CAPACITY {
            entries.pop_front();
        }
        entry
    }

    pub fn info(&self, source: &str, message: &str) {
        self.add("INFO", source, message);
    }

    pub fn warn(&self, source: &str, message: &str) {
        self.add("WARN", source, message);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.add("ERROR", source, message);
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let log = ActivityLog::new();
        for i in 0..(ACTIVITY_LOG_CAPACITY + 5) {
            log.info("Test", &format!("entry {}", i));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), ACTIVITY_LOG_CAPACITY);
        assert_eq!(entries[0].message, "entry 5");
        assert_eq!(entries.last().unwrap().message, "entry 104");
    }

    #[test]
    fn test_levels() {
        let log = ActivityLog::new();
        log.warn("Recovery", "empty");
        log.error("Upload", "failed");

        let levels: Vec<String> = log.entries().into_iter().map(|e| e.level).collect();
        assert_eq!(levels, vec!["WARN".to_string(), "ERROR".to_string()]);
    }
}
