//! 运行日志
//!
//! 只追加、带时间戳的内存日志，进程生命周期内不清空。
//! 每条记录同时输出到 tracing。

use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// 日志接口默认返回的条数
pub const DEFAULT_TAIL: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )
    }
}

#[derive(Debug, Default)]
pub struct LogSink {
    entries: RwLock<Vec<LogEntry>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条日志，永不失败
    pub fn record(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Info => info!("{}", message),
            LogLevel::Error => error!("{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message,
        };
        match self.entries.write() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => {
                warn!("日志锁已中毒，继续写入");
                poisoned.into_inner().push(entry);
            }
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(LogLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(LogLevel::Error, message);
    }

    /// 最近 n 条，按时间顺序
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    pub fn all(&self) -> Vec<LogEntry> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 从第 `offset` 条开始的错误日志
    pub fn errors_since(&self, offset: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        entries
            .iter()
            .skip(offset)
            .filter(|e| e.level == LogLevel::Error)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_is_capped_and_chronological() {
        let sink = LogSink::new();
        for i in 0..500 {
            sink.info(format!("entry {}", i));
        }

        assert_eq!(sink.all().len(), 500);
        let tail = sink.tail(DEFAULT_TAIL);
        assert_eq!(tail.len(), 50);
        assert_eq!(tail.first().unwrap().message, "entry 450");
        assert_eq!(tail.last().unwrap().message, "entry 499");
    }

    #[test]
    fn test_tail_larger_than_history() {
        let sink = LogSink::new();
        sink.info("a");
        sink.error("b");
        let tail = sink.tail(50);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].level, LogLevel::Error);
    }

    #[test]
    fn test_errors_since_offset() {
        let sink = LogSink::new();
        sink.error("old failure");
        let offset = sink.len();
        sink.info("fine");
        sink.error("new failure");

        let errors = sink.errors_since(offset);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "new failure");
    }

    #[test]
    fn test_entry_display() {
        let sink = LogSink::new();
        sink.error("broken");
        let line = sink.all()[0].to_string();
        assert!(line.starts_with('['));
        assert!(line.ends_with("ERROR broken"));
    }
}
