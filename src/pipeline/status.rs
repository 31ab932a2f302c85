use std::sync::Arc;

use crate::pipeline::log_sink::{LogEntry, LogSink};
use crate::pipeline::state::{PipelineStateTracker, RunSnapshot};

/// 只读状态视图：组合状态跟踪器和运行日志
#[derive(Debug, Clone)]
pub struct StatusReporter {
    tracker: Arc<PipelineStateTracker>,
    sink: Arc<LogSink>,
}

impl StatusReporter {
    pub fn new(tracker: Arc<PipelineStateTracker>, sink: Arc<LogSink>) -> Self {
        Self { tracker, sink }
    }

    pub fn status(&self) -> RunSnapshot {
        self.tracker.snapshot(self.sink.len())
    }

    /// 最近 n 条日志；n 为 0 时返回全部
    pub fn logs(&self, n: usize) -> Vec<LogEntry> {
        if n == 0 {
            self.sink.all()
        } else {
            self.sink.tail(n)
        }
    }

    pub fn logs_full(&self) -> Vec<LogEntry> {
        self.sink.all()
    }

    pub fn total_logs(&self) -> usize {
        self.sink.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::RunState;

    #[test]
    fn test_status_combines_tracker_and_sink() {
        let tracker = Arc::new(PipelineStateTracker::new());
        let sink = Arc::new(LogSink::new());
        let reporter = StatusReporter::new(Arc::clone(&tracker), Arc::clone(&sink));

        sink.info("one");
        sink.info("two");
        let status = reporter.status();
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.log_count, 2);
        assert!(status.started_at.is_none());

        assert!(tracker.try_start());
        assert!(reporter.status().is_running);
    }

    #[test]
    fn test_logs_zero_returns_everything() {
        let tracker = Arc::new(PipelineStateTracker::new());
        let sink = Arc::new(LogSink::new());
        let reporter = StatusReporter::new(tracker, Arc::clone(&sink));
        for i in 0..60 {
            sink.info(i.to_string());
        }
        assert_eq!(reporter.logs(0).len(), 60);
        assert_eq!(reporter.logs(5).len(), 5);
        assert_eq!(reporter.logs_full().len(), 60);
    }
}
