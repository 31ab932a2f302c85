use std::sync::Arc;

use crate::pipeline::{Collaborators, LogSink, PipelineStateTracker, StageRunner, StatusReporter};

/// 路由共享状态
///
/// 显式构造后交给路由，不使用全局单例。
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<PipelineStateTracker>,
    pub sink: Arc<LogSink>,
    pub reporter: StatusReporter,
    pub runner: Arc<StageRunner>,
}

impl AppState {
    pub fn new(collaborators: Collaborators) -> Self {
        let tracker = Arc::new(PipelineStateTracker::new());
        let sink = Arc::new(LogSink::new());
        let reporter = StatusReporter::new(Arc::clone(&tracker), Arc::clone(&sink));
        let runner = Arc::new(StageRunner::new(
            Arc::clone(&tracker),
            Arc::clone(&sink),
            collaborators,
        ));

        Self {
            tracker,
            sink,
            reporter,
            runner,
        }
    }
}
