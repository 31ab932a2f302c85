//! 流水线运行状态
//!
//! 进程内只有一个 `PipelineStateTracker`，由 API 层构造并注入。
//! `try_start` 是唯一需要互斥的检查并设置点。

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::pipeline::stage::Stage;

/// 运行阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// 状态快照，供状态接口序列化输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub state: RunState,
    pub is_running: bool,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_stage: Option<Stage>,
    /// 进度百分比（0-100）
    pub progress: u8,
    pub error: Option<String>,
    pub log_count: usize,
}

#[derive(Debug, Default)]
struct TrackerInner {
    state: RunState,
    run_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    current_stage: Option<Stage>,
    progress: u8,
    error: Option<String>,
}

/// 流水线状态跟踪器
#[derive(Debug, Default)]
pub struct PipelineStateTracker {
    inner: Mutex<TrackerInner>,
}

impl PipelineStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        // 状态只包含普通字段，锁中毒后继续使用是安全的
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 原子地进入 Running
    ///
    /// 已有运行中的流水线时返回 `false` 且不改变任何状态。
    /// 上一次运行的终态（Completed / Failed）会被本次启动重置。
    pub fn try_start(&self) -> bool {
        let mut inner = self.lock();
        if inner.state == RunState::Running {
            return false;
        }

        *inner = TrackerInner {
            state: RunState::Running,
            run_id: Some(Uuid::new_v4()),
            started_at: Some(Utc::now()),
            ..TrackerInner::default()
        };
        true
    }

    /// 记录当前阶段和进度
    pub fn enter_stage(&self, stage: Stage) {
        let mut inner = self.lock();
        if inner.state != RunState::Running {
            warn!("⚠️ 非运行状态下进入阶段 {}，已忽略", stage);
            return;
        }
        inner.current_stage = Some(stage);
        inner.progress = stage.progress_before();
    }

    /// Running → Completed，其他状态下为空操作
    pub fn set_completed(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != RunState::Running {
            warn!("⚠️ 非法状态转换: {:?} → Completed，已忽略", inner.state);
            return false;
        }
        inner.state = RunState::Completed;
        inner.progress = 100;
        inner.finished_at = Some(Utc::now());
        true
    }

    /// Running → Failed，其他状态下为空操作
    pub fn set_failed(&self, reason: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if inner.state != RunState::Running {
            warn!("⚠️ 非法状态转换: {:?} → Failed，已忽略", inner.state);
            return false;
        }
        inner.state = RunState::Failed;
        inner.error = Some(reason.into());
        inner.finished_at = Some(Utc::now());
        true
    }

    pub fn current_state(&self) -> RunState {
        self.lock().state
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.lock().run_id
    }

    /// 生成状态快照（`log_count` 由调用方填充）
    pub fn snapshot(&self, log_count: usize) -> RunSnapshot {
        let inner = self.lock();
        RunSnapshot {
            state: inner.state,
            is_running: inner.state == RunState::Running,
            run_id: inner.run_id,
            started_at: inner.started_at,
            finished_at: inner.finished_at,
            current_stage: inner.current_stage,
            progress: inner.progress,
            error: inner.error.clone(),
            log_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_state_is_idle() {
        let tracker = PipelineStateTracker::new();
        assert_eq!(tracker.current_state(), RunState::Idle);
        assert!(tracker.run_id().is_none());
    }

    #[test]
    fn test_try_start_rejects_while_running() {
        let tracker = PipelineStateTracker::new();
        assert!(tracker.try_start());
        let run_id = tracker.run_id();

        for _ in 0..10 {
            assert!(!tracker.try_start());
        }
        assert_eq!(tracker.current_state(), RunState::Running);
        assert_eq!(tracker.run_id(), run_id);
    }

    #[test]
    fn test_concurrent_try_start_only_one_wins() {
        let tracker = Arc::new(PipelineStateTracker::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.try_start())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|started| *started)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_terminal_state_can_be_restarted() {
        let tracker = PipelineStateTracker::new();
        assert!(tracker.try_start());
        let first = tracker.run_id();
        assert!(tracker.set_failed("boom"));

        assert!(tracker.try_start());
        let snapshot = tracker.snapshot(0);
        assert_eq!(snapshot.state, RunState::Running);
        assert_ne!(snapshot.run_id, first);
        assert!(snapshot.error.is_none());
        assert!(snapshot.finished_at.is_none());
    }

    #[test]
    fn test_illegal_transitions_are_ignored() {
        let tracker = PipelineStateTracker::new();
        assert!(!tracker.set_completed());
        assert!(!tracker.set_failed("nope"));
        assert_eq!(tracker.current_state(), RunState::Idle);

        assert!(tracker.try_start());
        assert!(tracker.set_completed());
        assert!(!tracker.set_failed("late"));
        assert_eq!(tracker.current_state(), RunState::Completed);
    }

    #[test]
    fn test_snapshot_tracks_progress() {
        let tracker = PipelineStateTracker::new();
        assert!(tracker.try_start());
        tracker.enter_stage(Stage::Extract);

        let snapshot = tracker.snapshot(3);
        assert!(snapshot.is_running);
        assert_eq!(snapshot.current_stage, Some(Stage::Extract));
        assert_eq!(snapshot.progress, 33);
        assert_eq!(snapshot.log_count, 3);

        tracker.set_completed();
        let snapshot = tracker.snapshot(3);
        assert_eq!(snapshot.progress, 100);
        assert!(snapshot.finished_at.is_some());
    }
}
