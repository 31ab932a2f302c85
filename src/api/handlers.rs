//! HTTP 处理函数

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::pipeline::{LogEntry, RunSnapshot, RunState, DEFAULT_TAIL};

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub message: String,
    pub status: RunState,
    pub run_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    /// 返回的条数，0 表示全部
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogEntry>,
    pub total_logs: usize,
    pub showing_last: usize,
}

#[derive(Debug, Serialize)]
pub struct FullLogsResponse {
    pub logs: Vec<LogEntry>,
    pub total_logs: usize,
}

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Loudoun Data Processing API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /start": "Start the scrape → extract → analyze pipeline",
            "GET /status": "Current run state",
            "GET /logs": "Most recent log entries (?limit=N, 0 for all)",
            "GET /logs/full": "Complete log history",
        }
    }))
}

/// 启动一次运行；已有运行时返回 409
pub async fn start(State(state): State<AppState>) -> Response {
    if !state.tracker.try_start() {
        info!("⏳ 已有运行在进行中，拒绝新的启动请求");
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                detail: "Processing is already running".to_string(),
            }),
        )
            .into_response();
    }

    let run_id = state.tracker.run_id();
    Arc::clone(&state.runner).spawn();

    Json(StartResponse {
        message: "Processing started".to_string(),
        status: RunState::Running,
        run_id,
    })
    .into_response()
}

pub async fn status(State(state): State<AppState>) -> Json<RunSnapshot> {
    Json(state.reporter.status())
}

/// 最近的日志；`limit` 无法解析时返回 400 `{detail}`
pub async fn logs(
    State(state): State<AppState>,
    query: Result<Query<LogsQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    detail: rejection.body_text(),
                }),
            )
                .into_response();
        }
    };

    let logs = state.reporter.logs(query.limit.unwrap_or(DEFAULT_TAIL));
    Json(LogsResponse {
        total_logs: state.reporter.total_logs(),
        showing_last: logs.len(),
        logs,
    })
    .into_response()
}

pub async fn logs_full(State(state): State<AppState>) -> Json<FullLogsResponse> {
    let logs = state.reporter.logs_full();
    Json(FullLogsResponse {
        total_logs: logs.len(),
        logs,
    })
}
