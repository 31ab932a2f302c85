//! HTTP 接口层
//!
//! 只做请求解析和响应序列化，状态与日志全部来自流水线模块。

pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/start", post(handlers::start))
        .route("/status", get(handlers::status))
        .route("/logs", get(handlers::logs))
        .route("/logs/full", get(handlers::logs_full))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
