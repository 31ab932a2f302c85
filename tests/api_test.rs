use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use loudoun_pipeline::error::{AppError, AppResult};
use loudoun_pipeline::models::{DeedRecord, ScrapedTable};
use loudoun_pipeline::pipeline::{
    DocumentAnalyzer, DocumentProcessor, DocumentScraper, ExtractOutcome, ResultsWriter,
    ScrapeOutcome,
};
use loudoun_pipeline::{router, AppState, Collaborators};

/// 可选地等待放行信号，然后返回预设结果
struct FakeScraper {
    gate: Option<Arc<Notify>>,
    failure: Option<&'static str>,
}

#[async_trait]
impl DocumentScraper for FakeScraper {
    async fn scrape(&self) -> AppResult<ScrapeOutcome> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match self.failure {
            Some(reason) => Err(AppError::navigation_failed(
                "https://lisweb.loudoun.gov/PAXSubscription/",
                reason,
            )),
            None => Ok(ScrapeOutcome::default()),
        }
    }
}

struct FakeProcessor;

#[async_trait]
impl DocumentProcessor for FakeProcessor {
    async fn process(&self) -> AppResult<ExtractOutcome> {
        Ok(ExtractOutcome::default())
    }
}

struct FakeAnalyzer;

#[async_trait]
impl DocumentAnalyzer for FakeAnalyzer {
    async fn analyze(&self) -> AppResult<Vec<DeedRecord>> {
        Ok(Vec::new())
    }
}

struct FakeWriter;

#[async_trait]
impl ResultsWriter for FakeWriter {
    async fn write(&self, _records: &[DeedRecord], _table: &ScrapedTable) -> AppResult<PathBuf> {
        Ok(PathBuf::from("results.xlsx"))
    }
}

fn build_state(scraper: FakeScraper) -> AppState {
    AppState::new(Collaborators {
        scraper: Arc::new(scraper),
        processor: Arc::new(FakeProcessor),
        analyzer: Arc::new(FakeAnalyzer),
        writer: Arc::new(FakeWriter),
    })
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// 轮询 /status 直到进入指定状态
async fn wait_for_state(app: &Router, expected: &str) -> Value {
    for _ in 0..200 {
        let (_, body) = send(app, "GET", "/status").await;
        if body["state"] == expected {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("状态未变为 {}", expected);
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = router(build_state(FakeScraper {
        gate: None,
        failure: None,
    }));

    let (status, body) = send(&app, "GET", "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["endpoints"]["POST /start"].is_string());
}

#[tokio::test]
async fn test_status_idle_before_any_run() {
    let app = router(build_state(FakeScraper {
        gate: None,
        failure: None,
    }));

    let (status, body) = send(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert_eq!(body["is_running"], false);
    assert!(body["started_at"].is_null());
}

#[tokio::test]
async fn test_second_start_conflicts_until_run_completes() {
    let gate = Arc::new(Notify::new());
    let app = router(build_state(FakeScraper {
        gate: Some(Arc::clone(&gate)),
        failure: None,
    }));

    let (status, body) = send(&app, "POST", "/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Processing started");
    assert_eq!(body["status"], "running");
    assert!(body["run_id"].is_string());

    let (status, body) = send(&app, "POST", "/start").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "Processing is already running");

    gate.notify_one();
    let snapshot = wait_for_state(&app, "completed").await;
    assert_eq!(snapshot["progress"], 100);
    assert!(snapshot["error"].is_null());

    let (_, logs) = send(&app, "GET", "/logs/full").await;
    let entries = logs["logs"].as_array().unwrap();
    assert!(entries.iter().all(|e| e["level"] == "info"));

    // 结束后允许再次启动
    gate.notify_one();
    let (status, _) = send(&app, "POST", "/start").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_scraper_failure_is_logged_and_reported() {
    let app = router(build_state(FakeScraper {
        gate: None,
        failure: Some("navigation timeout"),
    }));

    let (status, _) = send(&app, "POST", "/start").await;
    assert_eq!(status, StatusCode::OK);

    let snapshot = wait_for_state(&app, "failed").await;
    assert_eq!(snapshot["is_running"], false);
    assert!(snapshot["error"]
        .as_str()
        .unwrap()
        .contains("navigation timeout"));

    let (_, logs) = send(&app, "GET", "/logs/full").await;
    let errors: Vec<&Value> = logs["logs"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["level"] == "error")
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["message"]
        .as_str()
        .unwrap()
        .contains("navigation timeout"));
}

#[tokio::test]
async fn test_logs_default_to_last_fifty() {
    let state = build_state(FakeScraper {
        gate: None,
        failure: None,
    });
    for i in 0..120 {
        state.sink.info(format!("entry {}", i));
    }
    let app = router(state);

    let (_, body) = send(&app, "GET", "/logs").await;
    assert_eq!(body["total_logs"], 120);
    assert_eq!(body["showing_last"], 50);
    let logs = body["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 50);
    assert_eq!(logs[0]["message"], "entry 70");
    assert_eq!(logs[49]["message"], "entry 119");

    let (_, body) = send(&app, "GET", "/logs?limit=5").await;
    assert_eq!(body["showing_last"], 5);

    let (_, body) = send(&app, "GET", "/logs?limit=0").await;
    assert_eq!(body["showing_last"], 120);

    let (_, body) = send(&app, "GET", "/logs/full").await;
    assert_eq!(body["total_logs"], 120);
}

#[tokio::test]
async fn test_invalid_log_limit_returns_json_error() {
    let app = router(build_state(FakeScraper {
        gate: None,
        failure: None,
    }));

    for uri in ["/logs?limit=abc", "/logs?limit=-1"] {
        let (status, body) = send(&app, "GET", uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["detail"].as_str().unwrap().contains("limit"), "{}", uri);
    }
}
