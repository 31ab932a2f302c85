//! # Loudoun Pipeline
//!
//! 抓取 Loudoun 县土地记录、提取 PDF 文本并用 LLM 分析的后台服务
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动无头浏览器，持有浏览器进程
//! - `infrastructure/` - `JsExecutor` 持有 Page，只暴露脚本执行、等待、点击等能力
//! - `clients/` - PDF 下载和 LLM 调用
//!
//! ### ② 业务能力层（Services）
//! - `LoudounScraper` - 登录、检索、下载 PDF
//! - `PdfTextProcessor` - 去重并生成可检索文本
//! - `OpenAiAnalyzer` - 分块调用 LLM 提取契约信息
//! - `XlsxResultsWriter` - 写入结果表格
//!
//! ### ③ 流水线层（Pipeline）
//! - `PipelineStateTracker` - 运行状态机，保证同一时间只有一次运行
//! - `StageRunner` - 后台按顺序执行三个阶段
//! - `LogSink` / `StatusReporter` - 运行日志与状态查询
//!
//! ### ④ 接口层（API）
//! - `api/` - axum 路由：/start、/status、/logs、/logs/full
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use api::{router, AppState};
pub use app::{build_collaborators, App};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{DeedInfo, DeedRecord, ScrapedTable};
pub use pipeline::{
    Collaborators, LogSink, PipelineStateTracker, RunSnapshot, RunState, Stage, StageRunner,
    StatusReporter,
};
