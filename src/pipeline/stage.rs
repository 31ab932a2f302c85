//! 阶段定义与外部协作者接口
//!
//! 阶段执行器只依赖这里的 trait，真实实现在 `services/`，测试中使用假实现。

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::{DeedRecord, ScrapedTable};

/// 流水线阶段（固定顺序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// 抓取检索结果并下载 PDF
    Scrape,
    /// 去重并提取 PDF 文本
    Extract,
    /// LLM 分析并写入结果表格
    Analyze,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Scrape, Stage::Extract, Stage::Analyze];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
        }
    }

    /// 面向用户的阶段描述
    pub fn description(self) -> &'static str {
        match self {
            Stage::Scrape => "抓取检索结果并下载 PDF",
            Stage::Extract => "提取 PDF 文本",
            Stage::Analyze => "使用 LLM 分析文本并写入结果表格",
        }
    }

    /// 进入该阶段时的进度
    pub fn progress_before(self) -> u8 {
        match self {
            Stage::Scrape => 0,
            Stage::Extract => 33,
            Stage::Analyze => 66,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个阶段的执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    pub detail: String,
}

impl StageResult {
    pub fn succeeded(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            stage,
            success: false,
            detail: detail.into(),
        }
    }
}

/// 抓取阶段产出
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    /// 本次新下载的文件
    pub downloaded: Vec<PathBuf>,
    pub table: ScrapedTable,
}

/// 文本提取阶段产出
#[derive(Debug, Clone, Default)]
pub struct ExtractOutcome {
    /// 新生成的文本文件
    pub extracted: Vec<PathBuf>,
    pub duplicates_removed: usize,
    /// 解析失败而跳过的 PDF
    pub skipped: usize,
}

/// 抓取协作者：登录站点、检索并下载 PDF
#[async_trait]
pub trait DocumentScraper: Send + Sync {
    async fn scrape(&self) -> AppResult<ScrapeOutcome>;
}

/// PDF 处理协作者：去重并把 PDF 转为可检索文本
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self) -> AppResult<ExtractOutcome>;
}

/// 分析协作者：把文本交给 LLM 提取结构化字段
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self) -> AppResult<Vec<DeedRecord>>;
}

/// 结果写入协作者：把分析结果写入固定路径的表格
#[async_trait]
pub trait ResultsWriter: Send + Sync {
    async fn write(&self, records: &[DeedRecord], table: &ScrapedTable) -> AppResult<PathBuf>;
}
