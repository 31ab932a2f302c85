//! 阶段执行器
//!
//! 按固定顺序执行 抓取 → 提取 → 分析，每个阶段只尝试一次。
//! 任一阶段失败即记录错误日志、将运行标记为 Failed，后续阶段不再执行。

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::error::{AppError, AppResult};
use crate::pipeline::log_sink::LogSink;
use crate::pipeline::stage::{
    DocumentAnalyzer, DocumentProcessor, DocumentScraper, ResultsWriter, Stage, StageResult,
};
use crate::pipeline::state::PipelineStateTracker;

/// 执行器依赖的外部协作者
#[derive(Clone)]
pub struct Collaborators {
    pub scraper: Arc<dyn DocumentScraper>,
    pub processor: Arc<dyn DocumentProcessor>,
    pub analyzer: Arc<dyn DocumentAnalyzer>,
    pub writer: Arc<dyn ResultsWriter>,
}

pub struct StageRunner {
    tracker: Arc<PipelineStateTracker>,
    sink: Arc<LogSink>,
    collaborators: Collaborators,
}

impl StageRunner {
    pub fn new(
        tracker: Arc<PipelineStateTracker>,
        sink: Arc<LogSink>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            tracker,
            sink,
            collaborators,
        }
    }

    /// 在后台任务中执行一次运行，调用方不需要等待返回的句柄
    ///
    /// 运行一旦开始就无法取消。调用前必须已经通过 `try_start` 进入 Running。
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(self.run()).catch_unwind().await;
            if let Err(payload) = outcome {
                let message = panic_message(payload.as_ref());
                self.sink
                    .error(format!("❌ 流水线异常终止: {}", message));
                self.tracker.set_failed(format!("流水线异常终止: {}", message));
            }
        })
    }

    /// 执行全部阶段并写入终态
    pub async fn run(&self) {
        let run_id = self
            .tracker
            .run_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        self.sink
            .info(format!("🚀 开始执行数据处理流水线 (运行 ID: {})", run_id));

        match self.run_stages().await {
            Ok(()) => {
                self.sink.info("🎉 全部阶段执行完成");
                self.tracker.set_completed();
            }
            Err(failed) => {
                self.tracker
                    .set_failed(format!("{} 阶段失败: {}", failed.stage, failed.detail));
            }
        }
    }

    async fn run_stages(&self) -> Result<(), StageResult> {
        let scraped = self
            .execute(Stage::Scrape, self.collaborators.scraper.scrape(), |o| {
                format!(
                    "新下载 {} 个文件，确认 {} 条检索记录",
                    o.downloaded.len(),
                    o.table.len()
                )
            })
            .await?;

        self.execute(Stage::Extract, self.collaborators.processor.process(), |o| {
            format!(
                "生成 {} 个文本文件，移除 {} 个重复 PDF，跳过 {} 个",
                o.extracted.len(),
                o.duplicates_removed,
                o.skipped
            )
        })
        .await?;

        let analyzer = Arc::clone(&self.collaborators.analyzer);
        let writer = Arc::clone(&self.collaborators.writer);
        let table = scraped.table;
        self.execute(
            Stage::Analyze,
            async move {
                let records = analyzer.analyze().await?;
                let path = writer.write(&records, &table).await?;
                Ok::<_, AppError>((records.len(), path))
            },
            |(count, path)| format!("分析 {} 个文档，结果已写入 {}", count, path.display()),
        )
        .await?;

        Ok(())
    }

    /// 执行单个阶段，把结果折叠进日志
    async fn execute<T, Fut>(
        &self,
        stage: Stage,
        work: Fut,
        describe: impl FnOnce(&T) -> String,
    ) -> Result<T, StageResult>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        self.tracker.enter_stage(stage);
        self.sink
            .info(format!("▶️ 阶段 {} 开始: {}", stage, stage.description()));

        let (result, value) = match work.await {
            Ok(value) => (StageResult::succeeded(stage, describe(&value)), Some(value)),
            Err(e) => (StageResult::failed(stage, e.to_string()), None),
        };
        self.record(&result);

        value.ok_or(result)
    }

    fn record(&self, result: &StageResult) {
        if result.success {
            self.sink
                .info(format!("✅ 阶段 {} 完成: {}", result.stage, result.detail));
        } else {
            self.sink
                .error(format!("❌ 阶段 {} 失败: {}", result.stage, result.detail));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "未知错误".to_string()
    }
}
