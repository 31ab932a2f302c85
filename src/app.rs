use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{self, AppState};
use crate::clients::LlmClient;
use crate::config::Config;
use crate::pipeline::Collaborators;
use crate::services::{LoudounScraper, OpenAiAnalyzer, PdfTextProcessor, XlsxResultsWriter};
use crate::utils::logging::log_startup;

/// 应用主结构
pub struct App {
    config: Config,
    state: AppState,
}

impl App {
    /// 初始化应用：组装真实的协作者和共享状态
    pub fn initialize(config: Config) -> Self {
        log_startup(&config);
        let state = AppState::new(build_collaborators(&config));
        Self { config, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// 启动 HTTP 服务，直到进程退出
    pub async fn run(self) -> Result<()> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("无法监听 {}", address))?;
        info!("✅ 服务已启动: http://{}", address);

        axum::serve(listener, api::router(self.state))
            .await
            .context("HTTP 服务异常退出")?;
        Ok(())
    }
}

/// 按配置创建各阶段的真实实现
pub fn build_collaborators(config: &Config) -> Collaborators {
    let model = Arc::new(LlmClient::new(config));
    Collaborators {
        scraper: Arc::new(LoudounScraper::new(config)),
        processor: Arc::new(PdfTextProcessor::new(config)),
        analyzer: Arc::new(OpenAiAnalyzer::new(model, config)),
        writer: Arc::new(XlsxResultsWriter::new(config)),
    }
}
