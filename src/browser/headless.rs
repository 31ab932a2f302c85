use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult, BrowserError};

/// 容器/无头环境下需要的启动参数
const HEADLESS_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-blink-features=AutomationControlled",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-features=TranslateUI",
    "--disable-ipc-flooding-protection",
];

/// 一次抓取会话持有的浏览器
///
/// 事件循环在后台任务中运行，`close` 时一并结束。
pub struct HeadlessSession {
    browser: Browser,
    handler: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl HeadlessSession {
    /// 关闭浏览器并清理临时用户目录
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!("关闭浏览器失败: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
        if let Err(e) = tokio::fs::remove_dir_all(&self.user_data_dir).await {
            debug!("清理用户目录 {} 失败: {}", self.user_data_dir.display(), e);
        }
    }
}

/// 启动无头浏览器并打开指定 URL
///
/// 每次启动使用独立的用户数据目录，避免多次运行之间互相干扰。
pub async fn launch_headless_browser(
    url: &str,
    chrome_executable: Option<&str>,
) -> AppResult<(HeadlessSession, Page)> {
    info!("🚀 启动无头浏览器...");
    debug!("目标 URL: {}", url);

    let user_data_dir = std::env::temp_dir().join(format!(
        "chrome_user_data_{}",
        &Uuid::new_v4().simple().to_string()[..8]
    ));

    let mut builder = BrowserConfig::builder()
        .new_headless_mode()
        .user_data_dir(&user_data_dir)
        .args(HEADLESS_ARGS.to_vec());
    if let Some(path) = chrome_executable {
        builder = builder.chrome_executable(Path::new(path));
    }
    let config = builder.build().map_err(|message| {
        error!("配置无头浏览器失败: {}", message);
        BrowserError::ConfigurationFailed { message }
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handler = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let session = HeadlessSession {
        browser,
        handler,
        user_data_dir,
    };

    let opened = session.browser.new_page(url).await;
    let page = match opened {
        Ok(page) => page,
        Err(e) => {
            error!("打开页面 {} 失败: {}", url, e);
            session.close().await;
            return Err(AppError::navigation_failed(url, e));
        }
    };

    info!("✅ 无头浏览器已导航到: {}", url);
    Ok((session, page))
}
