//! 检索抓取服务 - 业务能力层
//!
//! 登录 Loudoun 土地记录系统，按日期范围检索契约，逐行打开文档并下载 PDF。
//! 单行失败只记录警告，登录/检索等整体失败才向上返回错误。

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::launch_headless_browser;
use crate::clients::DownloadClient;
use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError};
use crate::infrastructure::{JsExecutor, Locator};
use crate::models::ScrapedTable;
use crate::pipeline::{DocumentScraper, ScrapeOutcome};
use crate::utils::files::{clean_filename, pdf_exists_for_row};

const USERNAME_INPUT: &str = "#txtUsername";
const PASSWORD_INPUT: &str = "#txtPassword";
const LOGIN_BUTTON: &str = "#btnLogin";
const ADVANCED_SEARCH_BUTTON: &str = "#btnCriteriaAdvancedNameSearch";
const DEEDS_EXPAND_ICON: &str =
    "//a[@id='cat2_anchor']/preceding-sibling::i[contains(@class, 'jstree-ocl')]";
const DATE_FROM_INPUT: &str = "#dtFrom";
const DATE_TO_INPUT: &str = "#dtTo";
const SUMMARY_SEARCH_BUTTON: &str = "#btnSummarySearch";
const RESULTS_TABLE: &str = "//table[@id='gridResults']";
const RESULTS_ROWS: &str = "#gridResults tbody tr";
const NEXT_BUTTON: &str = "#gridResults_next";
const VIEWER_CONTAINER: &str = "#viewerContainer";
const VIEWER_PAGE: &str = "#viewerContainer .page";
const VIEWER_CANVAS: &str = "#viewerContainer canvas";
const SAVE_IMAGE_LINK: &str = "#lnkSaveImage";

/// 页面上的 PDF 链接
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PdfLink {
    pub href: String,
    #[serde(default)]
    pub text: String,
}

/// 检索日期范围：上个月 1 日至今天
pub fn search_date_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_of_month = today.with_day(1).unwrap_or(today);
    let first_of_previous = first_of_month
        .pred_opt()
        .and_then(|d| d.with_day(1))
        .unwrap_or(first_of_month);
    (first_of_previous, today)
}

/// 由链接生成文件名：优先使用链接文字，否则取 URL 路径最后一段
pub fn link_filename(link: &PdfLink) -> String {
    let base = if !link.text.trim().is_empty() {
        link.text.trim().to_string()
    } else {
        reqwest::Url::parse(&link.href)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string())
    };

    let name = if base.to_ascii_lowercase().ends_with(".pdf") {
        base
    } else {
        format!("{}.pdf", base)
    };
    clean_filename(&name)
}

/// "Save Image" 下载的文件名
pub fn saved_image_filename(row_index: usize, page_number: usize, timestamp: &str) -> String {
    format!(
        "row_{}_page_{}_saved_image_{}.pdf",
        row_index, page_number, timestamp
    )
}

/// Loudoun 土地记录抓取服务
pub struct LoudounScraper {
    config: Config,
}

impl LoudounScraper {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn folder(&self) -> &Path {
        Path::new(&self.config.pdf_folder)
    }

    async fn login(&self, executor: &JsExecutor) -> AppResult<()> {
        info!("🔐 登录 {}", self.config.login_url);
        executor
            .wait_for(Locator::Css(USERNAME_INPUT))
            .await
            .map_err(|e| AppError::navigation_failed(&self.config.login_url, e.to_string()))?;
        executor
            .fill(Locator::Css(USERNAME_INPUT), &self.config.username)
            .await?;
        executor
            .fill(Locator::Css(PASSWORD_INPUT), &self.config.password)
            .await?;
        executor.click(Locator::Css(LOGIN_BUTTON)).await?;

        // 等待登录后的跳转开始
        sleep(Duration::from_secs(2)).await;
        Ok(())
    }

    async fn open_search(&self, executor: &JsExecutor) -> AppResult<Vec<String>> {
        executor.goto(&self.config.search_url).await?;
        executor.click(Locator::Css(ADVANCED_SEARCH_BUTTON)).await?;

        // 展开 DEEDS 分类并勾选子类型
        executor.click(Locator::XPath(DEEDS_EXPAND_ICON)).await?;
        for xpath in &self.config.deed_type_xpaths {
            executor.click(Locator::XPath(xpath)).await?;
        }

        let (from, to) = search_date_range(Local::now().date_naive());
        info!("📅 检索日期范围: {} ~ {}", from, to);
        executor
            .fill(Locator::Css(DATE_FROM_INPUT), &from.format("%m/%d/%Y").to_string())
            .await?;
        executor
            .fill(Locator::Css(DATE_TO_INPUT), &to.format("%m/%d/%Y").to_string())
            .await?;

        executor.click(Locator::Css(SUMMARY_SEARCH_BUTTON)).await?;
        executor.wait_for(Locator::XPath(RESULTS_TABLE)).await?;

        executor
            .eval_as(
                "Array.from(document.querySelectorAll('#gridResults thead th'))\
                 .map(th => (th.textContent || '').trim())",
            )
            .await
    }

    async fn read_rows(&self, executor: &JsExecutor) -> AppResult<Vec<Vec<String>>> {
        executor.wait_for_visible(Locator::Css(RESULTS_ROWS)).await?;
        executor
            .eval_as(
                "Array.from(document.querySelectorAll('#gridResults tbody tr'))\
                 .map(tr => Array.from(tr.querySelectorAll('td')).map(td => (td.innerText || '').trim()))",
            )
            .await
    }

    async fn find_pdf_links(&self, executor: &JsExecutor) -> AppResult<Vec<PdfLink>> {
        executor
            .eval_as(
                "Array.from(document.querySelectorAll('a[href]'))\
                 .filter(a => a.href.toLowerCase().includes('pdf'))\
                 .map(a => ({ href: a.href, text: (a.textContent || '').trim() }))",
            )
            .await
    }

    /// 打开单行对应的文档并下载所有可见的 PDF
    async fn process_row(
        &self,
        executor: &JsExecutor,
        downloader: &DownloadClient,
        row_index: usize,
        page_number: usize,
    ) -> AppResult<Vec<PathBuf>> {
        executor
            .eval(format!(
                "(() => {{ const tr = document.querySelectorAll('{}')[{}]; \
                 tr.dispatchEvent(new MouseEvent('dblclick', {{ bubbles: true }})); return true; }})()",
                RESULTS_ROWS,
                row_index - 1
            ))
            .await?;
        debug!("🖱️ 双击第 {} 页第 {} 行", page_number, row_index);

        // 查看器加载失败时继续尝试下载
        match executor.wait_for(Locator::Css(VIEWER_CONTAINER)).await {
            Ok(()) => {
                if let Err(e) = executor.wait_for(Locator::Css(VIEWER_PAGE)).await {
                    warn!("⚠️ 第 {} 行文档内容未加载: {}", row_index, e);
                } else if executor.wait_for(Locator::Css(VIEWER_CANVAS)).await.is_err() {
                    debug!("第 {} 行未找到 canvas，继续", row_index);
                }
                sleep(Duration::from_secs(3)).await;
            }
            Err(e) => warn!("⚠️ 第 {} 行未找到文档查看器: {}", row_index, e),
        }

        let cookies = executor.cookie_header().await.unwrap_or_default();
        let mut downloaded = Vec::new();

        for link in self.find_pdf_links(executor).await? {
            match downloader
                .download(&link.href, &link_filename(&link), Some(&cookies))
                .await
            {
                Ok(path) => downloaded.push(path),
                Err(e) => warn!("❌ 下载 PDF 失败 {}: {}", link.href, e),
            }
        }

        if executor.exists(Locator::Css(SAVE_IMAGE_LINK)).await? {
            executor.click(Locator::Css(SAVE_IMAGE_LINK)).await?;
            debug!("💾 点击第 {} 行的 Save Image", row_index);
            sleep(Duration::from_secs(2)).await;

            for link in self.find_pdf_links(executor).await? {
                let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
                let filename = saved_image_filename(row_index, page_number, &timestamp);
                match downloader
                    .download(&link.href, &filename, Some(&cookies))
                    .await
                {
                    Ok(path) => downloaded.push(path),
                    Err(e) => warn!("❌ 下载 Save Image PDF 失败 {}: {}", link.href, e),
                }
            }
        } else {
            warn!("⚠️ 第 {} 行未找到 Save Image 链接", row_index);
        }

        sleep(Duration::from_secs(1)).await;
        Ok(downloaded)
    }

    /// 翻到下一页，没有下一页时返回 false
    async fn next_page(&self, executor: &JsExecutor) -> AppResult<bool> {
        let state: Option<String> = executor
            .eval_as(format!(
                "(() => {{ const el = document.querySelector('{}'); return el ? (el.className || '') : null; }})()",
                NEXT_BUTTON
            ))
            .await?;

        let class_name = match state {
            Some(class_name) => class_name,
            None => {
                info!("🏁 没有找到下一页按钮，视为单页结果");
                return Ok(false);
            }
        };
        if class_name.contains("disabled") {
            info!("🏁 下一页按钮已禁用，检索结果结束");
            return Ok(false);
        }

        // 给当前第一行打标记，标记消失即表示表格已刷新
        executor
            .eval(format!(
                "(() => {{ const tr = document.querySelector('{}'); if (tr) tr.dataset.scraped = '1'; return true; }})()",
                RESULTS_ROWS
            ))
            .await?;
        executor.click(Locator::Css(NEXT_BUTTON)).await?;
        executor
            .wait_until(
                &format!(
                    "(() => {{ const tr = document.querySelector('{}'); return tr !== null && tr.dataset.scraped !== '1'; }})()",
                    RESULTS_ROWS
                ),
                "下一页结果",
            )
            .await?;
        Ok(true)
    }

    async fn scrape_with(&self, executor: &JsExecutor) -> AppResult<ScrapeOutcome> {
        self.login(executor).await?;
        let headers = self.open_search(executor).await?;
        let downloader = DownloadClient::new(self.folder());

        let mut outcome = ScrapeOutcome {
            downloaded: Vec::new(),
            table: ScrapedTable::new(headers),
        };
        let mut page_number = 1;

        info!("🔍 开始抓取数据并下载 PDF...");
        loop {
            let rows = self.read_rows(executor).await?;
            info!("📄 第 {} 页共 {} 行", page_number, rows.len());

            for (idx, row) in rows.into_iter().enumerate() {
                let row_index = idx + 1;
                if pdf_exists_for_row(self.folder(), &row, row_index, page_number) {
                    debug!("⏩ 第 {} 页第 {} 行的 PDF 已存在，跳过", page_number, row_index);
                    continue;
                }

                match self
                    .process_row(executor, &downloader, row_index, page_number)
                    .await
                {
                    Ok(paths) => outcome.downloaded.extend(paths),
                    Err(e) => {
                        warn!("❌ 处理第 {} 页第 {} 行失败: {}", page_number, row_index, e);
                        continue;
                    }
                }

                if pdf_exists_for_row(self.folder(), &row, row_index, page_number) {
                    outcome.table.rows.push(row);
                }
            }

            if !self.next_page(executor).await? {
                break;
            }
            page_number += 1;
        }

        info!(
            "📈 共确认 {} 行，新下载 {} 个文件",
            outcome.table.len(),
            outcome.downloaded.len()
        );
        Ok(outcome)
    }
}

#[async_trait]
impl DocumentScraper for LoudounScraper {
    async fn scrape(&self) -> AppResult<ScrapeOutcome> {
        if self.config.username.is_empty() || self.config.password.is_empty() {
            return Err(ConfigError::MissingValue {
                name: "LOUDOUN_USERNAME / LOUDOUN_PASSWORD".to_string(),
            }
            .into());
        }

        tokio::fs::create_dir_all(self.folder())
            .await
            .map_err(|e| AppError::file_write_failed(&self.config.pdf_folder, e))?;

        let (session, page) = launch_headless_browser(
            &self.config.login_url,
            self.config.chrome_executable.as_deref(),
        )
        .await?;
        let executor = JsExecutor::new(page, Duration::from_secs(self.config.browser_wait_secs));

        let result = self.scrape_with(&executor).await;
        session.close().await;
        result
    }
}
