/// PDF 下载客户端
///
/// 复用浏览器会话的 Cookie，把页面上的 PDF 链接保存到下载目录
use std::path::PathBuf;

use reqwest::header::COOKIE;
use tracing::{debug, info};

use crate::error::{ApiError, AppError, AppResult};
use crate::utils::files::{clean_filename, unique_filename};

pub struct DownloadClient {
    http: reqwest::Client,
    folder: PathBuf,
}

impl DownloadClient {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            folder: folder.into(),
        }
    }

    /// 下载文件并返回保存路径
    ///
    /// 文件名会被清洗，并在重名时追加序号。
    pub async fn download(
        &self,
        url: &str,
        filename: &str,
        cookie_header: Option<&str>,
    ) -> AppResult<PathBuf> {
        let target_name = unique_filename(&self.folder, &clean_filename(filename));
        debug!("下载 {} → {}", url, target_name);

        let mut request = self.http.get(url);
        if let Some(cookie) = cookie_header.filter(|c| !c.is_empty()) {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let path = self.folder.join(&target_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

        info!("📄 PDF 已保存: {}", path.display());
        Ok(path)
    }
}
