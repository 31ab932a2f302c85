//! 程序配置
//!
//! 加载顺序：默认值 → TOML 文件（可选）→ 环境变量。
//! `.env` 文件会在读取环境变量前通过 dotenvy 加载。

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppResult, ConfigError, FileError};

/// 默认的 TOML 配置文件路径
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- HTTP 服务 ---
    pub server_host: String,
    pub server_port: u16,
    // --- 目标站点 ---
    /// 登录页 URL
    pub login_url: String,
    /// 检索页 URL
    pub search_url: String,
    pub username: String,
    pub password: String,
    /// 需要勾选的契约子类型（树节点的 XPath）
    pub deed_type_xpaths: Vec<String>,
    // --- 浏览器 ---
    /// 浏览器可执行文件路径，为空时由 chromiumoxide 自动探测
    pub chrome_executable: Option<String>,
    /// 等待页面元素的超时秒数
    pub browser_wait_secs: u64,
    // --- 文件 ---
    /// PDF 下载目录
    pub pdf_folder: String,
    /// 结果表格路径
    pub results_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    /// 单个文本块的最大 token 数
    pub chunk_max_tokens: usize,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            login_url: "https://lisweb.loudoun.gov/PAXSubscription/".to_string(),
            search_url: "https://lisweb.loudoun.gov/PAXSubscription/views/search".to_string(),
            username: String::new(),
            password: String::new(),
            deed_type_xpaths: vec![
                "/html/body/form/div[4]/div[5]/div[2]/div[1]/div/div[3]/div[2]/div/div/ul/li[2]/ul/li[41]/a".to_string(),
                "/html/body/form/div[4]/div[5]/div[2]/div[1]/div/div[3]/div[2]/div/div/ul/li[2]/ul/li[60]/a".to_string(),
            ],
            chrome_executable: None,
            browser_wait_secs: 20,
            pdf_folder: "loudoun_pdf".to_string(),
            results_file: "loudoun_results.xlsx".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4".to_string(),
            llm_max_tokens: 500,
            llm_temperature: 0.1,
            chunk_max_tokens: 2000,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载完整配置（.env + TOML + 环境变量）
    pub fn load() -> AppResult<Self> {
        let _ = dotenvy::dotenv();

        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let base = Self::from_toml_file(Path::new(&config_file))?;
        base.with_env_overrides()
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，文件不存在时返回默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!("配置文件 {} 不存在，使用默认配置", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Self = toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        info!("✓ 已加载配置文件: {}", path.display());
        Ok(config)
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(mut self) -> AppResult<Self> {
        override_string("SERVER_HOST", &mut self.server_host);
        override_parsed("SERVER_PORT", &mut self.server_port, "u16")?;
        override_string("LOGIN_URL", &mut self.login_url);
        override_string("SEARCH_URL", &mut self.search_url);
        override_string("LOUDOUN_USERNAME", &mut self.username);
        override_string("LOUDOUN_PASSWORD", &mut self.password);
        if let Ok(path) = std::env::var("CHROME_EXECUTABLE") {
            self.chrome_executable = Some(path);
        }
        override_parsed("BROWSER_WAIT_SECS", &mut self.browser_wait_secs, "u64")?;
        override_string("PDF_FOLDER", &mut self.pdf_folder);
        override_string("RESULTS_FILE", &mut self.results_file);
        override_string("OPENAI_API_KEY", &mut self.llm_api_key);
        override_string("OPENAI_API_BASE", &mut self.llm_api_base_url);
        override_string("OPENAI_MODEL", &mut self.llm_model_name);
        override_parsed("CHUNK_MAX_TOKENS", &mut self.chunk_max_tokens, "usize")?;
        override_parsed("VERBOSE_LOGGING", &mut self.verbose_logging, "bool")?;
        Ok(self)
    }

    /// HTTP 监听地址
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn override_string(var_name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(var_name) {
        *target = value;
    }
}

fn override_parsed<T: FromStr>(
    var_name: &str,
    target: &mut T,
    expected_type: &str,
) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(var_name) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value: value.clone(),
                expected_type: expected_type.to_string(),
            })?;
    }
    Ok(())
}
