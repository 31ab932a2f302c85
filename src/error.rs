use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 外部 HTTP 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// PDF 解析错误
    #[error("PDF错误: {0}")]
    Pdf(#[from] PdfError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {source}")]
    LaunchFailed { source: BoxError },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed { url: String, source: BoxError },
    /// 等待元素超时
    #[error("等待元素 {selector} 超时 ({seconds} 秒)")]
    ElementTimeout { selector: String, seconds: u64 },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed { source: BoxError },
}

/// 外部 HTTP 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("请求失败 ({endpoint}): {source}")]
    RequestFailed { endpoint: String, source: BoxError },
    /// 返回错误状态码
    #[error("返回错误响应 ({endpoint}): status={status}")]
    BadResponse { endpoint: String, status: u16 },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed { source: BoxError },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed { path: String, source: BoxError },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed { path: String, source: BoxError },
    /// 删除文件失败
    #[error("删除文件失败 ({path}): {source}")]
    DeleteFailed { path: String, source: BoxError },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed { path: String, source: BoxError },
    /// 表格写入失败
    #[error("表格写入失败 ({path}): {source}")]
    SpreadsheetFailed { path: String, source: BoxError },
}

/// PDF 解析错误
#[derive(Debug, Error)]
pub enum PdfError {
    /// 文本提取失败
    #[error("无法提取 {path} 的文本: {message}")]
    ExtractFailed { path: String, message: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 构建请求失败
    #[error("构建 LLM 请求失败: {source}")]
    RequestBuildFailed { source: BoxError },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed { model: String, source: BoxError },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必填配置缺失
    #[error("缺少必填配置: {name}")]
    MissingValue { name: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<async_openai::error::OpenAIError> for AppError {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        AppError::Llm(LlmError::RequestBuildFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建导航失败错误
    pub fn navigation_failed(
        url: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: source.into(),
        })
    }

    /// 创建 HTTP 请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
