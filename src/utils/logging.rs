/// 日志工具模块
///
/// 提供启动横幅和文本截断等辅助函数
use tracing::info;

use crate::config::Config;

/// 记录服务启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 Loudoun 数据处理服务启动");
    info!("🌐 监听地址: {}", config.bind_address());
    info!("📁 PDF 目录: {}", config.pdf_folder);
    info!("📊 结果表格: {}", config.results_file);
    info!("🤖 LLM 模型: {}", config.llm_model_name);
    if config.username.is_empty() || config.password.is_empty() {
        info!("⚠️ 未配置站点账号，抓取阶段将无法登录");
    }
    if config.llm_api_key.is_empty() {
        info!("⚠️ 未配置 OPENAI_API_KEY，分析阶段将无法调用 LLM");
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("abc", 3), "abc");
        assert_eq!(truncate_text("契约文件", 2), "契约...");
    }
}
