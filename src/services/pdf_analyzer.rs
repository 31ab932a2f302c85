//! 文本分析服务 - 业务能力层
//!
//! 把 `*_searchable.txt` 分块交给 LLM，提取日期、所有人、地址和 APN/税号。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clients::ChatModel;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::record::{NO_TEXT, PARSE_ERROR};
use crate::models::{DeedInfo, DeedRecord};
use crate::pipeline::DocumentAnalyzer;
use crate::services::pdf_processor::{is_searchable_text, source_pdf_name};
use crate::utils::files::{file_name, list_files};
use crate::utils::logging::truncate_text;
use crate::utils::text::{strip_code_fence, TextChunker};

const SYSTEM_PROMPT: &str = "You are a data extraction specialist. Extract only the requested information and return it in valid JSON format.";

/// 构建单个文本块的提取提示词
pub fn build_extraction_prompt(document_name: &str, chunk: &str) -> String {
    format!(
        r#"Extract the following information from this PDF text chunk:
1. Owner Name (or Property Owner)
2. Property Address (full address)
3. Tax ID/APN (Assessment Parcel Number or Tax Identification Number)
4. Date (Sale Date, Deed Date, or any clearly labeled date in the document)

Return the information in JSON format like this:
{{
    "date": "2024-05-01",
    "owner_name": "John Doe",
    "address": "123 Main St, City, State ZIP",
    "apn_taxid": "123-456-789"
}}

If any information is not found, use "Not found" as the value.
Only extract information that is clearly present in the text.

PDF Name: {}
Text Content:
{}"#,
        document_name, chunk
    )
}

/// 解析 LLM 回复
///
/// 只有 JSON 语法错误时所有字段记为 "Error parsing response"；
/// 合法 JSON 但不是对象时按未找到处理。
pub fn parse_deed_reply(reply: &str) -> DeedInfo {
    let value = match serde_json::from_str::<Value>(strip_code_fence(reply)) {
        Ok(value) => value,
        Err(e) => {
            warn!("⚠️ 无法解析 LLM 回复: {} | {}", e, truncate_text(reply, 80));
            return DeedInfo::filled(PARSE_ERROR);
        }
    };

    if !value.is_object() {
        warn!("⚠️ LLM 回复不是 JSON 对象: {}", truncate_text(reply, 80));
        return DeedInfo::not_found();
    }
    serde_json::from_value(value).unwrap_or_else(|e| {
        warn!("⚠️ LLM 回复字段无法识别: {}", e);
        DeedInfo::not_found()
    })
}

/// 基于 LLM 的契约信息提取
pub struct OpenAiAnalyzer {
    model: Arc<dyn ChatModel>,
    chunker: TextChunker,
    folder: PathBuf,
}

impl OpenAiAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self::with_folder(model, &config.pdf_folder, config.chunk_max_tokens)
    }

    pub fn with_folder(
        model: Arc<dyn ChatModel>,
        folder: impl Into<PathBuf>,
        chunk_max_tokens: usize,
    ) -> Self {
        Self {
            model,
            chunker: TextChunker::new(chunk_max_tokens),
            folder: folder.into(),
        }
    }

    /// 分析单个文档的文本
    ///
    /// API 调用失败直接返回错误；单块回复解析失败只影响该块。
    pub async fn analyze_text(&self, document_name: &str, text: &str) -> AppResult<DeedInfo> {
        if text.trim().is_empty() {
            return Ok(DeedInfo::filled(NO_TEXT));
        }

        let chunks = self.chunker.split(text);
        let mut merged = DeedInfo::not_found();

        for (i, chunk) in chunks.iter().enumerate() {
            debug!("  处理第 {}/{} 块", i + 1, chunks.len());
            let prompt = build_extraction_prompt(document_name, chunk);
            let reply = self.model.chat(&prompt, Some(SYSTEM_PROMPT)).await?;
            merged.fill_missing_from(&parse_deed_reply(&reply));
        }

        Ok(merged)
    }

    async fn analyze_file(&self, path: &Path) -> AppResult<DeedRecord> {
        let name = source_pdf_name(&file_name(path));
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;

        let info = self.analyze_text(&name, &text).await?;
        Ok(DeedRecord::from_info(name, info))
    }
}

#[async_trait]
impl DocumentAnalyzer for OpenAiAnalyzer {
    async fn analyze(&self) -> AppResult<Vec<DeedRecord>> {
        let files = list_files(&self.folder, is_searchable_text)
            .map_err(|e| AppError::file_read_failed(self.folder.display().to_string(), e))?;

        if files.is_empty() {
            warn!("⚠️ 没有找到可分析的文本文件");
            return Ok(Vec::new());
        }
        info!("🤖 共 {} 个文本文件待分析", files.len());

        let mut records = Vec::with_capacity(files.len());
        for path in files {
            info!("🔍 分析 {}", file_name(&path));
            let record = self.analyze_file(&path).await?;
            info!("✅ 完成 {}", record.pdf_name);
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::models::record::NOT_FOUND;
    use std::sync::Mutex;

    /// 按顺序返回预设回复的假模型
    struct ScriptedModel {
        replies: Mutex<Vec<AppResult<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            let mut replies = replies;
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, user_message: &str, system_message: Option<&str>) -> AppResult<String> {
            assert_eq!(system_message, Some(SYSTEM_PROMPT));
            self.prompts.lock().unwrap().push(user_message.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    #[test]
    fn test_parse_reply_with_code_fence() {
        let reply = "```json\n{\"date\": \"2024-05-01\", \"owner_name\": \"Jane Roe\"}\n```";
        let info = parse_deed_reply(reply);
        assert_eq!(info.date, "2024-05-01");
        assert_eq!(info.owner_name, "Jane Roe");
        assert_eq!(info.address, NOT_FOUND);
    }

    #[test]
    fn test_parse_reply_garbage() {
        let info = parse_deed_reply("I could not find anything.");
        assert_eq!(info, DeedInfo::filled(PARSE_ERROR));
    }

    #[test]
    fn test_parse_reply_with_null_field() {
        let info = parse_deed_reply(
            r#"{"date":"2024-05-01","owner_name":"Jane Roe","address":null,"apn_taxid":"123-456-789"}"#,
        );
        assert_eq!(info.date, "2024-05-01");
        assert_eq!(info.owner_name, "Jane Roe");
        assert_eq!(info.address, NOT_FOUND);
        assert_eq!(info.apn_taxid, "123-456-789");
    }

    #[test]
    fn test_parse_reply_not_an_object() {
        assert_eq!(parse_deed_reply("[1, 2]"), DeedInfo::not_found());
    }

    #[test]
    fn test_null_fields_do_not_block_later_chunks() {
        let mut merged = DeedInfo::not_found();
        merged.fill_missing_from(&parse_deed_reply(
            r#"{"date":null,"owner_name":"Jane Roe","address":null,"apn_taxid":null}"#,
        ));
        merged.fill_missing_from(&parse_deed_reply(
            r#"{"date":"2024-05-01","owner_name":"John Doe","address":"1 Main St","apn_taxid":"42"}"#,
        ));

        assert_eq!(merged.date, "2024-05-01");
        assert_eq!(merged.owner_name, "Jane Roe");
        assert_eq!(merged.address, "1 Main St");
        assert_eq!(merged.apn_taxid, "42");
    }

    #[tokio::test]
    async fn test_multi_chunk_merge_through_model() {
        let model = ScriptedModel::new(vec![
            Ok(r#"{"date": null, "owner_name": "Jane Roe", "address": null, "apn_taxid": null}"#
                .to_string()),
            Ok(r#"```json
{"date": "2024-05-01", "owner_name": "Other", "address": "1 Main St", "apn_taxid": "123-456"}
```"#
                .to_string()),
        ]);
        // 每块最多 1 个 token，两个单词必然分成两块
        let analyzer = OpenAiAnalyzer::with_folder(model.clone(), "unused", 1);

        let info = analyzer
            .analyze_text("deed.pdf", "grantor grantee")
            .await
            .unwrap();
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
        assert_eq!(info.date, "2024-05-01");
        assert_eq!(info.owner_name, "Jane Roe");
        assert_eq!(info.address, "1 Main St");
        assert_eq!(info.apn_taxid, "123-456");
    }

    #[test]
    fn test_prompt_contains_document_and_chunk() {
        let prompt = build_extraction_prompt("deed_searchable.txt", "GRANTOR John Doe");
        assert!(prompt.contains("PDF Name: deed_searchable.txt"));
        assert!(prompt.contains("GRANTOR John Doe"));
        assert!(prompt.contains("\"apn_taxid\": \"123-456-789\""));
    }

    #[tokio::test]
    async fn test_empty_text_skips_model() {
        let model = ScriptedModel::new(vec![]);
        let analyzer = OpenAiAnalyzer::with_folder(model.clone(), "unused", 2000);

        let info = analyzer.analyze_text("empty_searchable.txt", "   ").await.unwrap();
        assert_eq!(info, DeedInfo::filled(NO_TEXT));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_analyze_folder_builds_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a_searchable.txt"),
            "Deed of gift recorded for parcel 123-456-789",
        )
        .unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"pdf").unwrap();

        let model = ScriptedModel::new(vec![Ok(
            r#"{"date": "2024-05-01", "owner_name": "Jane Roe", "address": "1 Main St", "apn_taxid": "123-456-789"}"#
                .to_string(),
        )]);
        let analyzer = OpenAiAnalyzer::with_folder(model.clone(), dir.path(), 2000);

        let records = analyzer.analyze().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pdf_name, "a.pdf");
        assert_eq!(records[0].owner_name, "Jane Roe");
        assert_eq!(records[0].apn_taxid, "123456789");
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_api_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_searchable.txt"), "some deed text").unwrap();

        let model = ScriptedModel::new(vec![Err(LlmError::EmptyContent {
            model: "gpt-4".to_string(),
        }
        .into())]);
        let analyzer = OpenAiAnalyzer::with_folder(model, dir.path(), 2000);

        assert!(analyzer.analyze().await.is_err());
    }
}
