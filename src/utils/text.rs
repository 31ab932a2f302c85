//! 文本清洗与分块

use std::sync::OnceLock;

use phf::phf_map;
use regex::Regex;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// 无法加载分词器时按字符数切分的块大小
pub const FALLBACK_CHUNK_CHARS: usize = 4000;

/// 常见特殊字符的 ASCII 替换
static REPLACEMENTS: phf::Map<char, &'static str> = phf_map! {
    '€' => "EUR",
    '£' => "GBP",
    '$' => "USD",
    '°' => " degrees",
    '±' => "+/-",
    '×' => "x",
    '÷' => "/",
};

fn non_ascii_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x00-\x7F]+").expect("静态正则表达式"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("静态正则表达式"))
}

/// 规范化提取出的文本
///
/// 1. 替换货币、度数等符号
/// 2. 其余非 ASCII 字符替换为空格
/// 3. 合并空白
pub fn normalize_text(text: &str) -> String {
    let mut replaced = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.get(&c) {
            Some(replacement) => replaced.push_str(replacement),
            None => replaced.push(c),
        }
    }

    let ascii = non_ascii_re().replace_all(&replaced, " ");
    whitespace_re().replace_all(&ascii, " ").trim().to_string()
}

/// 去掉 LLM 回复中的 markdown 代码块标记
pub fn strip_code_fence(content: &str) -> &str {
    let mut content = content.trim();
    if let Some(rest) = content.strip_prefix("```json") {
        content = rest;
    } else if let Some(rest) = content.strip_prefix("```") {
        content = rest;
    }
    if let Some(rest) = content.strip_suffix("```") {
        content = rest;
    }
    content.trim()
}

/// 按 token 数切分文本
pub struct TextChunker {
    bpe: Option<CoreBPE>,
    max_tokens: usize,
}

impl TextChunker {
    /// 加载 cl100k_base 分词器，失败时退化为按字符切分
    pub fn new(max_tokens: usize) -> Self {
        let bpe = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(bpe),
            Err(e) => {
                warn!("加载分词器失败，改为按字符切分: {}", e);
                None
            }
        };
        Self { bpe, max_tokens }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        match &self.bpe {
            Some(bpe) => split_by_tokens(text, self.max_tokens, |s| {
                bpe.encode_with_special_tokens(s).len()
            }),
            None => split_by_chars(text, FALLBACK_CHUNK_CHARS),
        }
    }
}

/// 按单词累加 token 数，超过上限时开始新块
pub fn split_by_tokens(
    text: &str,
    max_tokens: usize,
    count_tokens: impl Fn(&str) -> usize,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    for word in text.split_whitespace() {
        let word_tokens = count_tokens(&format!(" {}", word));
        if !current.is_empty() && current_tokens + word_tokens > max_tokens {
            chunks.push(current.join(" "));
            current.clear();
            current_tokens = 0;
        }
        current.push(word);
        current_tokens += word_tokens;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

/// 按字符数切分（不会切断 UTF-8 字符）
pub fn split_by_chars(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
