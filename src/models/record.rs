use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 字段缺失时 LLM 约定返回的占位值
pub const NOT_FOUND: &str = "Not found";
/// LLM 回复无法解析时的占位值
pub const PARSE_ERROR: &str = "Error parsing response";
/// PDF 中没有可用文本时的占位值
pub const NO_TEXT: &str = "No text extracted";

/// 检索结果表格（只保留已确认下载到 PDF 的行）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ScrapedTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// 从单个文本块中提取到的契约信息
///
/// LLM 可能省略字段或返回 null，这些字段按 "Not found" 处理。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeedInfo {
    #[serde(default = "not_found", deserialize_with = "lenient_field")]
    pub date: String,
    #[serde(default = "not_found", deserialize_with = "lenient_field")]
    pub owner_name: String,
    #[serde(default = "not_found", deserialize_with = "lenient_field")]
    pub address: String,
    #[serde(default = "not_found", deserialize_with = "lenient_field")]
    pub apn_taxid: String,
}

fn not_found() -> String {
    NOT_FOUND.to_string()
}

/// 字符串原样保留，数字转为文本，null/空串/其他类型视为未找到
fn lenient_field<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => not_found(),
    })
}

impl DeedInfo {
    /// 所有字段填同一个占位值
    pub fn filled(value: &str) -> Self {
        Self {
            date: value.to_string(),
            owner_name: value.to_string(),
            address: value.to_string(),
            apn_taxid: value.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self::filled(NOT_FOUND)
    }

    /// 用 `other` 补齐仍为 "Not found" 的字段（先到先得）
    pub fn fill_missing_from(&mut self, other: &DeedInfo) {
        fn fill(target: &mut String, candidate: &str) {
            if target == NOT_FOUND && candidate != NOT_FOUND {
                *target = candidate.to_string();
            }
        }
        fill(&mut self.date, &other.date);
        fill(&mut self.owner_name, &other.owner_name);
        fill(&mut self.address, &other.address);
        fill(&mut self.apn_taxid, &other.apn_taxid);
    }
}

/// 单个文档的分析结果，对应结果表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeedRecord {
    pub pdf_name: String,
    pub date: String,
    pub owner_name: String,
    pub address: String,
    pub apn_taxid: String,
}

impl DeedRecord {
    pub const HEADERS: [&'static str; 5] = ["pdf_name", "date", "owner_name", "address", "apn_taxid"];

    pub fn from_info(pdf_name: impl Into<String>, info: DeedInfo) -> Self {
        Self {
            pdf_name: pdf_name.into(),
            date: info.date,
            owner_name: info.owner_name,
            address: info.address,
            apn_taxid: clean_apn_taxid(&info.apn_taxid),
        }
    }

    pub fn cells(&self) -> [&str; 5] {
        [
            &self.pdf_name,
            &self.date,
            &self.owner_name,
            &self.address,
            &self.apn_taxid,
        ]
    }
}

/// 只保留 APN / 税号中的数字；没有数字时原样返回
pub fn clean_apn_taxid(apn: &str) -> String {
    let digits: String = apn.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        apn.to_string()
    } else {
        digits
    }
}
