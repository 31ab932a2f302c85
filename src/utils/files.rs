//! 文件名与目录辅助函数

use std::path::{Path, PathBuf};

/// 文件名中不允许出现的字符
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
/// 文件名最大长度（超过后截断主干部分）
const MAX_FILENAME_LEN: usize = 100;
const TRUNCATED_STEM_LEN: usize = 95;

/// 替换非法字符并限制长度
pub fn clean_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if cleaned.chars().count() <= MAX_FILENAME_LEN {
        return cleaned;
    }

    let (stem, ext) = split_extension(&cleaned);
    let stem: String = stem.chars().take(TRUNCATED_STEM_LEN).collect();
    format!("{}{}", stem, ext)
}

/// 拆分为 (主干, 扩展名)，扩展名包含点号
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => filename.split_at(idx),
        _ => (filename, ""),
    }
}

/// 在目录中生成不重复的文件名：`name.pdf` → `name_1.pdf` → `name_2.pdf` …
pub fn unique_filename(folder: &Path, base_filename: &str) -> String {
    if !folder.join(base_filename).exists() {
        return base_filename.to_string();
    }

    let (stem, ext) = split_extension(base_filename);
    (1..)
        .map(|counter| format!("{}_{}{}", stem, counter, ext))
        .find(|candidate| !folder.join(candidate).exists())
        .unwrap_or_else(|| base_filename.to_string())
}

/// 检索结果行对应的文件标识：首列的值，空时使用 `row_{i}_page_{p}`
pub fn row_identifier(row: &[String], row_index: usize, page_number: usize) -> String {
    match row.first().map(|s| s.trim()) {
        Some(first) if !first.is_empty() => clean_filename(first),
        _ => format!("row_{}_page_{}", row_index, page_number),
    }
}

/// 目录中是否已有该行对应的 PDF
pub fn pdf_exists_for_row(folder: &Path, row: &[String], row_index: usize, page_number: usize) -> bool {
    let identifier = row_identifier(row, row_index, page_number);
    list_files(folder, |name| is_pdf(name) && name.contains(&identifier))
        .map(|files| !files.is_empty())
        .unwrap_or(false)
}

pub fn is_pdf(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".pdf")
}

/// 列出目录中文件名满足条件的文件（按文件名排序）
pub fn list_files(folder: &Path, predicate: impl Fn(&str) -> bool) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(&predicate)
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 文件名（不含目录），无法转换时返回空串
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
