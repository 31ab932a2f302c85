//! PDF 文本提取服务 - 业务能力层
//!
//! 负责下载目录的整理：删除内容重复的 PDF，并为每个 PDF 生成 `<stem>_searchable.txt`。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, FileError, PdfError};
use crate::pipeline::{DocumentProcessor, ExtractOutcome};
use crate::utils::files::{file_name, is_pdf, list_files};
use crate::utils::text::normalize_text;

/// 文本文件后缀
pub const SEARCHABLE_SUFFIX: &str = "_searchable.txt";

/// PDF 对应的文本文件路径
pub fn searchable_path(pdf_path: &Path) -> PathBuf {
    let stem = pdf_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    pdf_path.with_file_name(format!("{}{}", stem, SEARCHABLE_SUFFIX))
}

pub fn is_searchable_text(name: &str) -> bool {
    name.ends_with(SEARCHABLE_SUFFIX)
}

/// 文本文件对应的原始 PDF 文件名
pub fn source_pdf_name(text_name: &str) -> String {
    match text_name.strip_suffix(SEARCHABLE_SUFFIX) {
        Some(stem) => format!("{}.pdf", stem),
        None => text_name.to_string(),
    }
}

/// 计算文件内容的 SHA-256
fn file_digest(path: &Path) -> AppResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// 按内容分组，无法读取的文件跳过
fn group_by_digest(pdfs: Vec<PathBuf>) -> HashMap<String, Vec<PathBuf>> {
    let mut groups: HashMap<String, Vec<PathBuf>> = HashMap::new();
    for pdf in pdfs {
        match file_digest(&pdf) {
            Ok(digest) => groups.entry(digest).or_default().push(pdf),
            Err(e) => warn!("⚠️ 跳过无法读取的 PDF: {}", e),
        }
    }
    groups
}

/// 每组保留文件名最短的一个，返回实际删除的文件数
fn remove_duplicates(groups: HashMap<String, Vec<PathBuf>>) -> usize {
    let mut removed = 0;
    for mut files in groups.into_values().filter(|g| g.len() > 1) {
        // 文件名最短者优先，长度相同按名称排序
        files.sort_by_key(|p| {
            let name = file_name(p);
            (name.chars().count(), name)
        });
        let keep = file_name(&files[0]);
        for duplicate in &files[1..] {
            match std::fs::remove_file(duplicate) {
                Ok(()) => {
                    debug!("🗑️ 删除重复 PDF {}（保留 {}）", file_name(duplicate), keep);
                    removed += 1;
                }
                Err(e) => {
                    let err = FileError::DeleteFailed {
                        path: duplicate.display().to_string(),
                        source: Box::new(e),
                    };
                    warn!("⚠️ {}", err);
                }
            }
        }
    }
    removed
}

/// 删除内容相同的 PDF，每组保留文件名最短的一个
///
/// 只有目录无法读取时返回错误；单个文件读取或删除失败只记录警告。
pub fn remove_duplicate_pdfs(folder: &Path) -> AppResult<usize> {
    let pdfs = list_files(folder, is_pdf)
        .map_err(|e| AppError::file_read_failed(folder.display().to_string(), e))?;

    let removed = remove_duplicates(group_by_digest(pdfs));
    if removed > 0 {
        info!("🗑️ 共删除 {} 个重复 PDF", removed);
    }
    Ok(removed)
}

/// 提取 PDF 文本层
///
/// 解析库在损坏文件上可能 panic，因此放在阻塞线程中执行并把 panic 视为解析失败。
async fn extract_pdf_text(path: &Path) -> AppResult<String> {
    let owned = path.to_path_buf();
    let joined = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned)).await;

    let display = path.display().to_string();
    match joined {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(PdfError::ExtractFailed {
            path: display,
            message: e.to_string(),
        }
        .into()),
        Err(e) => Err(PdfError::ExtractFailed {
            path: display,
            message: format!("解析线程异常: {}", e),
        }
        .into()),
    }
}

/// PDF 去重与文本提取
pub struct PdfTextProcessor {
    folder: PathBuf,
}

impl PdfTextProcessor {
    pub fn new(config: &Config) -> Self {
        Self::with_folder(&config.pdf_folder)
    }

    pub fn with_folder(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

#[async_trait]
impl DocumentProcessor for PdfTextProcessor {
    async fn process(&self) -> AppResult<ExtractOutcome> {
        tokio::fs::create_dir_all(&self.folder)
            .await
            .map_err(|e| AppError::file_write_failed(self.folder.display().to_string(), e))?;

        // 读取和哈希整份 PDF 是阻塞操作
        let folder = self.folder.clone();
        let duplicates_removed = tokio::task::spawn_blocking(move || remove_duplicate_pdfs(&folder))
            .await
            .map_err(|e| AppError::Other(format!("去重线程异常: {}", e)))??;

        let mut outcome = ExtractOutcome {
            duplicates_removed,
            ..ExtractOutcome::default()
        };

        let pdfs = list_files(&self.folder, is_pdf)
            .map_err(|e| AppError::file_read_failed(self.folder.display().to_string(), e))?;
        info!("📚 找到 {} 个 PDF", pdfs.len());

        for pdf in pdfs {
            let target = searchable_path(&pdf);
            if target.exists() {
                debug!("⏩ 已有文本文件，跳过 {}", file_name(&pdf));
                continue;
            }

            let text = match extract_pdf_text(&pdf).await {
                Ok(text) => normalize_text(&text),
                Err(e) => {
                    warn!("⚠️ {}", e);
                    outcome.skipped += 1;
                    continue;
                }
            };

            tokio::fs::write(&target, text)
                .await
                .map_err(|e| AppError::file_write_failed(target.display().to_string(), e))?;
            info!("📝 已生成 {}", file_name(&target));
            outcome.extracted.push(target);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_searchable_path() {
        let path = searchable_path(Path::new("/data/deed 1.pdf"));
        assert_eq!(path, PathBuf::from("/data/deed 1_searchable.txt"));
        assert!(is_searchable_text("deed 1_searchable.txt"));
        assert!(!is_searchable_text("deed 1.pdf"));
    }

    #[test]
    fn test_source_pdf_name() {
        assert_eq!(source_pdf_name("deed 1_searchable.txt"), "deed 1.pdf");
        assert_eq!(source_pdf_name("notes.txt"), "notes.txt");
    }

    #[test]
    fn test_unreadable_pdf_is_left_out_of_grouping() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let groups = group_by_digest(vec![a, dir.path().join("vanished.pdf"), b]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups.values().next().unwrap().len(), 2);
    }

    #[test]
    fn test_failed_delete_is_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let keep = dir.path().join("deed.pdf");
        std::fs::write(&keep, b"same bytes").unwrap();

        let mut groups = HashMap::new();
        groups.insert(
            "digest".to_string(),
            vec![dir.path().join("deed_already_gone.pdf"), keep.clone()],
        );

        assert_eq!(remove_duplicates(groups), 0);
        assert!(keep.exists());
    }

    #[test]
    fn test_remove_duplicates_keeps_shortest_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deed.pdf"), b"same bytes").unwrap();
        std::fs::write(dir.path().join("deed_1.pdf"), b"same bytes").unwrap();
        std::fs::write(dir.path().join("other.pdf"), b"different").unwrap();

        let removed = tokio_test::assert_ok!(remove_duplicate_pdfs(dir.path()));
        assert_eq!(removed, 1);
        assert!(dir.path().join("deed.pdf").exists());
        assert!(!dir.path().join("deed_1.pdf").exists());
        assert!(dir.path().join("other.pdf").exists());
    }

    #[tokio::test]
    async fn test_existing_text_is_not_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deed.pdf"), b"not really a pdf").unwrap();
        std::fs::write(dir.path().join("deed_searchable.txt"), "already done").unwrap();

        let outcome = PdfTextProcessor::with_folder(dir.path())
            .process()
            .await
            .unwrap();
        assert!(outcome.extracted.is_empty());
        assert_eq!(outcome.skipped, 0);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("deed_searchable.txt")).unwrap(),
            "already done"
        );
    }

    #[tokio::test]
    async fn test_unparsable_pdf_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pdf"), b"garbage").unwrap();

        let outcome = PdfTextProcessor::with_folder(dir.path())
            .process()
            .await
            .unwrap();
        assert_eq!(outcome.skipped, 1);
        assert!(!dir.path().join("broken_searchable.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_folder_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("pdfs");

        let outcome = PdfTextProcessor::with_folder(&folder).process().await.unwrap();
        assert!(folder.is_dir());
        assert_eq!(outcome.duplicates_removed, 0);
    }
}
