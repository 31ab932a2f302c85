//! 结果表格写入

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::info;

use crate::config::Config;
use crate::error::{AppResult, FileError};
use crate::models::{DeedRecord, ScrapedTable};
use crate::pipeline::ResultsWriter;

pub const ANALYSIS_SHEET: &str = "Analysis";
pub const SEARCH_RESULTS_SHEET: &str = "Search Results";

fn write_rows<'h, 'r>(
    workbook: &mut Workbook,
    sheet_name: &str,
    headers: impl IntoIterator<Item = &'h str>,
    rows: impl IntoIterator<Item = Vec<&'r str>>,
    header_format: &Format,
) -> Result<(), XlsxError> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    for (col, header) in headers.into_iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, header_format)?;
    }
    for (row, cells) in rows.into_iter().enumerate() {
        for (col, cell) in cells.into_iter().enumerate() {
            sheet.write_string(row as u32 + 1, col as u16, cell)?;
        }
    }
    Ok(())
}

/// 生成包含分析结果和检索结果两个工作表的工作簿
pub fn write_workbook(
    path: &Path,
    records: &[DeedRecord],
    table: &ScrapedTable,
) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    write_rows(
        &mut workbook,
        ANALYSIS_SHEET,
        DeedRecord::HEADERS,
        records.iter().map(|r| r.cells().to_vec()),
        &bold,
    )?;
    write_rows(
        &mut workbook,
        SEARCH_RESULTS_SHEET,
        table.headers.iter().map(String::as_str),
        table
            .rows
            .iter()
            .map(|row| row.iter().map(String::as_str).collect()),
        &bold,
    )?;

    workbook.save(path)
}

/// xlsx 结果写入器（固定输出路径，每次运行覆盖）
pub struct XlsxResultsWriter {
    path: PathBuf,
}

impl XlsxResultsWriter {
    pub fn new(config: &Config) -> Self {
        Self::with_path(&config.results_file)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ResultsWriter for XlsxResultsWriter {
    async fn write(&self, records: &[DeedRecord], table: &ScrapedTable) -> AppResult<PathBuf> {
        write_workbook(&self.path, records, table).map_err(|e| FileError::SpreadsheetFailed {
            path: self.path.display().to_string(),
            source: Box::new(e),
        })?;

        info!(
            "📊 结果已写入 {}（{} 条分析结果，{} 行检索结果）",
            self.path.display(),
            records.len(),
            table.len()
        );
        Ok(self.path.clone())
    }
}
