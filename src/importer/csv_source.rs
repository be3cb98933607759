// ==========================================
// 班级学生档案 - CSV 表格来源
// ==========================================
// 职责: .csv 文件 → ParsedSheet（表头 + 行）
// 说明: 二进制表格（xlsx/xls）不在支持范围内
// ==========================================

use crate::domain::import::{CellValue, ImportRow, ParsedSheet};
use crate::importer::error::{ImportError, ImportOutcome};
use crate::importer::student_importer_trait::SheetSource;
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

pub struct CsvSource;

impl SheetSource for CsvSource {
    fn read_sheet(&self, file_path: &Path) -> ImportOutcome<ParsedSheet> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }

        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            // 行号按文件中的数据行计（空白行也占号）
            let mut row = ImportRow::new(idx + 1);

            for (col_idx, value) in record.iter().enumerate() {
                if let Some(header) = headers.get(col_idx) {
                    // 重复表头只取第一列，与列映射的绑定保持一致
                    if row.cells.contains_key(header) {
                        continue;
                    }
                    let cell = if value.trim().is_empty() {
                        CellValue::Absent
                    } else {
                        CellValue::Text(value.to_string())
                    };
                    row.cells.insert(header.clone(), cell);
                }
            }

            // 跳过完全空白的行
            if row.cells.values().all(CellValue::is_absent) {
                continue;
            }

            rows.push(row);
        }

        Ok(ParsedSheet::new(headers, rows))
    }
}
