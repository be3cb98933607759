// ==========================================
// 班级学生档案 - 导入领域模型
// ==========================================
// 职责: 导入管道的中间结构与输出报告
// 生命周期: 仅在单次导入调用内（预览报告可经暂存区跨调用）
// ==========================================

use crate::domain::student::{FieldKey, Grade, StudentRecord, Subject};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

// ==========================================
// CellValue - 原始单元格值
// ==========================================
// 解析协作方只给出三种形态：文本 / 数值 / 缺失
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Absent,
}

static ABSENT: CellValue = CellValue::Absent;

impl CellValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(CellValue::Absent)
    }
}

// ==========================================
// ImportRow - 单行原始数据（表头 → 单元格）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_number: usize, // 数据行号（从 1 开始，不含表头）
    pub cells: HashMap<String, CellValue>,
}

impl ImportRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: HashMap::new(),
        }
    }

    /// 构造辅助：追加一个单元格
    pub fn with(mut self, header: &str, value: impl Into<CellValue>) -> Self {
        self.cells.insert(header.to_string(), value.into());
        self
    }

    /// 读取单元格；缺失的列视为 Absent
    pub fn get(&self, header: &str) -> &CellValue {
        self.cells.get(header).unwrap_or(&ABSENT)
    }
}

// ==========================================
// ParsedSheet - 已解析工作表
// ==========================================
// 表头单独保存：零数据行的表也需要做表头校验
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<ImportRow>,
}

impl ParsedSheet {
    pub fn new(headers: Vec<String>, rows: Vec<ImportRow>) -> Self {
        Self { headers, rows }
    }

    /// 按表头顺序构造（测试与 CLI 使用）
    pub fn from_table(headers: &[&str], rows: Vec<Vec<CellValue>>) -> Self {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, cells)| {
                let mut row = ImportRow::new(idx + 1);
                for (header, cell) in headers.iter().zip(cells) {
                    // 重复表头只保留第一列
                    row.cells.entry(header.clone()).or_insert(cell);
                }
                row
            })
            .collect();
        Self { headers, rows }
    }
}

// ==========================================
// ImportMode - 导入模式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    RosterUpsert, // 名单合并（按学号新增/覆盖）
    RosterReset,  // 名单全量替换（先清空再导入）
    Grades,       // 成绩表（只更新已存在学生）
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Roster,
    Grades,
}

impl ImportMode {
    pub fn sheet_kind(&self) -> SheetKind {
        match self {
            ImportMode::RosterUpsert | ImportMode::RosterReset => SheetKind::Roster,
            ImportMode::Grades => SheetKind::Grades,
        }
    }

    pub fn roster(full_reset: bool) -> Self {
        if full_reset {
            ImportMode::RosterReset
        } else {
            ImportMode::RosterUpsert
        }
    }
}

// ==========================================
// RejectReason / RowRejection - 行级拒绝
// ==========================================
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    #[error("缺少必填值: {}", field.label())]
    MissingRequiredValue { field: FieldKey },

    #[error("学号 {student_id} 不在系统中")]
    UnknownStudent { student_id: String },

    #[error("姓名不匹配: 学号 {student_id} 在表格中为「{sheet_name}」，系统中为「{stored_name}」")]
    NameMismatch {
        student_id: String,
        sheet_name: String,
        stored_name: String,
    },

    #[error("学号 {student_id} 没有有效的成绩数据")]
    NoUsableGrades { student_id: String },

    #[error("写入失败: {message}")]
    ApplyFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowRejection {
    pub row_number: usize,
    pub student_id: Option<String>,
    pub reason: RejectReason,
    pub message: String,
}

impl RowRejection {
    pub fn new(row_number: usize, student_id: Option<String>, reason: RejectReason) -> Self {
        let message = reason.to_string();
        Self {
            row_number,
            student_id,
            reason,
            message,
        }
    }
}

// ==========================================
// ImportWarning - 值级降级警告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportWarning {
    pub row_number: Option<usize>,
    pub student_id: Option<String>,
    pub column: Option<String>,
    pub message: String,
}

impl ImportWarning {
    pub fn sheet(message: impl Into<String>) -> Self {
        Self {
            row_number: None,
            student_id: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn cell(
        row_number: usize,
        student_id: Option<String>,
        column: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            row_number: Some(row_number),
            student_id,
            column: Some(column.to_string()),
            message: message.into(),
        }
    }
}

// ==========================================
// NameDirectory - 学号 → 系统姓名/班级快照
// ==========================================
// 成绩表校验只读此快照，不读完整档案
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub class: String,
}

pub type NameDirectory = HashMap<String, DirectoryEntry>;

/// 姓名不匹配明细
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameMismatch {
    pub student_id: String,
    pub sheet_name: String,
    pub stored_name: String,
}

// ==========================================
// 候选记录
// ==========================================

/// 成绩更新（只覆盖表中出现的科目列）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeUpdate {
    pub student_id: String,
    pub student_name: String, // 系统中的姓名
    pub class: String,        // 系统中的班级
    pub semester: String,
    pub grades: BTreeMap<Subject, Grade>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportCandidate {
    Roster(StudentRecord),
    Grades(GradeUpdate),
}

impl ImportCandidate {
    pub fn student_id(&self) -> &str {
        match self {
            ImportCandidate::Roster(record) => &record.id,
            ImportCandidate::Grades(update) => &update.student_id,
        }
    }
}

/// 已识别列（表头 → 规范键）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnBinding {
    pub header: String,
    pub key: FieldKey,
}

// ==========================================
// PreviewReport - 预览报告（不落库）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewCounts {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub rejected_rows: usize,
    pub warning_count: usize,
    pub recognized_columns: usize,
    pub unrecognized_columns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewReport {
    pub source_ref: Option<String>, // 暂存引用，供确认导入使用
    pub mode: ImportMode,
    pub semester: Option<String>,
    pub recognized_columns: Vec<ColumnBinding>,
    pub unrecognized_columns: Vec<String>,
    pub valid_candidates: Vec<ImportCandidate>,
    pub rejected_rows: Vec<RowRejection>,
    pub name_mismatches: Vec<NameMismatch>,
    pub warnings: Vec<ImportWarning>,
    pub counts: PreviewCounts,
}

impl PreviewReport {
    /// 已识别的科目列数（成绩表）
    pub fn recognized_subject_count(&self) -> usize {
        self.recognized_columns
            .iter()
            .filter(|c| matches!(c.key, FieldKey::Grade(_)))
            .count()
    }

    /// 面向操作员的一句话摘要
    pub fn summary_message(&self) -> String {
        let mut message = match self.mode.sheet_kind() {
            SheetKind::Roster => format!("成功解析出 {} 条学生记录", self.counts.valid_rows),
            SheetKind::Grades => format!(
                "成功识别 {} 个科目的成绩，共 {} 条有效记录",
                self.recognized_subject_count(),
                self.counts.valid_rows
            ),
        };
        if !self.unrecognized_columns.is_empty() {
            message.push_str(&format!(
                "，跳过了 {} 个无法识别的列",
                self.unrecognized_columns.len()
            ));
        }
        if self.counts.rejected_rows > 0 {
            message.push_str(&format!("，{} 条记录无效", self.counts.rejected_rows));
        }
        if !self.name_mismatches.is_empty() {
            message.push_str(&format!(
                "，发现 {} 条姓名不匹配",
                self.name_mismatches.len()
            ));
        }
        message
    }
}

// ==========================================
// ImportResult - 确认导入结果
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportStatus {
    #[serde(rename = "ok")]
    Success,
    #[serde(rename = "partial")]
    Partial,
    #[serde(rename = "error")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub mode: ImportMode,
    pub status: ImportStatus,
    pub committed: bool,
    pub success_count: usize,
    pub inserted_count: usize,
    pub updated_count: usize,
    pub error_count: usize,
    pub error_details: Vec<RowRejection>,
    pub warnings: Vec<ImportWarning>,
}

impl ImportResult {
    pub fn status_for(success_count: usize, error_count: usize) -> ImportStatus {
        match (success_count, error_count) {
            (0, _) => ImportStatus::Failed,
            (_, 0) => ImportStatus::Success,
            _ => ImportStatus::Partial,
        }
    }

    pub fn message(&self) -> String {
        let mut message = match self.mode.sheet_kind() {
            SheetKind::Roster => format!(
                "成功导入{}名学生（新增{}名，更新{}名）",
                self.success_count, self.inserted_count, self.updated_count
            ),
            SheetKind::Grades => format!("成功导入 {} 条成绩记录", self.success_count),
        };
        if self.error_count > 0 {
            message.push_str(&format!("，{} 条失败", self.error_count));
        }
        if !self.committed {
            message.push_str("，事务已回滚");
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_row_missing_cell_is_absent() {
        let row = ImportRow::new(1).with("学号", "1");
        assert_eq!(row.get("学号"), &CellValue::Text("1".to_string()));
        assert!(row.get("姓名").is_absent());
    }

    #[test]
    fn test_parsed_sheet_from_table_numbers_rows() {
        let sheet = ParsedSheet::from_table(
            &["学号", "姓名"],
            vec![
                vec!["1".into(), "张三".into()],
                vec![CellValue::Number(2.0), CellValue::Absent],
            ],
        );
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].row_number, 2);
        assert_eq!(sheet.rows[1].get("学号"), &CellValue::Number(2.0));
    }

    #[test]
    fn test_status_for_counts() {
        assert_eq!(ImportResult::status_for(3, 0), ImportStatus::Success);
        assert_eq!(ImportResult::status_for(3, 1), ImportStatus::Partial);
        assert_eq!(ImportResult::status_for(0, 4), ImportStatus::Failed);
        assert_eq!(ImportResult::status_for(0, 0), ImportStatus::Failed);
    }

    #[test]
    fn test_status_serializes_as_wire_values() {
        assert_eq!(serde_json::to_value(ImportStatus::Success).unwrap(), "ok");
        assert_eq!(serde_json::to_value(ImportStatus::Partial).unwrap(), "partial");
        assert_eq!(serde_json::to_value(ImportStatus::Failed).unwrap(), "error");
    }

    #[test]
    fn test_from_table_duplicate_header_keeps_first() {
        let sheet = ParsedSheet::from_table(
            &["学号", "身高", "身高"],
            vec![vec!["1".into(), "150".into(), "999".into()]],
        );
        assert_eq!(sheet.rows[0].get("身高"), &CellValue::Text("150".to_string()));
    }

    #[test]
    fn test_reject_reason_message() {
        let rejection = RowRejection::new(
            3,
            Some("7".to_string()),
            RejectReason::NameMismatch {
                student_id: "7".to_string(),
                sheet_name: "李四".to_string(),
                stored_name: "李斯".to_string(),
            },
        );
        assert!(rejection.message.contains("姓名不匹配"));
        assert!(rejection.message.contains("李斯"));
    }
}
