// ==========================================
// 班级学生档案 - 领域模型层
// ==========================================
// 职责: 定义领域实体、导入中间结构、导入报告
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import;
pub mod student;

// 重导出核心类型
pub use import::{
    CellValue, ColumnBinding, DirectoryEntry, GradeUpdate, ImportCandidate, ImportMode,
    ImportResult, ImportRow, ImportStatus, ImportWarning, NameDirectory, NameMismatch,
    ParsedSheet, PreviewCounts, PreviewReport, RejectReason, RowRejection, SheetKind,
};
pub use student::{FieldKey, Grade, StudentRecord, Subject, SubjectGrades};
