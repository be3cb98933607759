// ==========================================
// 班级学生档案 - 导入层
// ==========================================
// 职责: 表格数据 → 校验后的学生档案 / 成绩更新
// 流程: 列映射 → 值标准化 → 行校验 → 预览 / 确认落库
// 支持: CSV 文件、调用方直接提供的行数据
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod csv_source;
pub mod error;
pub mod preview_builder;
pub mod reconciliation_committer;
pub mod row_validator;
pub mod staging;
pub mod student_importer_impl;
pub mod student_importer_trait;
pub mod value_normalizer;

// 重导出核心类型
pub use column_mapper::{column_mapping, ColumnMapper as ColumnMapperImpl, ColumnMapping, SheetColumns};
pub use csv_source::CsvSource;
pub use error::{ImportError, ImportOutcome};
pub use preview_builder::PreviewBuilder;
pub use reconciliation_committer::ReconciliationCommitter;
pub use row_validator::{validate_sheet, RowOutcome, RowValidator as RowValidatorImpl, SheetValidation};
pub use staging::{PreviewStaging, StagedSheet};
pub use student_importer_impl::StudentImporterImpl;
pub use value_normalizer::{Normalized, ValueNormalizer as ValueNormalizerImpl};

// 重导出 Trait 接口
pub use student_importer_trait::{
    ColumnMapper, RowValidator, SheetSource, StudentImporter, ValueNormalizer,
};
