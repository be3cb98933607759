// ==========================================
// 班级学生档案 - 导入组件 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 流程: 列映射 → 值标准化 → 行校验 → 预览 / 落库
// ==========================================

use crate::domain::import::{
    CellValue, ImportMode, ImportResult, ImportRow, NameDirectory, ParsedSheet, PreviewReport,
    SheetKind,
};
use crate::domain::student::Grade;
use crate::importer::column_mapper::SheetColumns;
use crate::importer::error::ImportOutcome;
use crate::importer::row_validator::RowOutcome;
use crate::importer::value_normalizer::Normalized;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::error::Error;
use std::path::Path;

// ==========================================
// StudentImporter Trait
// ==========================================
// 用途: 导入主接口（预览 / 确认两种调用形态）
// 实现者: StudentImporterImpl
#[async_trait]
pub trait StudentImporter: Send + Sync {
    /// 预览导入（不落库）
    ///
    /// # 参数
    /// - sheet: 已解析的工作表
    /// - mode: 导入模式
    /// - semester: 成绩表学期（None 时取配置默认值）
    ///
    /// # 返回
    /// - Ok(PreviewReport): 预览报告（含暂存引用 source_ref）
    /// - Err: 缺少必要列、无可识别列、数据库错误
    async fn preview(
        &self,
        sheet: ParsedSheet,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<PreviewReport, Box<dyn Error>>;

    /// 确认导入（直接提供行数据）
    ///
    /// # 返回
    /// - Ok(ImportResult): 导入结果，status 为 ok / partial / error
    /// - Err: 整批致命错误，未写入任何数据
    async fn confirm(
        &self,
        sheet: &ParsedSheet,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<ImportResult, Box<dyn Error>>;

    /// 确认导入（按预览暂存引用）
    ///
    /// # 说明
    /// - 仅在事务提交成功后才从暂存区移除
    /// - 引用不存在（过期/已使用）时报 SourceNotFound
    async fn confirm_staged(&self, source_ref: &str) -> Result<ImportResult, Box<dyn Error>>;

    /// 从 CSV 文件生成预览
    async fn preview_csv<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<PreviewReport, Box<dyn Error>>;
}

// ==========================================
// SheetSource Trait
// ==========================================
// 用途: 文本表格来源 → ParsedSheet
// 实现者: CsvSource
pub trait SheetSource: Send + Sync {
    /// 解析文件为工作表（表头 + 行）
    fn read_sheet(&self, file_path: &Path) -> ImportOutcome<ParsedSheet>;
}

// ==========================================
// ColumnMapper Trait
// ==========================================
// 用途: 表头 → 规范字段键
// 实现者: ColumnMapper
pub trait ColumnMapper: Send + Sync {
    /// 解析整张表的表头
    ///
    /// # 返回
    /// - Ok(SheetColumns): 已识别/未识别列
    /// - Err(MissingRequiredColumns): 缺少当前模式的必要列
    /// - Err(NoRecognizedColumns): 成绩表没有任何科目列
    fn map_headers(&self, headers: &[String], kind: SheetKind) -> ImportOutcome<SheetColumns>;
}

// ==========================================
// ValueNormalizer Trait
// ==========================================
// 用途: 单元格值清洗
// 实现者: ValueNormalizer
pub trait ValueNormalizer: Send + Sync {
    /// 数值清洗（缺失 → None，无法解析 → None + 警告）
    fn normalize_number(&self, cell: &CellValue) -> Normalized<Option<f64>>;

    /// 文本清洗（空白 → None）
    fn normalize_text(&self, cell: &CellValue) -> Option<String>;

    /// 成绩归一（同义词 → 标准成绩，非法 → 未评 + 警告）
    fn normalize_grade(&self, cell: &CellValue) -> Normalized<Grade>;
}

// ==========================================
// RowValidator Trait
// ==========================================
// 用途: 单行校验，产出候选记录或拒绝原因
// 实现者: RowValidator
pub trait RowValidator: Send + Sync {
    /// 名单行校验
    fn validate_roster_row(
        &self,
        row: &ImportRow,
        columns: &SheetColumns,
        now: DateTime<Utc>,
    ) -> RowOutcome;

    /// 成绩行校验
    ///
    /// # 参数
    /// - directory: 系统学号 → 姓名快照
    /// - semester: 行内无学期列时使用的学期
    fn validate_grade_row(
        &self,
        row: &ImportRow,
        columns: &SheetColumns,
        directory: &NameDirectory,
        semester: &str,
    ) -> RowOutcome;
}
