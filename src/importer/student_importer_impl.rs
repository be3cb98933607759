// ==========================================
// 班级学生档案 - 学生数据导入器实现
// ==========================================
// 职责: 串联导入管道的两种调用形态
// 预览: 列映射 → 行校验 → 预览报告（不落库，暂存来源）
// 确认: 列映射 → 行校验（事务内）→ 逐行落库 → 提交/回滚
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{
    ImportMode, ImportResult, NameDirectory, ParsedSheet, PreviewReport, SheetKind,
};
use crate::importer::column_mapper::ColumnMapper as DefaultColumnMapper;
use crate::importer::csv_source::CsvSource;
use crate::importer::preview_builder::PreviewBuilder;
use crate::importer::reconciliation_committer::ReconciliationCommitter;
use crate::importer::row_validator::{validate_sheet, RowValidator as DefaultRowValidator};
use crate::importer::staging::PreviewStaging;
use crate::importer::student_importer_trait::{
    ColumnMapper, RowValidator, SheetSource, StudentImporter,
};
use crate::repository::StudentRepository;
use chrono::Utc;
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument};

// ==========================================
// StudentImporterImpl - 学生数据导入器实现
// ==========================================
pub struct StudentImporterImpl<C>
where
    C: ImportConfigReader,
{
    // 数据访问层
    repo: StudentRepository,

    // 配置读取器
    config: C,

    // 预览暂存区
    staging: PreviewStaging,

    // 导入组件
    sheet_source: Box<dyn SheetSource>,
    column_mapper: Box<dyn ColumnMapper>,
    row_validator: Box<dyn RowValidator>,
    committer: ReconciliationCommitter,
}

impl<C> StudentImporterImpl<C>
where
    C: ImportConfigReader,
{
    /// 创建新的 StudentImporter 实例
    ///
    /// # 参数
    /// - repo: 学生档案仓储
    /// - config: 配置读取器
    /// - staging: 预览暂存区
    /// - sheet_source: 文件表格来源
    /// - column_mapper: 列映射器
    /// - row_validator: 行校验器
    pub fn new(
        repo: StudentRepository,
        config: C,
        staging: PreviewStaging,
        sheet_source: Box<dyn SheetSource>,
        column_mapper: Box<dyn ColumnMapper>,
        row_validator: Box<dyn RowValidator>,
    ) -> Self {
        Self {
            repo,
            config,
            staging,
            sheet_source,
            column_mapper,
            row_validator,
            committer: ReconciliationCommitter,
        }
    }

    /// 使用默认组件（CSV 来源、静态同义词表）
    pub fn with_defaults(repo: StudentRepository, config: C, staging_capacity: usize) -> Self {
        Self::new(
            repo,
            config,
            PreviewStaging::new(staging_capacity),
            Box::new(CsvSource),
            Box::new(DefaultColumnMapper::default()),
            Box::new(DefaultRowValidator::default()),
        )
    }

    pub fn repository(&self) -> &StudentRepository {
        &self.repo
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn staging(&self) -> &PreviewStaging {
        &self.staging
    }

    /// 成绩表学期：显式传入 > 配置默认值；名单不带学期
    async fn resolve_semester(
        &self,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<Option<String>, Box<dyn Error>> {
        if mode.sheet_kind() != SheetKind::Grades {
            return Ok(None);
        }
        match semester.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(s) => Ok(Some(s)),
            None => Ok(Some(self.config.get_default_semester().await?)),
        }
    }
}

#[async_trait::async_trait]
impl<C> StudentImporter for StudentImporterImpl<C>
where
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, sheet), fields(rows = sheet.rows.len()))]
    async fn preview(
        &self,
        sheet: ParsedSheet,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<PreviewReport, Box<dyn Error>> {
        let semester = self.resolve_semester(mode, semester).await?;
        let warning_limit = self.config.get_preview_warning_limit().await?;

        // 名单预览不需要快照
        let directory = match mode.sheet_kind() {
            SheetKind::Grades => self.repo.name_directory()?,
            SheetKind::Roster => NameDirectory::new(),
        };
        debug!(known_students = directory.len(), "读取学号快照");

        let validation = validate_sheet(
            self.column_mapper.as_ref(),
            self.row_validator.as_ref(),
            &sheet,
            mode,
            &directory,
            semester.as_deref().unwrap_or_default(),
            Utc::now(),
        )?;

        let source_ref = self.staging.stage(sheet, mode, semester.clone())?;
        let report = PreviewBuilder::new(warning_limit).build(
            validation,
            mode,
            semester,
            Some(source_ref.clone()),
        );

        info!(
            source_ref = %source_ref,
            valid = report.counts.valid_rows,
            rejected = report.counts.rejected_rows,
            warnings = report.counts.warning_count,
            "预览完成: {}",
            report.summary_message()
        );
        Ok(report)
    }

    #[instrument(skip(self, sheet), fields(rows = sheet.rows.len()))]
    async fn confirm(
        &self,
        sheet: &ParsedSheet,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<ImportResult, Box<dyn Error>> {
        let semester = self
            .resolve_semester(mode, semester)
            .await?
            .unwrap_or_default();
        let now = Utc::now();

        // 以下全部同步执行，连接锁不跨 await
        let result = {
            let conn = self.repo.get_conn()?;
            self.committer.commit(&conn, mode, now, |directory| {
                validate_sheet(
                    self.column_mapper.as_ref(),
                    self.row_validator.as_ref(),
                    sheet,
                    mode,
                    directory,
                    &semester,
                    now,
                )
            })?
        };

        info!(status = ?result.status, "{}", result.message());
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn confirm_staged(&self, source_ref: &str) -> Result<ImportResult, Box<dyn Error>> {
        let staged = self.staging.get(source_ref)?;
        let result = self
            .confirm(&staged.sheet, staged.mode, staged.semester.clone())
            .await?;

        // 回滚的导入保留暂存，操作员可修正后重试
        if result.committed {
            self.staging.remove(source_ref)?;
        }
        Ok(result)
    }

    #[instrument(skip(self, file_path))]
    async fn preview_csv<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        mode: ImportMode,
        semester: Option<String>,
    ) -> Result<PreviewReport, Box<dyn Error>> {
        let path = file_path.as_ref();
        info!(file_path = %path.display(), "读取 CSV 文件");
        let sheet = self.sheet_source.read_sheet(path)?;
        self.preview(sheet, mode, semester).await
    }
}
