// ==========================================
// 班级学生档案 - 导入 API
// ==========================================
// 职责: 封装名单/成绩的预览、确认与单人成绩维护
// 约束: 预览不写库；确认在单个事务内完成
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::import::{
    CellValue, ImportMode, ImportResult, ParsedSheet, PreviewReport, SheetKind,
};
use crate::domain::student::{Grade, Subject, SubjectGrades};
use crate::importer::{
    StudentImporter, StudentImporterImpl, ValueNormalizer, ValueNormalizerImpl,
};
use crate::repository::StudentRepository;
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{info, instrument, warn};

/// 预览响应
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    /// 预览只要没有整表错误即为 ok
    pub status: String,
    /// 汇总提示（识别科目数、无效行、姓名不匹配）
    pub message: String,
    #[serde(flatten)]
    pub report: PreviewReport,
}

impl From<PreviewReport> for PreviewResponse {
    fn from(report: PreviewReport) -> Self {
        Self {
            status: "ok".to_string(),
            message: report.summary_message(),
            report,
        }
    }
}

/// 确认导入响应
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmResponse {
    /// 汇总提示（新增/更新/失败）
    pub message: String,
    /// status 字段来自 ImportResult（ok / partial / error）
    #[serde(flatten)]
    pub result: ImportResult,
}

impl From<ImportResult> for ConfirmResponse {
    fn from(result: ImportResult) -> Self {
        Self {
            message: result.message(),
            result,
        }
    }
}

/// 单人成绩保存响应
#[derive(Debug, Clone, Serialize)]
pub struct SaveGradesResponse {
    pub status: String,
    pub message: String,
    pub student_id: String,
    pub semester: String,
    /// 实际写入的科目代码
    pub saved_subjects: Vec<String>,
    /// 被清空或忽略的输入说明
    pub warnings: Vec<String>,
}

/// 成绩总表的一行
#[derive(Debug, Clone, Serialize)]
pub struct GradeSheetRow {
    pub id: String,
    pub name: String,
    pub class: String,
    pub semester: String,
    #[serde(flatten)]
    pub grades: SubjectGrades,
}

/// 导入 API
pub struct ImportApi {
    importer: StudentImporterImpl<ConfigManager>,
    normalizer: ValueNormalizerImpl,
}

impl ImportApi {
    /// 打开数据库并组装导入器
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 亦可）
    pub async fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        let conn = Arc::new(Mutex::new(conn));

        let repo = StudentRepository::from_connection(Arc::clone(&conn))?;
        let config = ConfigManager::from_connection(conn).map_err(ApiError::from_boxed)?;
        let staging_capacity = config
            .get_staging_capacity()
            .await
            .map_err(ApiError::from_boxed)?;

        info!(db_path = db_path, staging_capacity, "导入 API 初始化完成");
        Ok(Self {
            importer: StudentImporterImpl::with_defaults(repo, config, staging_capacity),
            normalizer: ValueNormalizerImpl,
        })
    }

    pub fn config(&self) -> &ConfigManager {
        self.importer.config()
    }

    pub fn repository(&self) -> &StudentRepository {
        self.importer.repository()
    }

    /// 未显式指定时按配置决定名单是否全量替换
    async fn roster_mode(&self, full_reset: Option<bool>) -> ApiResult<ImportMode> {
        let full_reset = match full_reset {
            Some(flag) => flag,
            None => self
                .config()
                .get_roster_full_reset()
                .await
                .map_err(ApiError::from_boxed)?,
        };
        Ok(ImportMode::roster(full_reset))
    }

    async fn semester_or_default(&self, semester: Option<String>) -> ApiResult<String> {
        match semester.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
            Some(s) => Ok(s),
            None => self
                .config()
                .get_default_semester()
                .await
                .map_err(ApiError::from_boxed),
        }
    }

    // ==========================================
    // 预览
    // ==========================================

    /// 预览学生名单（不写库）
    pub async fn preview_roster(
        &self,
        sheet: ParsedSheet,
        full_reset: Option<bool>,
    ) -> ApiResult<PreviewResponse> {
        let mode = self.roster_mode(full_reset).await?;
        let report = self
            .importer
            .preview(sheet, mode, None)
            .await
            .map_err(ApiError::from_boxed)?;
        Ok(report.into())
    }

    /// 预览成绩表（不写库）
    pub async fn preview_grades(
        &self,
        sheet: ParsedSheet,
        semester: Option<String>,
    ) -> ApiResult<PreviewResponse> {
        let report = self
            .importer
            .preview(sheet, ImportMode::Grades, semester)
            .await
            .map_err(ApiError::from_boxed)?;
        Ok(report.into())
    }

    /// 从 CSV 文件预览
    ///
    /// # 参数
    /// - kind: 名单或成绩表
    /// - full_reset: 仅名单使用
    /// - semester: 仅成绩表使用
    #[instrument(skip(self))]
    pub async fn preview_csv_file(
        &self,
        file_path: &str,
        kind: SheetKind,
        full_reset: Option<bool>,
        semester: Option<String>,
    ) -> ApiResult<PreviewResponse> {
        let mode = match kind {
            SheetKind::Roster => self.roster_mode(full_reset).await?,
            SheetKind::Grades => ImportMode::Grades,
        };
        let report = self
            .importer
            .preview_csv(file_path, mode, semester)
            .await
            .map_err(ApiError::from_boxed)?;
        Ok(report.into())
    }

    // ==========================================
    // 确认
    // ==========================================

    /// 确认导入学生名单
    pub async fn confirm_roster(
        &self,
        sheet: &ParsedSheet,
        full_reset: Option<bool>,
    ) -> ApiResult<ConfirmResponse> {
        let mode = self.roster_mode(full_reset).await?;
        let result = self
            .importer
            .confirm(sheet, mode, None)
            .await
            .map_err(ApiError::from_boxed)?;
        Ok(result.into())
    }

    /// 确认导入成绩表
    pub async fn confirm_grades(
        &self,
        sheet: &ParsedSheet,
        semester: Option<String>,
    ) -> ApiResult<ConfirmResponse> {
        let result = self
            .importer
            .confirm(sheet, ImportMode::Grades, semester)
            .await
            .map_err(ApiError::from_boxed)?;
        Ok(result.into())
    }

    /// 按预览返回的 source_ref 确认
    pub async fn confirm_staged(&self, source_ref: &str) -> ApiResult<ConfirmResponse> {
        let result = self
            .importer
            .confirm_staged(source_ref)
            .await
            .map_err(ApiError::from_boxed)?;
        Ok(result.into())
    }

    // ==========================================
    // 单人成绩维护
    // ==========================================

    /// 保存单个学生的成绩
    ///
    /// # 参数
    /// - grades: 科目代码 → 成绩文本（如 "yuwen" → "优秀"）
    ///
    /// # 说明
    /// - 只更新给出的科目
    /// - 无效成绩写为未评并附警告；未知科目代码忽略并附警告
    #[instrument(skip(self, grades), fields(subjects = grades.len()))]
    pub async fn save_student_grades(
        &self,
        student_id: &str,
        grades: &HashMap<String, String>,
        semester: Option<String>,
    ) -> ApiResult<SaveGradesResponse> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Err(ApiError::InvalidInput("学号不能为空".to_string()));
        }
        let semester = self.semester_or_default(semester).await?;

        let mut normalized: BTreeMap<Subject, Grade> = BTreeMap::new();
        let mut warnings = Vec::new();
        for (code, raw) in grades {
            let Some(subject) = Subject::from_code(code.trim()) else {
                warnings.push(format!("未知科目代码「{}」，已忽略", code));
                continue;
            };
            let grade = self
                .normalizer
                .normalize_grade(&CellValue::Text(raw.clone()));
            if let Some(message) = grade.warning {
                warnings.push(format!("{}: {}", subject.label(), message));
            }
            normalized.insert(subject, grade.value);
        }

        let found = self
            .repository()
            .save_grades(student_id, &normalized, &semester, Utc::now())?;
        if !found {
            return Err(ApiError::NotFound(format!("学号{}不存在", student_id)));
        }

        if !warnings.is_empty() {
            warn!(student_id = student_id, warnings = warnings.len(), "保存成绩时存在无效输入");
        }
        info!(student_id = student_id, saved = normalized.len(), "成绩保存成功");

        Ok(SaveGradesResponse {
            status: "ok".to_string(),
            message: "成绩保存成功".to_string(),
            student_id: student_id.to_string(),
            semester,
            saved_subjects: normalized.keys().map(|s| s.code().to_string()).collect(),
            warnings,
        })
    }

    /// 清空单个学生的全部成绩
    #[instrument(skip(self))]
    pub async fn clear_student_grades(
        &self,
        student_id: &str,
        semester: Option<String>,
    ) -> ApiResult<SaveGradesResponse> {
        let semester = self.semester_or_default(semester).await?;
        let found = self
            .repository()
            .clear_grades(student_id, &semester, Utc::now())?;
        if !found {
            return Err(ApiError::NotFound(format!("学号{}不存在", student_id)));
        }

        info!(student_id = student_id, "成绩已清空");
        Ok(SaveGradesResponse {
            status: "ok".to_string(),
            message: "成绩已清空".to_string(),
            student_id: student_id.to_string(),
            semester,
            saved_subjects: Subject::ALL.iter().map(|s| s.code().to_string()).collect(),
            warnings: Vec::new(),
        })
    }

    /// 成绩总表（按班级、学号排序）
    pub fn list_grade_sheet(&self) -> ApiResult<Vec<GradeSheetRow>> {
        let rows = self
            .repository()
            .list_all()?
            .into_iter()
            .map(|record| GradeSheetRow {
                id: record.id,
                name: record.name,
                class: record.class,
                semester: record.semester,
                grades: record.grades,
            })
            .collect();
        Ok(rows)
    }
}
