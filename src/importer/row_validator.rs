// ==========================================
// 班级学生档案 - 行校验器实现
// ==========================================
// 职责: 必填值校验 / 学号存在性 / 姓名一致性 / 候选记录构造
// 说明: 预览与确认共用 validate_sheet，保证两条路径判定一致
// ==========================================

use crate::domain::import::{
    GradeUpdate, ImportCandidate, ImportMode, ImportRow, ImportWarning, NameDirectory,
    ParsedSheet, RejectReason, RowRejection, SheetKind,
};
use crate::domain::student::{FieldKey, Grade, StudentRecord};
use crate::importer::column_mapper::SheetColumns;
use crate::importer::error::ImportOutcome;
use crate::importer::student_importer_trait::{
    ColumnMapper, RowValidator as RowValidatorTrait, ValueNormalizer as ValueNormalizerTrait,
};
use crate::importer::value_normalizer::ValueNormalizer;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// 单行校验结果：候选记录或拒绝原因，外加该行的值级警告
#[derive(Debug, Clone)]
pub struct RowOutcome {
    pub result: Result<ImportCandidate, RowRejection>,
    pub warnings: Vec<ImportWarning>,
}

impl RowOutcome {
    fn rejected(row: &ImportRow, student_id: Option<String>, reason: RejectReason) -> Self {
        Self {
            result: Err(RowRejection::new(row.row_number, student_id, reason)),
            warnings: Vec::new(),
        }
    }
}

// ==========================================
// RowValidator
// ==========================================
pub struct RowValidator {
    normalizer: Box<dyn ValueNormalizerTrait>,
}

impl RowValidator {
    pub fn new(normalizer: Box<dyn ValueNormalizerTrait>) -> Self {
        Self { normalizer }
    }

    fn text(&self, row: &ImportRow, columns: &SheetColumns, key: FieldKey) -> Option<String> {
        columns
            .header_for(key)
            .and_then(|header| self.normalizer.normalize_text(row.get(header)))
    }

    fn number(
        &self,
        row: &ImportRow,
        columns: &SheetColumns,
        key: FieldKey,
        student_id: &str,
        warnings: &mut Vec<ImportWarning>,
    ) -> Option<f64> {
        let header = columns.header_for(key)?;
        let normalized = self.normalizer.normalize_number(row.get(header));
        if let Some(message) = normalized.warning {
            warnings.push(ImportWarning::cell(
                row.row_number,
                Some(student_id.to_string()),
                header,
                message,
            ));
        }
        normalized.value
    }
}

impl Default for RowValidator {
    fn default() -> Self {
        Self::new(Box::new(ValueNormalizer))
    }
}

impl RowValidatorTrait for RowValidator {
    fn validate_roster_row(
        &self,
        row: &ImportRow,
        columns: &SheetColumns,
        now: DateTime<Utc>,
    ) -> RowOutcome {
        let id = self.text(row, columns, FieldKey::Id);
        let name = self.text(row, columns, FieldKey::Name);
        let gender = self.text(row, columns, FieldKey::Gender);

        let (id, name, gender) = match (id, name, gender) {
            (Some(id), Some(name), Some(gender)) => (id, name, gender),
            (id, name, _) => {
                let field = if id.is_none() {
                    FieldKey::Id
                } else if name.is_none() {
                    FieldKey::Name
                } else {
                    FieldKey::Gender
                };
                return RowOutcome::rejected(row, id, RejectReason::MissingRequiredValue { field });
            }
        };

        // 表中未出现的字段一律取类型默认值，不继承旧值
        let mut warnings = Vec::new();
        let mut record = StudentRecord::blank(id, name, gender, now);
        record.class = self.text(row, columns, FieldKey::Class).unwrap_or_default();
        record.dental_caries = self
            .text(row, columns, FieldKey::DentalCaries)
            .unwrap_or_default();
        record.physical_test_status = self
            .text(row, columns, FieldKey::PhysicalTestStatus)
            .unwrap_or_default();

        let id = record.id.clone();
        record.height = self.number(row, columns, FieldKey::Height, &id, &mut warnings);
        record.weight = self.number(row, columns, FieldKey::Weight, &id, &mut warnings);
        record.chest_circumference =
            self.number(row, columns, FieldKey::ChestCircumference, &id, &mut warnings);
        record.vital_capacity =
            self.number(row, columns, FieldKey::VitalCapacity, &id, &mut warnings);
        record.vision_left = self.number(row, columns, FieldKey::VisionLeft, &id, &mut warnings);
        record.vision_right = self.number(row, columns, FieldKey::VisionRight, &id, &mut warnings);

        RowOutcome {
            result: Ok(ImportCandidate::Roster(record)),
            warnings,
        }
    }

    fn validate_grade_row(
        &self,
        row: &ImportRow,
        columns: &SheetColumns,
        directory: &NameDirectory,
        semester: &str,
    ) -> RowOutcome {
        let student_id = match self.text(row, columns, FieldKey::Id) {
            Some(id) => id,
            None => {
                return RowOutcome::rejected(
                    row,
                    None,
                    RejectReason::MissingRequiredValue {
                        field: FieldKey::Id,
                    },
                )
            }
        };

        // 成绩导入只更新已有学生，不新建
        let entry = match directory.get(&student_id) {
            Some(entry) => entry,
            None => {
                return RowOutcome::rejected(
                    row,
                    Some(student_id.clone()),
                    RejectReason::UnknownStudent { student_id },
                )
            }
        };

        // 姓名列存在且非空时必须与系统一致
        if let Some(sheet_name) = self.text(row, columns, FieldKey::Name) {
            if sheet_name != entry.name {
                return RowOutcome::rejected(
                    row,
                    Some(student_id.clone()),
                    RejectReason::NameMismatch {
                        student_id,
                        sheet_name,
                        stored_name: entry.name.clone(),
                    },
                );
            }
        }

        let mut warnings = Vec::new();
        let mut grades = BTreeMap::new();
        for (subject, header) in columns.subjects() {
            let normalized = self.normalizer.normalize_grade(row.get(header));
            if let Some(message) = normalized.warning {
                warnings.push(ImportWarning::cell(
                    row.row_number,
                    Some(student_id.clone()),
                    header,
                    message,
                ));
            }
            grades.insert(subject, normalized.value);
        }

        if !grades.values().any(Grade::is_graded) {
            return RowOutcome {
                result: Err(RowRejection::new(
                    row.row_number,
                    Some(student_id.clone()),
                    RejectReason::NoUsableGrades { student_id },
                )),
                warnings,
            };
        }

        let semester = self
            .text(row, columns, FieldKey::Semester)
            .unwrap_or_else(|| semester.to_string());

        RowOutcome {
            result: Ok(ImportCandidate::Grades(GradeUpdate {
                student_id,
                student_name: entry.name.clone(),
                class: entry.class.clone(),
                semester,
                grades,
            })),
            warnings,
        }
    }
}

// ==========================================
// 整表校验（预览 / 确认共用）
// ==========================================

/// 整表校验结果
#[derive(Debug, Clone, Default)]
pub struct SheetValidation {
    pub columns: SheetColumns,
    pub candidates: Vec<ImportCandidate>,
    pub candidate_rows: Vec<usize>, // 与 candidates 一一对应的行号
    pub rejections: Vec<RowRejection>,
    pub warnings: Vec<ImportWarning>,
}

/// 列映射 + 逐行校验 + 表内重复学号检测
///
/// # 参数
/// - directory: 系统学号快照（仅成绩表使用）
/// - semester: 成绩表默认学期
///
/// # 返回
/// - Err: 表头级致命错误（此时未处理任何行）
pub fn validate_sheet(
    mapper: &dyn ColumnMapper,
    validator: &dyn RowValidatorTrait,
    sheet: &ParsedSheet,
    mode: ImportMode,
    directory: &NameDirectory,
    semester: &str,
    now: DateTime<Utc>,
) -> ImportOutcome<SheetValidation> {
    let kind = mode.sheet_kind();
    let columns = mapper.map_headers(&sheet.headers, kind)?;

    let mut validation = SheetValidation {
        warnings: columns
            .unrecognized
            .iter()
            .map(|header| ImportWarning::sheet(format!("无法识别的列「{}」，已跳过", header)))
            .collect(),
        ..SheetValidation::default()
    };

    for row in &sheet.rows {
        let outcome = match kind {
            SheetKind::Roster => validator.validate_roster_row(row, &columns, now),
            SheetKind::Grades => validator.validate_grade_row(row, &columns, directory, semester),
        };
        validation.warnings.extend(outcome.warnings);
        match outcome.result {
            Ok(candidate) => {
                validation.candidate_rows.push(row.row_number);
                validation.candidates.push(candidate);
            }
            Err(rejection) => {
                debug!(row_number = rejection.row_number, reason = %rejection.reason, "行校验未通过");
                validation.rejections.push(rejection);
            }
        }
    }

    let duplicates = duplicate_warnings(&validation.candidates, &validation.candidate_rows);
    validation.warnings.extend(duplicates);
    validation.columns = columns;
    Ok(validation)
}

/// 表内重复学号（后出现的行在落库时覆盖先出现的行）
fn duplicate_warnings(candidates: &[ImportCandidate], row_numbers: &[usize]) -> Vec<ImportWarning> {
    let mut first_occurrence: HashMap<&str, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for (candidate, row_number) in candidates.iter().zip(row_numbers) {
        let id = candidate.student_id();
        if let Some(first_row) = first_occurrence.get(id) {
            warnings.push(ImportWarning {
                row_number: Some(*row_number),
                student_id: Some(id.to_string()),
                column: None,
                message: format!(
                    "学号 {} 重复出现（首次出现在第 {} 行），以后出现的行为准",
                    id, first_row
                ),
            });
        } else {
            first_occurrence.insert(id, *row_number);
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{CellValue, DirectoryEntry};
    use crate::domain::student::Subject;
    use crate::importer::column_mapper::ColumnMapper as DefaultColumnMapper;

    fn directory() -> NameDirectory {
        let mut dir = NameDirectory::new();
        dir.insert(
            "1".to_string(),
            DirectoryEntry {
                name: "张三".to_string(),
                class: "三年级一班".to_string(),
            },
        );
        dir.insert(
            "2".to_string(),
            DirectoryEntry {
                name: "李四".to_string(),
                class: "三年级一班".to_string(),
            },
        );
        dir
    }

    fn run(sheet: &ParsedSheet, mode: ImportMode) -> SheetValidation {
        validate_sheet(
            &DefaultColumnMapper::default(),
            &RowValidator::default(),
            sheet,
            mode,
            &directory(),
            "上学期",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_roster_row_defaults_absent_fields() {
        let sheet = ParsedSheet::from_table(
            &["学号", "姓名", "性别", "身高(cm)"],
            vec![vec![
                CellValue::Number(1.0),
                "张三".into(),
                "男".into(),
                "0".into(),
            ]],
        );
        let validation = run(&sheet, ImportMode::RosterUpsert);

        assert_eq!(validation.candidates.len(), 1);
        let ImportCandidate::Roster(record) = &validation.candidates[0] else {
            panic!("expected roster candidate");
        };
        assert_eq!(record.id, "1");
        assert_eq!(record.height, Some(0.0));
        assert_eq!(record.weight, None);
        assert_eq!(record.class, "");
        assert_eq!(record.grades.graded_count(), 0);
    }

    #[test]
    fn test_roster_row_missing_gender_rejected() {
        let sheet = ParsedSheet::from_table(
            &["学号", "姓名", "性别"],
            vec![
                vec!["1".into(), "张三".into(), "  ".into()],
                vec!["2".into(), "李四".into(), "女".into()],
            ],
        );
        let validation = run(&sheet, ImportMode::RosterReset);

        assert_eq!(validation.candidates.len(), 1);
        assert_eq!(validation.rejections.len(), 1);
        assert_eq!(validation.rejections[0].row_number, 1);
        assert_eq!(
            validation.rejections[0].reason,
            RejectReason::MissingRequiredValue {
                field: FieldKey::Gender
            }
        );
    }

    #[test]
    fn test_roster_unparseable_number_warns_but_accepts() {
        let sheet = ParsedSheet::from_table(
            &["学号", "姓名", "性别", "体重"],
            vec![vec!["1".into(), "张三".into(), "男".into(), "未测".into()]],
        );
        let validation = run(&sheet, ImportMode::RosterUpsert);

        assert_eq!(validation.candidates.len(), 1);
        assert_eq!(validation.warnings.len(), 1);
        assert_eq!(validation.warnings[0].column.as_deref(), Some("体重"));
    }

    #[test]
    fn test_grade_row_invalid_token_cleared_other_subject_kept() {
        let sheet = ParsedSheet::from_table(
            &["学号", "数学", "语文"],
            vec![vec!["1".into(), "甲".into(), "优".into()]],
        );
        let validation = run(&sheet, ImportMode::Grades);

        assert_eq!(validation.candidates.len(), 1);
        let ImportCandidate::Grades(update) = &validation.candidates[0] else {
            panic!("expected grade candidate");
        };
        assert_eq!(update.grades[&Subject::Shuxue], Grade::Ungraded);
        assert_eq!(update.grades[&Subject::Yuwen], Grade::Excellent);
        assert_eq!(update.semester, "上学期");
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn test_grade_row_unknown_and_mismatch_and_empty() {
        let sheet = ParsedSheet::from_table(
            &["学号", "姓名", "语文"],
            vec![
                vec!["9".into(), "王五".into(), "优".into()],
                vec!["1".into(), "张叁".into(), "良".into()],
                vec!["2".into(), CellValue::Absent, "甲".into()],
                vec!["2".into(), "".into(), "良好".into()],
            ],
        );
        let validation = run(&sheet, ImportMode::Grades);

        assert_eq!(validation.candidates.len(), 1);
        assert_eq!(validation.candidates[0].student_id(), "2");
        let reasons: Vec<_> = validation.rejections.iter().map(|r| &r.reason).collect();
        assert!(matches!(reasons[0], RejectReason::UnknownStudent { .. }));
        assert!(matches!(reasons[1], RejectReason::NameMismatch { .. }));
        assert!(matches!(reasons[2], RejectReason::NoUsableGrades { .. }));
    }

    #[test]
    fn test_grade_row_semester_column_overrides_default() {
        let sheet = ParsedSheet::from_table(
            &["学号", "学期", "英语"],
            vec![vec!["1".into(), "下学期".into(), "及".into()]],
        );
        let validation = run(&sheet, ImportMode::Grades);

        let ImportCandidate::Grades(update) = &validation.candidates[0] else {
            panic!("expected grade candidate");
        };
        assert_eq!(update.semester, "下学期");
        assert_eq!(update.grades[&Subject::Yingyu], Grade::Pass);
    }

    #[test]
    fn test_duplicate_ids_reported_as_warning() {
        let sheet = ParsedSheet::from_table(
            &["学号", "姓名", "性别"],
            vec![
                vec!["1".into(), "张三".into(), "男".into()],
                vec!["1".into(), "张三".into(), "男".into()],
            ],
        );
        let validation = run(&sheet, ImportMode::RosterUpsert);

        assert_eq!(validation.candidates.len(), 2);
        assert_eq!(validation.warnings.len(), 1);
        assert_eq!(validation.warnings[0].row_number, Some(2));
    }
}
