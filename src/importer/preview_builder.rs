// ==========================================
// 班级学生档案 - 预览报告构建器
// ==========================================
// 职责: 将整表校验结果汇总为预览报告
// 红线: 纯函数，不访问存储
// ==========================================

use crate::domain::import::{ImportMode, NameMismatch, PreviewCounts, PreviewReport, RejectReason};
use crate::importer::row_validator::SheetValidation;

pub struct PreviewBuilder {
    warning_limit: usize, // 0 = 不限制
}

impl PreviewBuilder {
    pub fn new(warning_limit: usize) -> Self {
        Self { warning_limit }
    }

    /// 构建预览报告
    ///
    /// # 参数
    /// - validation: validate_sheet 的输出
    /// - source_ref: 暂存引用（未暂存时为 None）
    ///
    /// # 说明
    /// - counts.warning_count 为警告总数，warnings 列表按 warning_limit 截断
    pub fn build(
        &self,
        validation: SheetValidation,
        mode: ImportMode,
        semester: Option<String>,
        source_ref: Option<String>,
    ) -> PreviewReport {
        let SheetValidation {
            columns,
            candidates,
            rejections,
            mut warnings,
            ..
        } = validation;

        let name_mismatches: Vec<NameMismatch> = rejections
            .iter()
            .filter_map(|rejection| match &rejection.reason {
                RejectReason::NameMismatch {
                    student_id,
                    sheet_name,
                    stored_name,
                } => Some(NameMismatch {
                    student_id: student_id.clone(),
                    sheet_name: sheet_name.clone(),
                    stored_name: stored_name.clone(),
                }),
                _ => None,
            })
            .collect();

        let counts = PreviewCounts {
            total_rows: candidates.len() + rejections.len(),
            valid_rows: candidates.len(),
            rejected_rows: rejections.len(),
            warning_count: warnings.len(),
            recognized_columns: columns.bindings.len(),
            unrecognized_columns: columns.unrecognized.len(),
        };

        if self.warning_limit > 0 {
            warnings.truncate(self.warning_limit);
        }

        PreviewReport {
            source_ref,
            mode,
            semester,
            recognized_columns: columns.bindings,
            unrecognized_columns: columns.unrecognized,
            valid_candidates: candidates,
            rejected_rows: rejections,
            name_mismatches,
            warnings,
            counts,
        }
    }
}

impl Default for PreviewBuilder {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::import::{DirectoryEntry, ImportRow, NameDirectory, ParsedSheet};
    use crate::importer::column_mapper::ColumnMapper;
    use crate::importer::row_validator::{validate_sheet, RowValidator};
    use chrono::Utc;

    fn grade_validation() -> SheetValidation {
        let mut directory = NameDirectory::new();
        directory.insert(
            "7".to_string(),
            DirectoryEntry {
                name: "李斯".to_string(),
                class: "四年级二班".to_string(),
            },
        );
        let sheet = ParsedSheet::new(
            vec![
                "学号".to_string(),
                "姓名".to_string(),
                "语文".to_string(),
                "备注".to_string(),
            ],
            vec![
                ImportRow::new(1)
                    .with("学号", "7")
                    .with("姓名", "李四")
                    .with("语文", "优"),
                ImportRow::new(2)
                    .with("学号", "7")
                    .with("姓名", "李斯")
                    .with("语文", "乙"),
                ImportRow::new(3).with("学号", "7").with("语文", "良"),
            ],
        );
        validate_sheet(
            &ColumnMapper::default(),
            &RowValidator::default(),
            &sheet,
            ImportMode::Grades,
            &directory,
            "上学期",
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_build_counts_and_name_mismatches() {
        let report = PreviewBuilder::default().build(
            grade_validation(),
            ImportMode::Grades,
            Some("上学期".to_string()),
            None,
        );

        assert_eq!(report.counts.total_rows, 3);
        assert_eq!(report.counts.valid_rows, 1);
        assert_eq!(report.counts.rejected_rows, 2);
        assert_eq!(report.unrecognized_columns, vec!["备注".to_string()]);
        assert_eq!(report.name_mismatches.len(), 1);
        assert_eq!(report.name_mismatches[0].sheet_name, "李四");
        assert_eq!(report.name_mismatches[0].stored_name, "李斯");
        assert_eq!(report.recognized_subject_count(), 1);

        let summary = report.summary_message();
        assert!(summary.contains("成功识别 1 个科目的成绩"));
        assert!(summary.contains("1 条姓名不匹配"));
    }

    #[test]
    fn test_warning_limit_truncates_list_not_count() {
        let validation = grade_validation();
        let total = validation.warnings.len();
        assert!(total >= 2);

        let report = PreviewBuilder::new(1).build(validation, ImportMode::Grades, None, None);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.counts.warning_count, total);
    }
}
