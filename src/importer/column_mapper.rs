// ==========================================
// 班级学生档案 - 列映射器实现
// ==========================================
// 职责: 表头同义词 → 规范字段键；必要列检查
// 规则: 去首尾空白后精确匹配，不做模糊匹配
// ==========================================

use crate::domain::import::{ColumnBinding, SheetKind};
use crate::domain::student::{FieldKey, Subject};
use crate::importer::error::{ImportError, ImportOutcome};
use crate::importer::student_importer_trait::ColumnMapper as ColumnMapperTrait;
use std::collections::HashMap;
use std::sync::OnceLock;

/// 名单必要列
const ROSTER_REQUIRED: [FieldKey; 3] = [FieldKey::Id, FieldKey::Name, FieldKey::Gender];

/// 成绩表必要列
const GRADE_REQUIRED: [FieldKey; 1] = [FieldKey::Id];

// ==========================================
// ColumnMapping - 静态同义词表（进程级只读）
// ==========================================
pub struct ColumnMapping {
    entries: HashMap<&'static str, FieldKey>,
}

impl ColumnMapping {
    fn build() -> Self {
        let mut entries = HashMap::new();

        let fixed: [(FieldKey, &[&'static str]); 14] = [
            (FieldKey::Id, &["学号", "id", "studentId", "student_id"]),
            (FieldKey::Name, &["姓名", "name", "studentName", "student_name"]),
            (FieldKey::Gender, &["性别", "gender"]),
            (FieldKey::Class, &["班级", "class", "className", "class_name"]),
            (FieldKey::Semester, &["学期", "semester"]),
            (
                FieldKey::Height,
                &["身高(cm)", "身高（cm）", "身高", "height"],
            ),
            (
                FieldKey::Weight,
                &["体重(kg)", "体重（kg）", "体重", "weight"],
            ),
            (
                FieldKey::ChestCircumference,
                &[
                    "胸围(cm)",
                    "胸围（cm）",
                    "胸围",
                    "chest_circumference",
                    "chestCircumference",
                ],
            ),
            (
                FieldKey::VitalCapacity,
                &[
                    "肺活量(ml)",
                    "肺活量（ml）",
                    "肺活量",
                    "vital_capacity",
                    "vitalCapacity",
                ],
            ),
            (
                FieldKey::VisionLeft,
                &["视力左", "左眼视力", "vision_left", "visionLeft"],
            ),
            (
                FieldKey::VisionRight,
                &["视力右", "右眼视力", "vision_right", "visionRight"],
            ),
            (
                FieldKey::DentalCaries,
                &["龋齿", "dental_caries", "dentalCaries"],
            ),
            (
                FieldKey::PhysicalTestStatus,
                &["体测情况", "physical_test_status", "physicalTestStatus"],
            ),
            (FieldKey::Comments, &["评语", "comments"]),
        ];
        for (key, labels) in fixed {
            for label in labels {
                entries.insert(*label, key);
            }
        }

        // 科目列: 中文名 + 科目代码；道德与法治另有全称
        for subject in Subject::ALL {
            entries.insert(subject.label(), FieldKey::Grade(subject));
            entries.insert(subject.code(), FieldKey::Grade(subject));
        }
        entries.insert("道德与法治", FieldKey::Grade(Subject::Daof));

        Self { entries }
    }

    /// 精确匹配（调用方负责去空白）
    pub fn resolve(&self, header: &str) -> Option<FieldKey> {
        self.entries.get(header).copied()
    }
}

/// 全局同义词表
pub fn column_mapping() -> &'static ColumnMapping {
    static MAPPING: OnceLock<ColumnMapping> = OnceLock::new();
    MAPPING.get_or_init(ColumnMapping::build)
}

/// 字段键是否适用于当前表类型
fn applies_to(key: FieldKey, kind: SheetKind) -> bool {
    match kind {
        SheetKind::Roster => !matches!(
            key,
            FieldKey::Grade(_) | FieldKey::Semester | FieldKey::Comments
        ),
        SheetKind::Grades => matches!(
            key,
            FieldKey::Id | FieldKey::Name | FieldKey::Semester | FieldKey::Grade(_)
        ),
    }
}

// ==========================================
// SheetColumns - 单张表的列映射结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetColumns {
    pub bindings: Vec<ColumnBinding>,
    pub unrecognized: Vec<String>,
}

impl SheetColumns {
    /// 字段键对应的原始表头
    pub fn header_for(&self, key: FieldKey) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.key == key)
            .map(|b| b.header.as_str())
    }

    pub fn has(&self, key: FieldKey) -> bool {
        self.header_for(key).is_some()
    }

    /// 已识别的科目列（按表头顺序）
    pub fn subjects(&self) -> Vec<(Subject, &str)> {
        self.bindings
            .iter()
            .filter_map(|b| match b.key {
                FieldKey::Grade(subject) => Some((subject, b.header.as_str())),
                _ => None,
            })
            .collect()
    }
}

// ==========================================
// ColumnMapper
// ==========================================
pub struct ColumnMapper {
    mapping: &'static ColumnMapping,
}

impl ColumnMapper {
    pub fn new(mapping: &'static ColumnMapping) -> Self {
        Self { mapping }
    }
}

impl Default for ColumnMapper {
    fn default() -> Self {
        Self::new(column_mapping())
    }
}

impl ColumnMapperTrait for ColumnMapper {
    fn map_headers(&self, headers: &[String], kind: SheetKind) -> ImportOutcome<SheetColumns> {
        let mut columns = SheetColumns::default();

        for header in headers {
            let trimmed = header.trim();
            match self.mapping.resolve(trimmed) {
                // 同一字段出现多列时只取第一列
                Some(key) if applies_to(key, kind) && !columns.has(key) => {
                    columns.bindings.push(ColumnBinding {
                        header: header.clone(),
                        key,
                    });
                }
                _ => columns.unrecognized.push(header.clone()),
            }
        }

        let required: &[FieldKey] = match kind {
            SheetKind::Roster => &ROSTER_REQUIRED,
            SheetKind::Grades => &GRADE_REQUIRED,
        };
        let missing: Vec<String> = required
            .iter()
            .filter(|key| !columns.has(**key))
            .map(|key| key.label().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingRequiredColumns(missing));
        }

        if kind == SheetKind::Grades && columns.subjects().is_empty() {
            return Err(ImportError::NoRecognizedColumns(
                "成绩表中没有可识别的科目列".to_string(),
            ));
        }

        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unit_annotation_variants_map_to_one_key() {
        let mapping = column_mapping();
        assert_eq!(mapping.resolve("身高(cm)"), Some(FieldKey::Height));
        assert_eq!(mapping.resolve("身高（cm）"), Some(FieldKey::Height));
        assert_eq!(mapping.resolve("身高"), Some(FieldKey::Height));
        assert_eq!(
            mapping.resolve("vitalCapacity"),
            Some(FieldKey::VitalCapacity)
        );
        assert_eq!(mapping.resolve("数学"), Some(FieldKey::Grade(Subject::Shuxue)));
        assert_eq!(mapping.resolve("身高 (cm)"), None);
    }

    #[test]
    fn test_roster_headers_recognized_and_unrecognized() {
        let mapper = ColumnMapper::default();
        let columns = mapper
            .map_headers(
                &headers(&[" 学号 ", "姓名", "性别", "班级", "体重（kg）", "家庭住址"]),
                SheetKind::Roster,
            )
            .unwrap();

        assert_eq!(columns.header_for(FieldKey::Id), Some(" 学号 "));
        assert!(columns.has(FieldKey::Weight));
        assert_eq!(columns.unrecognized, vec!["家庭住址".to_string()]);
    }

    #[test]
    fn test_roster_missing_required_is_fatal() {
        let mapper = ColumnMapper::default();
        let err = mapper
            .map_headers(&headers(&["学号", "班级"]), SheetKind::Roster)
            .unwrap_err();

        match err {
            ImportError::MissingRequiredColumns(missing) => {
                assert_eq!(missing, vec!["姓名".to_string(), "性别".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_grade_sheet_reports_roster_keys_as_unrecognized() {
        let mapper = ColumnMapper::default();
        let columns = mapper
            .map_headers(
                &headers(&["学号", "姓名", "班级", "语文", "数学", "备注"]),
                SheetKind::Grades,
            )
            .unwrap();

        assert_eq!(
            columns.unrecognized,
            vec!["班级".to_string(), "备注".to_string()]
        );
        assert_eq!(
            columns.subjects(),
            vec![(Subject::Yuwen, "语文"), (Subject::Shuxue, "数学")]
        );
    }

    #[test]
    fn test_grade_sheet_without_subjects_is_fatal() {
        let mapper = ColumnMapper::default();
        let err = mapper
            .map_headers(&headers(&["学号", "姓名", "班级"]), SheetKind::Grades)
            .unwrap_err();
        assert!(matches!(err, ImportError::NoRecognizedColumns(_)));
    }

    #[test]
    fn test_duplicate_column_keeps_first() {
        let mapper = ColumnMapper::default();
        let columns = mapper
            .map_headers(
                &headers(&["学号", "姓名", "性别", "身高", "身高(cm)"]),
                SheetKind::Roster,
            )
            .unwrap();
        assert_eq!(columns.header_for(FieldKey::Height), Some("身高"));
        assert_eq!(columns.unrecognized, vec!["身高(cm)".to_string()]);
    }
}
