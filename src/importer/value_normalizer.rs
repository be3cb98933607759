// ==========================================
// 班级学生档案 - 值标准化器实现
// ==========================================
// 职责: 数值清洗 / 文本清洗 / 成绩同义词归一
// 红线: 单元格级问题只降级为缺失值 + 警告，不中断行
// ==========================================

use crate::domain::import::CellValue;
use crate::domain::student::Grade;
use crate::importer::student_importer_trait::ValueNormalizer as ValueNormalizerTrait;

/// 缺失值哨兵（大小写不敏感）
const ABSENCE_SENTINELS: [&str; 4] = ["null", "undefined", "nan", "none"];

/// 成绩同义词（表格常见写法 → 标准成绩）
const GRADE_SYNONYMS: [(&str, Grade); 4] = [
    ("优秀", Grade::Excellent),
    ("良好", Grade::Good),
    ("及", Grade::Pass),
    ("待", Grade::PendingPass),
];

/// 标准化结果：值 + 可选的降级警告
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Normalized<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    fn degraded(value: T, warning: String) -> Self {
        Self {
            value,
            warning: Some(warning),
        }
    }
}

pub struct ValueNormalizer;

impl ValueNormalizerTrait for ValueNormalizer {
    fn normalize_number(&self, cell: &CellValue) -> Normalized<Option<f64>> {
        match cell {
            CellValue::Absent => Normalized::clean(None),
            CellValue::Number(n) => Normalized::clean(finite_or_none(*n)),
            CellValue::Text(raw) => {
                let trimmed = raw.trim();
                if is_absence_sentinel(trimmed) {
                    return Normalized::clean(None);
                }
                match strip_numeric(trimmed).parse::<f64>() {
                    Ok(n) => Normalized::clean(finite_or_none(n)),
                    Err(_) => Normalized::degraded(None, format!("无法解析为数值: {}", trimmed)),
                }
            }
        }
    }

    fn normalize_text(&self, cell: &CellValue) -> Option<String> {
        match cell {
            CellValue::Absent => None,
            CellValue::Number(n) if !n.is_finite() => None,
            CellValue::Number(n) => Some(render_number(*n)),
            CellValue::Text(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }

    fn normalize_grade(&self, cell: &CellValue) -> Normalized<Grade> {
        let token = match self.normalize_text(cell) {
            None => return Normalized::clean(Grade::Ungraded),
            Some(token) => token,
        };

        let synonym = GRADE_SYNONYMS
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, grade)| *grade);

        match synonym.or_else(|| Grade::from_token(&token)) {
            Some(grade) => Normalized::clean(grade),
            None => Normalized::degraded(
                Grade::Ungraded,
                format!("无效的成绩值「{}」，已清空", token),
            ),
        }
    }
}

fn is_absence_sentinel(trimmed: &str) -> bool {
    trimmed.is_empty()
        || ABSENCE_SENTINELS
            .iter()
            .any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// 逗号视为小数点；仅保留数字、首个小数点与前导符号
fn strip_numeric(raw: &str) -> String {
    let mut kept = String::with_capacity(raw.len());
    let mut seen_dot = false;

    for ch in raw.chars().map(|c| if c == ',' { '.' } else { c }) {
        match ch {
            '0'..='9' => kept.push(ch),
            '.' if !seen_dot => {
                seen_dot = true;
                kept.push(ch);
            }
            '-' | '+' if kept.is_empty() => kept.push(ch),
            _ => {}
        }
    }
    kept
}

fn finite_or_none(n: f64) -> Option<f64> {
    if !n.is_finite() {
        None
    } else if n == 0.0 {
        // -0 归一为 0.0
        Some(0.0)
    } else {
        Some(n)
    }
}

/// 整数值去掉 ".0"（学号 1.0 → "1"）
fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_number_zero_preserved() {
        let n = ValueNormalizer;
        assert_eq!(n.normalize_number(&text("0")).value, Some(0.0));
        assert_eq!(n.normalize_number(&text("-0")).value, Some(0.0));
        assert_eq!(n.normalize_number(&CellValue::Number(0.0)).value, Some(0.0));
    }

    #[test]
    fn test_number_sentinels_absent_without_warning() {
        let n = ValueNormalizer;
        for raw in ["", "   ", "null", "NULL", "undefined", "NaN", "None"] {
            let result = n.normalize_number(&text(raw));
            assert_eq!(result.value, None, "raw={:?}", raw);
            assert!(result.warning.is_none(), "raw={:?}", raw);
        }
        assert_eq!(n.normalize_number(&CellValue::Absent).value, None);
        assert_eq!(n.normalize_number(&CellValue::Number(f64::NAN)).value, None);
        assert_eq!(
            n.normalize_number(&CellValue::Number(f64::INFINITY)).value,
            None
        );
    }

    #[test]
    fn test_number_strips_units_and_commas() {
        let n = ValueNormalizer;
        assert_eq!(n.normalize_number(&text("152.5cm")).value, Some(152.5));
        assert_eq!(n.normalize_number(&text("4,8")).value, Some(4.8));
        assert_eq!(n.normalize_number(&text(" 38kg ")).value, Some(38.0));
        assert_eq!(n.normalize_number(&text("5.0.1")).value, Some(5.01));
        assert_eq!(n.normalize_number(&text("-1.5")).value, Some(-1.5));
    }

    #[test]
    fn test_number_unparseable_warns() {
        let n = ValueNormalizer;
        let result = n.normalize_number(&text("未测"));
        assert_eq!(result.value, None);
        assert!(result.warning.is_some());

        let result = n.normalize_number(&text("."));
        assert_eq!(result.value, None);
        assert!(result.warning.is_some());
    }

    #[test]
    fn test_text_trims_and_renders_integral_numbers() {
        let n = ValueNormalizer;
        assert_eq!(n.normalize_text(&text("  张三 ")), Some("张三".to_string()));
        assert_eq!(n.normalize_text(&text("   ")), None);
        assert_eq!(n.normalize_text(&CellValue::Absent), None);
        assert_eq!(n.normalize_text(&CellValue::Number(1.0)), Some("1".to_string()));
        assert_eq!(n.normalize_text(&CellValue::Number(4.5)), Some("4.5".to_string()));
    }

    #[test]
    fn test_grade_synonyms_and_invalid_tokens() {
        let n = ValueNormalizer;
        assert_eq!(n.normalize_grade(&text("优秀")).value, Grade::Excellent);
        assert_eq!(n.normalize_grade(&text(" 良好 ")).value, Grade::Good);
        assert_eq!(n.normalize_grade(&text("及")).value, Grade::Pass);
        assert_eq!(n.normalize_grade(&text("待")).value, Grade::PendingPass);
        assert_eq!(n.normalize_grade(&text("差")).value, Grade::Poor);

        let invalid = n.normalize_grade(&text("甲"));
        assert_eq!(invalid.value, Grade::Ungraded);
        assert!(invalid.warning.is_some());

        let empty = n.normalize_grade(&CellValue::Absent);
        assert_eq!(empty.value, Grade::Ungraded);
        assert!(empty.warning.is_none());
    }
}
