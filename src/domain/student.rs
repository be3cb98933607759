// ==========================================
// 班级学生档案 - 学生领域模型
// ==========================================
// 职责: 学生档案实体、科目/成绩枚举、规范字段键
// 红线: 成绩字段只允许封闭枚举 {优, 良, 及格, 待及格, 差, ""}
// ==========================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ==========================================
// Subject - 科目（12 个固定科目代码）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Daof,    // 道法
    Yuwen,   // 语文
    Shuxue,  // 数学
    Yingyu,  // 英语
    Laodong, // 劳动
    Tiyu,    // 体育
    Yinyue,  // 音乐
    Meishu,  // 美术
    Kexue,   // 科学
    Zonghe,  // 综合
    Xinxi,   // 信息
    Shufa,   // 书法
}

impl Subject {
    /// 全部科目（按成绩表展示顺序）
    pub const ALL: [Subject; 12] = [
        Subject::Daof,
        Subject::Yuwen,
        Subject::Shuxue,
        Subject::Yingyu,
        Subject::Laodong,
        Subject::Tiyu,
        Subject::Yinyue,
        Subject::Meishu,
        Subject::Kexue,
        Subject::Zonghe,
        Subject::Xinxi,
        Subject::Shufa,
    ];

    /// 数据库列名 / 科目代码
    pub fn code(&self) -> &'static str {
        match self {
            Subject::Daof => "daof",
            Subject::Yuwen => "yuwen",
            Subject::Shuxue => "shuxue",
            Subject::Yingyu => "yingyu",
            Subject::Laodong => "laodong",
            Subject::Tiyu => "tiyu",
            Subject::Yinyue => "yinyue",
            Subject::Meishu => "meishu",
            Subject::Kexue => "kexue",
            Subject::Zonghe => "zonghe",
            Subject::Xinxi => "xinxi",
            Subject::Shufa => "shufa",
        }
    }

    /// 中文科目名（成绩表标准表头）
    pub fn label(&self) -> &'static str {
        match self {
            Subject::Daof => "道法",
            Subject::Yuwen => "语文",
            Subject::Shuxue => "数学",
            Subject::Yingyu => "英语",
            Subject::Laodong => "劳动",
            Subject::Tiyu => "体育",
            Subject::Yinyue => "音乐",
            Subject::Meishu => "美术",
            Subject::Kexue => "科学",
            Subject::Zonghe => "综合",
            Subject::Xinxi => "信息",
            Subject::Shufa => "书法",
        }
    }

    pub fn from_code(code: &str) -> Option<Subject> {
        Subject::ALL.iter().copied().find(|s| s.code() == code)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ==========================================
// Grade - 等级制成绩（封闭枚举）
// ==========================================
// 序列化为原始字符（"优"/"良"/"及格"/"待及格"/"差"/""）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Grade {
    Excellent,   // 优
    Good,        // 良
    Pass,        // 及格
    PendingPass, // 待及格
    Poor,        // 差
    #[default]
    Ungraded, // ""（未评）
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Excellent => "优",
            Grade::Good => "良",
            Grade::Pass => "及格",
            Grade::PendingPass => "待及格",
            Grade::Poor => "差",
            Grade::Ungraded => "",
        }
    }

    /// 严格匹配枚举成员（不做同义词转换）
    pub fn from_token(token: &str) -> Option<Grade> {
        match token {
            "优" => Some(Grade::Excellent),
            "良" => Some(Grade::Good),
            "及格" => Some(Grade::Pass),
            "待及格" => Some(Grade::PendingPass),
            "差" => Some(Grade::Poor),
            "" => Some(Grade::Ungraded),
            _ => None,
        }
    }

    pub fn is_graded(&self) -> bool {
        !matches!(self, Grade::Ungraded)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Grade::from_token(raw.trim())
            .ok_or_else(|| serde::de::Error::custom(format!("无效的成绩值: {}", raw)))
    }
}

// ==========================================
// SubjectGrades - 12 科成绩（固定形状）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectGrades {
    #[serde(default)]
    pub daof: Grade,
    #[serde(default)]
    pub yuwen: Grade,
    #[serde(default)]
    pub shuxue: Grade,
    #[serde(default)]
    pub yingyu: Grade,
    #[serde(default)]
    pub laodong: Grade,
    #[serde(default)]
    pub tiyu: Grade,
    #[serde(default)]
    pub yinyue: Grade,
    #[serde(default)]
    pub meishu: Grade,
    #[serde(default)]
    pub kexue: Grade,
    #[serde(default)]
    pub zonghe: Grade,
    #[serde(default)]
    pub xinxi: Grade,
    #[serde(default)]
    pub shufa: Grade,
}

impl SubjectGrades {
    pub fn get(&self, subject: Subject) -> Grade {
        match subject {
            Subject::Daof => self.daof,
            Subject::Yuwen => self.yuwen,
            Subject::Shuxue => self.shuxue,
            Subject::Yingyu => self.yingyu,
            Subject::Laodong => self.laodong,
            Subject::Tiyu => self.tiyu,
            Subject::Yinyue => self.yinyue,
            Subject::Meishu => self.meishu,
            Subject::Kexue => self.kexue,
            Subject::Zonghe => self.zonghe,
            Subject::Xinxi => self.xinxi,
            Subject::Shufa => self.shufa,
        }
    }

    pub fn set(&mut self, subject: Subject, grade: Grade) {
        let slot = match subject {
            Subject::Daof => &mut self.daof,
            Subject::Yuwen => &mut self.yuwen,
            Subject::Shuxue => &mut self.shuxue,
            Subject::Yingyu => &mut self.yingyu,
            Subject::Laodong => &mut self.laodong,
            Subject::Tiyu => &mut self.tiyu,
            Subject::Yinyue => &mut self.yinyue,
            Subject::Meishu => &mut self.meishu,
            Subject::Kexue => &mut self.kexue,
            Subject::Zonghe => &mut self.zonghe,
            Subject::Xinxi => &mut self.xinxi,
            Subject::Shufa => &mut self.shufa,
        };
        *slot = grade;
    }

    /// 按科目顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (Subject, Grade)> + '_ {
        Subject::ALL.iter().map(move |s| (*s, self.get(*s)))
    }

    pub fn graded_count(&self) -> usize {
        self.iter().filter(|(_, g)| g.is_graded()).count()
    }
}

// ==========================================
// StudentRecord - 学生档案（持久化实体）
// ==========================================
// 对齐: students 表（成绩为同表列，不单独建表）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    // ===== 主键 =====
    pub id: String, // 学号（人工分配，跨导入稳定）

    // ===== 基础信息 =====
    pub name: String,
    pub gender: String,
    pub class: String,
    pub semester: String,

    // ===== 体检数值（None = 未测，0.0 为有效测量值）=====
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub chest_circumference: Option<f64>,
    pub vital_capacity: Option<f64>,
    pub vision_left: Option<f64>,
    pub vision_right: Option<f64>,

    // ===== 文本备注 =====
    pub dental_caries: String,
    pub physical_test_status: String,
    pub comments: String,

    // ===== 成绩 =====
    #[serde(flatten)]
    pub grades: SubjectGrades,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudentRecord {
    /// 以类型默认值构造（文本 → ""，数值 → None，成绩 → 未评）
    pub fn blank(id: String, name: String, gender: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            gender,
            class: String::new(),
            semester: String::new(),
            height: None,
            weight: None,
            chest_circumference: None,
            vital_capacity: None,
            vision_left: None,
            vision_right: None,
            dental_caries: String::new(),
            physical_test_status: String::new(),
            comments: String::new(),
            grades: SubjectGrades::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// 比较除时间戳外的全部内容
    pub fn same_content(&self, other: &StudentRecord) -> bool {
        let mut a = self.clone();
        a.created_at = other.created_at;
        a.updated_at = other.updated_at;
        &a == other
    }
}

// ==========================================
// FieldKey - 规范字段键
// ==========================================
// 用途: 列映射器输出，表头同义词统一到此键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKey {
    Id,
    Name,
    Gender,
    Class,
    Semester,
    Height,
    Weight,
    ChestCircumference,
    VitalCapacity,
    VisionLeft,
    VisionRight,
    DentalCaries,
    PhysicalTestStatus,
    Comments,
    Grade(Subject),
}

impl FieldKey {
    /// 规范键名（与数据库列名一致）
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Id => "id",
            FieldKey::Name => "name",
            FieldKey::Gender => "gender",
            FieldKey::Class => "class",
            FieldKey::Semester => "semester",
            FieldKey::Height => "height",
            FieldKey::Weight => "weight",
            FieldKey::ChestCircumference => "chest_circumference",
            FieldKey::VitalCapacity => "vital_capacity",
            FieldKey::VisionLeft => "vision_left",
            FieldKey::VisionRight => "vision_right",
            FieldKey::DentalCaries => "dental_caries",
            FieldKey::PhysicalTestStatus => "physical_test_status",
            FieldKey::Comments => "comments",
            FieldKey::Grade(subject) => subject.code(),
        }
    }

    /// 中文标准表头（用于提示信息）
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::Id => "学号",
            FieldKey::Name => "姓名",
            FieldKey::Gender => "性别",
            FieldKey::Class => "班级",
            FieldKey::Semester => "学期",
            FieldKey::Height => "身高",
            FieldKey::Weight => "体重",
            FieldKey::ChestCircumference => "胸围",
            FieldKey::VitalCapacity => "肺活量",
            FieldKey::VisionLeft => "视力左",
            FieldKey::VisionRight => "视力右",
            FieldKey::DentalCaries => "龋齿",
            FieldKey::PhysicalTestStatus => "体测情况",
            FieldKey::Comments => "评语",
            FieldKey::Grade(subject) => subject.label(),
        }
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_token_roundtrip_strict() {
        assert_eq!(Grade::from_token("待及格"), Some(Grade::PendingPass));
        assert_eq!(Grade::from_token(""), Some(Grade::Ungraded));
        assert_eq!(Grade::from_token("优秀"), None);
        assert_eq!(Grade::Pass.as_str(), "及格");
    }

    #[test]
    fn test_subject_grades_set_get() {
        let mut grades = SubjectGrades::default();
        assert_eq!(grades.graded_count(), 0);

        grades.set(Subject::Shuxue, Grade::Excellent);
        assert_eq!(grades.get(Subject::Shuxue), Grade::Excellent);
        assert_eq!(grades.get(Subject::Yuwen), Grade::Ungraded);
        assert_eq!(grades.graded_count(), 1);
    }

    #[test]
    fn test_student_record_serializes_flat_grades() {
        let mut record = StudentRecord::blank(
            "1".to_string(),
            "张三".to_string(),
            "男".to_string(),
            Utc::now(),
        );
        record.grades.set(Subject::Yuwen, Grade::Good);
        record.height = Some(0.0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["yuwen"], "良");
        assert_eq!(json["shuxue"], "");
        assert_eq!(json["height"], 0.0);
        assert!(json["weight"].is_null());
    }

    #[test]
    fn test_same_content_ignores_timestamps() {
        let a = StudentRecord::blank("1".into(), "张三".into(), "男".into(), Utc::now());
        let mut b = a.clone();
        b.updated_at = a.updated_at + chrono::Duration::seconds(5);
        assert!(a.same_content(&b));

        b.class = "三年级一班".to_string();
        assert!(!a.same_content(&b));
    }
}
