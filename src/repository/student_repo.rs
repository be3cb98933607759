// ==========================================
// 班级学生档案 - 学生档案仓储
// ==========================================
// 职责: students 表 CRUD；导入事务内的写入辅助函数
// 红线: Repository 不含业务规则，只做数据 CRUD
// 说明: *_tx 函数接收调用方已开启事务的连接，不自行提交
// ==========================================

use crate::db::{ensure_schema, open_sqlite_connection};
use crate::domain::import::{DirectoryEntry, GradeUpdate, NameDirectory};
use crate::domain::student::{Grade, StudentRecord, Subject, SubjectGrades};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

const SELECT_COLUMNS: &str = r#"
    id, name, gender, class, semester,
    height, weight, chest_circumference, vital_capacity, vision_left, vision_right,
    dental_caries, physical_test_status, comments,
    daof, yuwen, shuxue, yingyu, laodong, tiyu, yinyue, meishu, kexue, zonghe, xinxi, shufa,
    created_at, updated_at
"#;

// 班级 → 学号（数字序）；非数字学号按 0 参与排序
const ORDER_BY: &str = "ORDER BY class, CAST(id AS INTEGER), id";

fn grade_at(row: &Row, idx: usize) -> rusqlite::Result<Grade> {
    let raw: String = row.get(idx)?;
    // 历史数据中的非法值按未评处理
    Ok(Grade::from_token(raw.trim()).unwrap_or_default())
}

fn map_student_row(row: &Row) -> rusqlite::Result<StudentRecord> {
    let mut grades = SubjectGrades::default();
    for (offset, subject) in Subject::ALL.iter().enumerate() {
        grades.set(*subject, grade_at(row, 14 + offset)?);
    }

    Ok(StudentRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        gender: row.get(2)?,
        class: row.get(3)?,
        semester: row.get(4)?,
        height: row.get(5)?,
        weight: row.get(6)?,
        chest_circumference: row.get(7)?,
        vital_capacity: row.get(8)?,
        vision_left: row.get(9)?,
        vision_right: row.get(10)?,
        dental_caries: row.get(11)?,
        physical_test_status: row.get(12)?,
        comments: row.get(13)?,
        grades,
        created_at: row.get::<_, DateTime<Utc>>(26)?,
        updated_at: row.get::<_, DateTime<Utc>>(27)?,
    })
}

// ==========================================
// StudentRepository
// ==========================================
pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    /// 创建新的 Repository 实例（自动建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 使用共享连接创建（与 ConfigManager 共用同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        ensure_schema(&*repo.get_conn()?)?;
        Ok(repo)
    }

    /// 共享连接句柄
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub(crate) fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== 查询 =====

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<StudentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM students WHERE id = ?1", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, params![id], map_student_row)
            .optional()?;
        Ok(record)
    }

    /// 全部学生（按班级、学号排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<StudentRecord>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM students {}", SELECT_COLUMNS, ORDER_BY);
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], map_student_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM students", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// 学号 → 姓名/班级快照
    pub fn name_directory(&self) -> RepositoryResult<NameDirectory> {
        let conn = self.get_conn()?;
        Self::name_directory_tx(&conn)
    }

    // ===== 单条维护 =====

    pub fn delete(&self, id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM students WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    /// 更新单个学生的指定科目成绩（未给出的科目保持不变）
    ///
    /// # 返回
    /// - Ok(false): 学号不存在
    pub fn save_grades(
        &self,
        id: &str,
        grades: &BTreeMap<Subject, Grade>,
        semester: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let update = GradeUpdate {
            student_id: id.to_string(),
            student_name: String::new(),
            class: String::new(),
            semester: semester.to_string(),
            grades: grades.clone(),
        };
        let affected = Self::update_grades_tx(&conn, &update, now)?;
        Ok(affected > 0)
    }

    /// 清空单个学生的全部成绩
    pub fn clear_grades(
        &self,
        id: &str,
        semester: &str,
        now: DateTime<Utc>,
    ) -> RepositoryResult<bool> {
        let cleared = SubjectGrades::default().iter().collect();
        self.save_grades(id, &cleared, semester, now)
    }

    // ===== 事务内辅助函数（由确认导入调用）=====

    pub fn exists_tx(conn: &Connection, id: &str) -> RepositoryResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM students WHERE id = ?1 LIMIT 1",
                params![id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(found)
    }

    pub fn insert_tx(conn: &Connection, record: &StudentRecord) -> RepositoryResult<()> {
        let g = &record.grades;
        conn.execute(
            r#"
            INSERT INTO students (
                id, name, gender, class, semester,
                height, weight, chest_circumference, vital_capacity, vision_left, vision_right,
                dental_caries, physical_test_status, comments,
                daof, yuwen, shuxue, yingyu, laodong, tiyu, yinyue, meishu, kexue, zonghe, xinxi, shufa,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28
            )
            "#,
            params![
                record.id,
                record.name,
                record.gender,
                record.class,
                record.semester,
                record.height,
                record.weight,
                record.chest_circumference,
                record.vital_capacity,
                record.vision_left,
                record.vision_right,
                record.dental_caries,
                record.physical_test_status,
                record.comments,
                g.daof.as_str(),
                g.yuwen.as_str(),
                g.shuxue.as_str(),
                g.yingyu.as_str(),
                g.laodong.as_str(),
                g.tiyu.as_str(),
                g.yinyue.as_str(),
                g.meishu.as_str(),
                g.kexue.as_str(),
                g.zonghe.as_str(),
                g.xinxi.as_str(),
                g.shufa.as_str(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// 覆盖除 created_at 外的全部字段
    ///
    /// # 返回
    /// - 受影响行数（0 = 学号不存在）
    pub fn update_roster_tx(conn: &Connection, record: &StudentRecord) -> RepositoryResult<usize> {
        let g = &record.grades;
        let affected = conn.execute(
            r#"
            UPDATE students SET
                name = ?2, gender = ?3, class = ?4, semester = ?5,
                height = ?6, weight = ?7, chest_circumference = ?8, vital_capacity = ?9,
                vision_left = ?10, vision_right = ?11,
                dental_caries = ?12, physical_test_status = ?13, comments = ?14,
                daof = ?15, yuwen = ?16, shuxue = ?17, yingyu = ?18, laodong = ?19, tiyu = ?20,
                yinyue = ?21, meishu = ?22, kexue = ?23, zonghe = ?24, xinxi = ?25, shufa = ?26,
                updated_at = ?27
            WHERE id = ?1
            "#,
            params![
                record.id,
                record.name,
                record.gender,
                record.class,
                record.semester,
                record.height,
                record.weight,
                record.chest_circumference,
                record.vital_capacity,
                record.vision_left,
                record.vision_right,
                record.dental_caries,
                record.physical_test_status,
                record.comments,
                g.daof.as_str(),
                g.yuwen.as_str(),
                g.shuxue.as_str(),
                g.yingyu.as_str(),
                g.laodong.as_str(),
                g.tiyu.as_str(),
                g.yinyue.as_str(),
                g.meishu.as_str(),
                g.kexue.as_str(),
                g.zonghe.as_str(),
                g.xinxi.as_str(),
                g.shufa.as_str(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(affected)
    }

    /// 只更新给定科目列 + semester + updated_at
    ///
    /// # 返回
    /// - 受影响行数（0 = 学号不存在）
    pub fn update_grades_tx(
        conn: &Connection,
        update: &GradeUpdate,
        now: DateTime<Utc>,
    ) -> RepositoryResult<usize> {
        // 列名来自固定科目代码，不含外部输入
        let mut set_clauses = vec!["semester = ?1".to_string(), "updated_at = ?2".to_string()];
        let mut values: Vec<String> = vec![update.semester.clone(), now.to_rfc3339()];
        for (subject, grade) in &update.grades {
            values.push(grade.as_str().to_string());
            set_clauses.push(format!("{} = ?{}", subject.code(), values.len()));
        }
        values.push(update.student_id.clone());

        let sql = format!(
            "UPDATE students SET {} WHERE id = ?{}",
            set_clauses.join(", "),
            values.len()
        );
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
        Ok(affected)
    }

    /// 删除全部学生（全量替换导入的第一步）
    pub fn delete_all_tx(conn: &Connection) -> RepositoryResult<usize> {
        Ok(conn.execute("DELETE FROM students", [])?)
    }

    pub fn name_directory_tx(conn: &Connection) -> RepositoryResult<NameDirectory> {
        let mut stmt = conn.prepare("SELECT id, name, class FROM students")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                DirectoryEntry {
                    name: row.get(1)?,
                    class: row.get(2)?,
                },
            ))
        })?;

        let mut directory = NameDirectory::new();
        for row in rows {
            let (id, entry) = row?;
            directory.insert(id, entry);
        }
        Ok(directory)
    }
}
