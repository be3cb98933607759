// ==========================================
// 班级学生档案 - 确认导入落库
// ==========================================
// 流程: BEGIN IMMEDIATE → 事务内重新校验 → 逐行写入 → 决策 → COMMIT / ROLLBACK
// 规则:
// - 单行写入失败只计数记录，不中断循环、不中断事务
// - success_count > 0 才提交，否则整体回滚（含全量替换的清空）
// - 更新路径保留 created_at，只刷新 updated_at
// ==========================================

use crate::domain::import::{
    ImportCandidate, ImportMode, ImportResult, NameDirectory, RejectReason, RowRejection,
};
use crate::importer::error::{ImportError, ImportOutcome};
use crate::importer::row_validator::SheetValidation;
use crate::repository::{RepositoryError, StudentRepository};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, instrument, warn};

/// 单行写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Updated,
}

pub struct ReconciliationCommitter;

impl ReconciliationCommitter {
    /// 执行一次确认导入
    ///
    /// # 参数
    /// - conn: 已加锁的连接（调用方持有 Mutex）
    /// - mode: 导入模式
    /// - now: 本次导入的时间戳
    /// - validate: 整表校验闭包，接收事务内读取的学号快照
    ///
    /// # 返回
    /// - Ok(ImportResult): 提交或回滚后的结果
    /// - Err: 事务外/整批失败（已回滚，未写入任何数据）
    #[instrument(skip(self, conn, now, validate))]
    pub fn commit<F>(
        &self,
        conn: &Connection,
        mode: ImportMode,
        now: DateTime<Utc>,
        validate: F,
    ) -> ImportOutcome<ImportResult>
    where
        F: FnOnce(&NameDirectory) -> ImportOutcome<SheetValidation>,
    {
        // IMMEDIATE: 开启即占写锁，并发的确认导入在此排队
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        // 校验读取与写入在同一事务内，快照不会过期
        let directory = StudentRepository::name_directory_tx(&tx)?;
        let SheetValidation {
            candidates,
            candidate_rows,
            rejections,
            warnings,
            ..
        } = validate(&directory)?;

        let mut error_details = rejections;
        let mut inserted_count = 0;
        let mut updated_count = 0;

        if mode == ImportMode::RosterReset {
            let deleted = StudentRepository::delete_all_tx(&tx)?;
            info!(deleted = deleted, "全量替换: 已清空现有学生");
        }

        for (candidate, row_number) in candidates.iter().zip(candidate_rows) {
            match Self::apply(&tx, candidate, now) {
                Ok(Applied::Inserted) => inserted_count += 1,
                Ok(Applied::Updated) => updated_count += 1,
                Err(e) => {
                    warn!(row_number = row_number, student_id = candidate.student_id(), error = %e, "单行写入失败");
                    error_details.push(RowRejection::new(
                        row_number,
                        Some(candidate.student_id().to_string()),
                        RejectReason::ApplyFailed {
                            message: e.to_string(),
                        },
                    ));
                }
            }
        }

        let success_count = inserted_count + updated_count;
        let committed = success_count > 0;
        if committed {
            tx.commit()
                .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;
        } else {
            tx.rollback()
                .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;
        }

        error_details.sort_by_key(|r| r.row_number);
        let error_count = error_details.len();
        info!(
            success = success_count,
            inserted = inserted_count,
            updated = updated_count,
            errors = error_count,
            committed = committed,
            "确认导入完成"
        );

        Ok(ImportResult {
            mode,
            status: ImportResult::status_for(success_count, error_count),
            committed,
            success_count,
            inserted_count,
            updated_count,
            error_count,
            error_details,
            warnings,
        })
    }

    fn apply(
        tx: &Connection,
        candidate: &ImportCandidate,
        now: DateTime<Utc>,
    ) -> Result<Applied, RepositoryError> {
        match candidate {
            ImportCandidate::Roster(record) => {
                // 全量替换时清空后仍先探测: 同批次重复学号走更新分支，后行覆盖前行
                if StudentRepository::exists_tx(tx, &record.id)? {
                    let mut record = record.clone();
                    record.updated_at = now;
                    StudentRepository::update_roster_tx(tx, &record)?;
                    debug!(student_id = %record.id, "更新学生");
                    Ok(Applied::Updated)
                } else {
                    StudentRepository::insert_tx(tx, record)?;
                    debug!(student_id = %record.id, "新增学生");
                    Ok(Applied::Inserted)
                }
            }
            ImportCandidate::Grades(update) => {
                let affected = StudentRepository::update_grades_tx(tx, update, now)?;
                if affected == 0 {
                    return Err(RepositoryError::NotFound {
                        entity: "students".to_string(),
                        id: update.student_id.clone(),
                    });
                }
                Ok(Applied::Updated)
            }
        }
    }
}
