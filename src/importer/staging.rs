// ==========================================
// 班级学生档案 - 预览暂存区
// ==========================================
// 职责: 预览后保存已解析工作表，确认时按 source_ref 取回
// 约束: 容量有限，超出后淘汰最早的预览；确认提交成功后移除
// ==========================================

use crate::domain::import::{ImportMode, ParsedSheet};
use crate::importer::error::{ImportError, ImportOutcome};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// 暂存的预览来源
#[derive(Debug, Clone)]
pub struct StagedSheet {
    pub source_ref: String,
    pub mode: ImportMode,
    pub semester: Option<String>,
    pub sheet: ParsedSheet,
}

pub struct PreviewStaging {
    capacity: usize,
    entries: Mutex<VecDeque<StagedSheet>>,
}

impl PreviewStaging {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> ImportOutcome<std::sync::MutexGuard<'_, VecDeque<StagedSheet>>> {
        self.entries
            .lock()
            .map_err(|e| ImportError::LockError(e.to_string()))
    }

    /// 暂存工作表，返回新的 source_ref
    pub fn stage(
        &self,
        sheet: ParsedSheet,
        mode: ImportMode,
        semester: Option<String>,
    ) -> ImportOutcome<String> {
        let source_ref = Uuid::new_v4().to_string();
        let mut entries = self.lock()?;

        while entries.len() >= self.capacity {
            if let Some(evicted) = entries.pop_front() {
                debug!(source_ref = %evicted.source_ref, "暂存区已满，淘汰最早的预览");
            }
        }

        entries.push_back(StagedSheet {
            source_ref: source_ref.clone(),
            mode,
            semester,
            sheet,
        });
        Ok(source_ref)
    }

    /// 按引用读取（不移除）
    pub fn get(&self, source_ref: &str) -> ImportOutcome<StagedSheet> {
        let entries = self.lock()?;
        entries
            .iter()
            .find(|s| s.source_ref == source_ref)
            .cloned()
            .ok_or_else(|| ImportError::SourceNotFound(source_ref.to_string()))
    }

    /// 移除引用，返回是否存在
    pub fn remove(&self, source_ref: &str) -> ImportOutcome<bool> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|s| s.source_ref != source_ref);
        Ok(entries.len() != before)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_get_remove() {
        let staging = PreviewStaging::new(4);
        let source_ref = staging
            .stage(ParsedSheet::default(), ImportMode::Grades, Some("上学期".into()))
            .unwrap();

        let staged = staging.get(&source_ref).unwrap();
        assert_eq!(staged.mode, ImportMode::Grades);
        assert_eq!(staged.semester.as_deref(), Some("上学期"));

        assert!(staging.remove(&source_ref).unwrap());
        assert!(!staging.remove(&source_ref).unwrap());
        assert!(matches!(
            staging.get(&source_ref),
            Err(ImportError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let staging = PreviewStaging::new(2);
        let first = staging
            .stage(ParsedSheet::default(), ImportMode::RosterReset, None)
            .unwrap();
        let second = staging
            .stage(ParsedSheet::default(), ImportMode::RosterReset, None)
            .unwrap();
        let third = staging
            .stage(ParsedSheet::default(), ImportMode::RosterReset, None)
            .unwrap();

        assert_eq!(staging.len(), 2);
        assert!(staging.get(&first).is_err());
        assert!(staging.get(&second).is_ok());
        assert!(staging.get(&third).is_ok());
    }
}
