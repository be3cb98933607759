// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use class_master::config::ImportConfigReader;
use std::error::Error;

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub default_semester: String,
    pub roster_full_reset: bool,
    pub preview_warning_limit: usize,
    pub staging_capacity: usize,
}

impl MockConfig {
    /// 创建默认配置
    pub fn default() -> Self {
        Self {
            default_semester: "上学期".to_string(),
            roster_full_reset: true,
            preview_warning_limit: 0,
            staging_capacity: 4,
        }
    }

    /// 指定默认学期
    pub fn with_semester(semester: &str) -> Self {
        let mut config = Self::default();
        config.default_semester = semester.to_string();
        config
    }

    /// 预览警告上限
    pub fn with_warning_limit(limit: usize) -> Self {
        let mut config = Self::default();
        config.preview_warning_limit = limit;
        config
    }
}

#[async_trait]
impl ImportConfigReader for MockConfig {
    async fn get_default_semester(&self) -> Result<String, Box<dyn Error>> {
        Ok(self.default_semester.clone())
    }

    async fn get_roster_full_reset(&self) -> Result<bool, Box<dyn Error>> {
        Ok(self.roster_full_reset)
    }

    async fn get_preview_warning_limit(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.preview_warning_limit)
    }

    async fn get_staging_capacity(&self) -> Result<usize, Box<dyn Error>> {
        Ok(self.staging_capacity)
    }
}
