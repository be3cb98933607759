// ==========================================
// 班级学生档案 - 配置层
// ==========================================
// 职责: 导入相关配置读取与写入
// 存储: config_kv 表（scope_id = 'global'）
// ==========================================

pub mod config_manager;
pub mod import_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use import_config_trait::ImportConfigReader;
