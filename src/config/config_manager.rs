// ==========================================
// 班级学生档案 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::{ensure_schema, open_sqlite_connection};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA 并建表（均幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            ensure_schema(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_default_semester(&self) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_SEMESTER, "上学期")?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Ok("上学期".to_string())
        } else {
            Ok(trimmed.to_string())
        }
    }

    async fn get_roster_full_reset(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::ROSTER_FULL_RESET, "true")?;
        match value.trim().to_lowercase().as_str() {
            "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            _ => {
                tracing::warn!(
                    config_key = config_keys::ROSTER_FULL_RESET,
                    raw_value = %value,
                    "配置格式错误，使用默认值 true"
                );
                Ok(true)
            }
        }
    }

    async fn get_preview_warning_limit(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::PREVIEW_WARNING_LIMIT, "50")?;
        Ok(value.trim().parse::<usize>().unwrap_or(50))
    }

    async fn get_staging_capacity(&self) -> Result<usize, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::STAGING_CAPACITY, "16")?;
        // 容量至少为 1，否则预览后无法确认
        Ok(value.trim().parse::<usize>().unwrap_or(16).max(1))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 成绩表
    pub const DEFAULT_SEMESTER: &str = "default_semester";

    // 名单导入
    pub const ROSTER_FULL_RESET: &str = "roster_full_reset";

    // 预览
    pub const PREVIEW_WARNING_LIMIT: &str = "preview_warning_limit";
    pub const STAGING_CAPACITY: &str = "staging_capacity";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[tokio::test]
    async fn test_defaults_when_unset() {
        let config = manager();
        assert_eq!(config.get_default_semester().await.unwrap(), "上学期");
        assert!(config.get_roster_full_reset().await.unwrap());
        assert_eq!(config.get_preview_warning_limit().await.unwrap(), 50);
        assert_eq!(config.get_staging_capacity().await.unwrap(), 16);
    }

    #[tokio::test]
    async fn test_overrides_and_snapshot() {
        let config = manager();
        config
            .set_global_config(config_keys::DEFAULT_SEMESTER, "下学期")
            .unwrap();
        config
            .set_global_config(config_keys::ROSTER_FULL_RESET, "false")
            .unwrap();
        config
            .set_global_config(config_keys::STAGING_CAPACITY, "0")
            .unwrap();

        assert_eq!(config.get_default_semester().await.unwrap(), "下学期");
        assert!(!config.get_roster_full_reset().await.unwrap());
        assert_eq!(config.get_staging_capacity().await.unwrap(), 1);

        let snapshot: HashMap<String, String> =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["default_semester"], "下学期");
    }
}
