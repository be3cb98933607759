// ==========================================
// 班级学生档案 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use crate::api::{ApiResult, ImportApi};
use std::path::PathBuf;
use std::sync::Arc;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "CLASS_MASTER_DB";

/// 应用状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 导入API
    pub import_api: Arc<ImportApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(ApiError): 打开数据库或建表失败
    pub async fn new(db_path: String) -> ApiResult<Self> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let import_api = Arc::new(ImportApi::new(&db_path).await?);

        Ok(Self {
            db_path,
            import_api,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级：
/// 1. 环境变量 CLASS_MASTER_DB
/// 2. 用户数据目录/class-master/class_master.db
/// 3. 当前目录 ./class_master.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./class_master.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("class-master");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("class_master.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[tokio::test]
    async fn test_app_state_opens_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).await.unwrap();
        assert_eq!(state.db_path, db_path);
        assert_eq!(state.import_api.repository().count().unwrap(), 0);
    }
}
