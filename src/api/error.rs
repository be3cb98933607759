// ==========================================
// 班级学生档案 - API 层错误类型
// ==========================================
// 职责: 统一对外错误，屏蔽导入层/仓储层细节
// 工具: thiserror 派生宏
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use std::error::Error;
use thiserror::Error;

/// API 层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ===== 输入错误 =====
    #[error("参数错误: {0}")]
    InvalidInput(String),

    #[error("记录不存在: {0}")]
    NotFound(String),

    // ===== 导入错误 =====
    #[error("数据校验失败: {0}")]
    ValidationError(String),

    #[error("导入失败: {0}")]
    ImportError(String),

    // ===== 数据库错误 =====
    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ApiError {
    /// 将 trait 层返回的 Box<dyn Error> 还原为具体错误
    pub fn from_boxed(err: Box<dyn Error>) -> Self {
        let err = match err.downcast::<ImportError>() {
            Ok(import_err) => return ApiError::from(*import_err),
            Err(err) => err,
        };
        match err.downcast::<RepositoryError>() {
            Ok(repo_err) => ApiError::from(*repo_err),
            Err(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

// 实现 From<RepositoryError>
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
        }
    }
}

// 实现 From<ImportError>
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            // 表头问题属于整表校验失败
            ImportError::MissingRequiredColumns(_) | ImportError::NoRecognizedColumns(_) => {
                ApiError::ValidationError(err.to_string())
            }
            ImportError::SourceNotFound(_) | ImportError::FileNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            ImportError::UnsupportedFormat(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::FileReadError(_) | ImportError::CsvParseError(_) => {
                ApiError::ImportError(err.to_string())
            }
            ImportError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            ImportError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            ImportError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            ImportError::Repository(repo_err) => ApiError::from(repo_err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
