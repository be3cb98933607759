// ==========================================
// 班级学生档案 - API 层
// ==========================================
// 职责: 提供进程内业务接口，供命令行及上层界面调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{
    ConfirmResponse, GradeSheetRow, ImportApi, PreviewResponse, SaveGradesResponse,
};
