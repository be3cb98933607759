// ==========================================
// 班级学生档案 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入模块所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 成绩表未指定学期时使用的学期
    ///
    /// # 默认值
    /// - "上学期"
    async fn get_default_semester(&self) -> Result<String, Box<dyn Error>>;

    /// 名单导入是否全量替换（先清空再导入）
    ///
    /// # 返回
    /// - true: 全量替换
    /// - false: 按学号合并
    ///
    /// # 默认值
    /// - true
    async fn get_roster_full_reset(&self) -> Result<bool, Box<dyn Error>>;

    /// 预览报告中最多展示的警告条数
    ///
    /// # 返回
    /// - 0 表示不限制
    ///
    /// # 默认值
    /// - 50
    async fn get_preview_warning_limit(&self) -> Result<usize, Box<dyn Error>>;

    /// 预览暂存区容量（超出后淘汰最早的预览）
    ///
    /// # 默认值
    /// - 16
    async fn get_staging_capacity(&self) -> Result<usize, Box<dyn Error>>;
}
