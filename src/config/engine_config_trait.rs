// ==========================================
// 学生作业分派引擎 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义分派引擎所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait EngineConfigReader: Send + Sync {
    /// 公平轮换窗口（周）
    ///
    /// # 默认值
    /// - 8
    async fn get_fairness_window_weeks(&self) -> Result<u32, Box<dyn Error + Send + Sync>>;

    /// 公平分数抖动上限
    ///
    /// # 返回
    /// - f64: 已裁剪到 [0, 0.1]
    ///
    /// # 默认值
    /// - 0.1
    async fn get_fairness_jitter_max(&self) -> Result<f64, Box<dyn Error + Send + Sync>>;

    /// 成年年龄阈值（低于此年龄只能同性配对）
    ///
    /// # 默认值
    /// - 18
    async fn get_minor_age_threshold(&self) -> Result<u32, Box<dyn Error + Send + Sync>>;

    /// 抖动随机种子
    ///
    /// # 返回
    /// - Some(seed): 固定种子,同输入可复现
    /// - None: 每次运行使用系统熵
    async fn get_fairness_seed(&self) -> Result<Option<u64>, Box<dyn Error + Send + Sync>>;

    /// 全量配置快照（JSON），随分派集版本一起保存
    async fn get_config_snapshot(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}
