// ==========================================
// 学生作业分派引擎 - 配置层
// ==========================================
// 职责: 引擎参数管理（公平窗口、抖动、成年阈值、随机种子）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use engine_config_trait::EngineConfigReader;
