// ==========================================
// 学生作业分派引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config_trait::EngineConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::pairing::DEFAULT_ADULT_AGE;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 抖动上限的硬上界（抖动必须小于一次分派的权重）
pub const MAX_FAIRNESS_JITTER: f64 = 0.1;

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
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
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

    /// 读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;

        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式,键有序）
    ///
    /// # 用途
    /// - 随分派集版本一起保存,便于事后解释“为什么选了这个人”
    pub fn snapshot_json(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key",
        )?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
#[async_trait]
impl EngineConfigReader for ConfigManager {
    async fn get_fairness_window_weeks(&self) -> ConfigResult<u32> {
        let value = self.get_config_or_default(config_keys::FAIRNESS_WINDOW_WEEKS, "8")?;
        match value.trim().parse::<u32>() {
            Ok(weeks) if weeks > 0 => Ok(weeks),
            _ => {
                tracing::warn!(
                    config_key = config_keys::FAIRNESS_WINDOW_WEEKS,
                    raw_value = %value,
                    "公平窗口配置无效，使用默认值 8"
                );
                Ok(8)
            }
        }
    }

    async fn get_fairness_jitter_max(&self) -> ConfigResult<f64> {
        let value = self.get_config_or_default(config_keys::FAIRNESS_JITTER_MAX, "0.1")?;
        let parsed = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(MAX_FAIRNESS_JITTER);
        Ok(parsed.clamp(0.0, MAX_FAIRNESS_JITTER))
    }

    async fn get_minor_age_threshold(&self) -> ConfigResult<u32> {
        let value = self.get_config_or_default(config_keys::MINOR_AGE_THRESHOLD, "18")?;
        match value.trim().parse::<u32>() {
            Ok(age) if age >= DEFAULT_ADULT_AGE => Ok(age),
            _ => {
                tracing::warn!(
                    config_key = config_keys::MINOR_AGE_THRESHOLD,
                    raw_value = %value,
                    "成年年龄配置低于 18 或无效，使用 18"
                );
                Ok(DEFAULT_ADULT_AGE)
            }
        }
    }

    async fn get_fairness_seed(&self) -> ConfigResult<Option<u64>> {
        let value = self.get_config_value(config_keys::FAIRNESS_SEED)?;
        Ok(value.and_then(|v| v.trim().parse::<u64>().ok()))
    }

    async fn get_config_snapshot(&self) -> ConfigResult<String> {
        self.snapshot_json()
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 公平轮换
    pub const FAIRNESS_WINDOW_WEEKS: &str = "fairness_window_weeks";
    pub const FAIRNESS_JITTER_MAX: &str = "fairness_jitter_max";
    pub const FAIRNESS_SEED: &str = "fairness_seed";

    // 配对
    pub const MINOR_AGE_THRESHOLD: &str = "minor_age_threshold";
}
