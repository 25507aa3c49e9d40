// ==========================================
// 学生作业分派引擎 - 操作日志领域模型
// ==========================================
// 红线: 所有分派集写入必须记录
// 用途: 审计追踪
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 对齐: schema action_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub program_id: Option<String>, // 关联节目单
    pub set_id: Option<String>,     // 关联分派集版本
    pub action_type: String,        // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    AssignmentsGenerated,  // 首次生成
    AssignmentsReplaced,   // 重新生成并替换
    AssignmentsRolledBack, // 回滚到历史版本
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::AssignmentsGenerated => write!(f, "ASSIGNMENTS_GENERATED"),
            ActionType::AssignmentsReplaced => write!(f, "ASSIGNMENTS_REPLACED"),
            ActionType::AssignmentsRolledBack => write!(f, "ASSIGNMENTS_ROLLED_BACK"),
        }
    }
}
