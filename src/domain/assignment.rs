// ==========================================
// 学生作业分派引擎 - 分派记录领域模型
// ==========================================
// 红线: 主讲人 != 助手
// 红线: 同一周内每位学生最多出现在一条记录中（主讲或助手）
// 红线: 只有需要助手的节目才能带助手
// ==========================================

use crate::domain::types::{AssignmentSetStatus, PartType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// AssignmentRecord - 分派记录
// ==========================================
// 对齐: schema assignment 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub program_id: String,
    pub week_start: NaiveDate,
    pub part_ordinal: u32,
    pub part_type: PartType,
    pub principal_id: String,
    pub helper_id: Option<String>,
    pub is_family_pair: bool, // 异性配对是否基于家庭关系
}

impl AssignmentRecord {
    /// 记录中出现的全部学生ID（主讲在前）
    pub fn student_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.principal_id.as_str()).chain(self.helper_id.as_deref())
    }
}

// ==========================================
// HistoryRecord - 历史分派统计（派生）
// ==========================================
// 每次生成时重新计算,不跨次缓存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub student_id: String,
    pub assignment_count: u32,             // 窗口内分派次数（主讲+助手）
    pub last_assigned: Option<NaiveDate>,  // 最近一次分派的周起始日
}

// ==========================================
// AssignmentSetVersion - 分派集版本
// ==========================================
// 重新生成 = 写入新版本 + 切换 ACTIVE 指针（同一事务）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentSetVersion {
    pub set_id: String,
    pub program_id: String,
    pub version_no: i32,
    pub status: AssignmentSetStatus,
    pub record_count: usize,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub config_snapshot_json: Option<String>,
}
