// ==========================================
// 学生作业分派引擎 - 周节目单领域模型
// ==========================================
// 节目单由导入模块每周生成一次,对引擎为不可变输入
// ==========================================

use crate::domain::types::PartType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// Program - 周节目单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub program_id: String,
    pub congregation_id: String,
    pub week_start: NaiveDate, // 周起始日
    pub title: String,
}

// ==========================================
// PartDefinition - 节目定义
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDefinition {
    pub ordinal: u32,          // 周内顺序
    pub part_type: PartType,   // 节目类型
    pub title: String,         // 节目标题
    pub duration_minutes: u32, // 时长 (分钟)
    pub scene: Option<String>, // 场景/背景说明
}

impl PartDefinition {
    /// 是否需要助手（由节目类型推导）
    pub fn requires_helper(&self) -> bool {
        self.part_type.requires_helper()
    }
}
