// ==========================================
// 学生作业分派引擎 - 学生领域模型
// ==========================================
// 红线: 引擎对学生数据只读,增删改由会众管理端负责
// ==========================================

use crate::domain::types::{Gender, RelationshipKind, StudentRole};
use serde::{Deserialize, Serialize};

// ==========================================
// Student - 学生
// ==========================================
// 对齐: schema student 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,      // 学生ID
    pub congregation_id: String, // 所属会众 (scope)
    pub display_name: String,    // 显示名称
    pub gender: Gender,          // 性别
    pub role: StudentRole,       // 身份
    pub age: Option<u32>,        // 年龄 (可空)
    pub active: bool,            // 是否在册

    // 监护人/父母ID (用于未成年人与兄弟姊妹判定)
    pub guardian_id: Option<String>,
}

impl Student {
    /// 是否未成年（年龄未知按成年处理）
    pub fn is_minor(&self, adult_age: u32) -> bool {
        matches!(self.age, Some(age) if age < adult_age)
    }
}

// ==========================================
// FamilyLink - 家庭关系
// ==========================================
// 无向关系; kind 以 student_a 视角记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyLink {
    pub student_a: String,
    pub student_b: String,
    pub kind: RelationshipKind,
}
