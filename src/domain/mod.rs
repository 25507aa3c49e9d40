// ==========================================
// 学生作业分派引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体与类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod assignment;
pub mod program;
pub mod student;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use assignment::{AssignmentRecord, AssignmentSetVersion, HistoryRecord};
pub use program::{PartDefinition, Program};
pub use student::{FamilyLink, Student};
pub use types::{AssignmentSetStatus, Gender, PartType, RelationshipKind, StudentRole};
