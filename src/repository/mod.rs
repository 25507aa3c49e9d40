// ==========================================
// 学生作业分派引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节; 实现引擎的外部协作者 trait
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod assignment_repo;
pub mod error;
pub mod family_link_repo;
pub mod permission_repo;
pub mod program_repo;
pub mod student_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use assignment_repo::AssignmentRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use family_link_repo::FamilyLinkRepository;
pub use permission_repo::{PermissionRepository, GENERATE_ASSIGNMENTS};
pub use program_repo::ProgramRepository;
pub use student_repo::StudentRepository;
