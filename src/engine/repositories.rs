// ==========================================
// 学生作业分派引擎 - 协作者聚合
// ==========================================
// 职责: 聚合引擎所需的全部外部协作者
// 目标: 减少编排器/校验器的构造函数参数数量, 便于测试时整体替换
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::engine::providers::{
    AssignmentStore, FamilyLinkProvider, HistoryProvider, PermissionProvider, ProgramProvider,
    RosterProvider,
};
use crate::repository::{
    AssignmentRepository, FamilyLinkRepository, PermissionRepository, ProgramRepository,
    StudentRepository,
};

/// 分派引擎协作者集合
///
/// # 包含的协作者
/// - `roster`: 学生名册
/// - `history`: 历史分派统计
/// - `family`: 家庭关系
/// - `permission`: 操作人授权
/// - `program`: 周节目单
/// - `store`: 分派集持久化
#[derive(Clone)]
pub struct AssignmentProviders {
    pub roster: Arc<dyn RosterProvider>,
    pub history: Arc<dyn HistoryProvider>,
    pub family: Arc<dyn FamilyLinkProvider>,
    pub permission: Arc<dyn PermissionProvider>,
    pub program: Arc<dyn ProgramProvider>,
    pub store: Arc<dyn AssignmentStore>,
}

impl AssignmentProviders {
    /// 创建新的协作者集合
    pub fn new(
        roster: Arc<dyn RosterProvider>,
        history: Arc<dyn HistoryProvider>,
        family: Arc<dyn FamilyLinkProvider>,
        permission: Arc<dyn PermissionProvider>,
        program: Arc<dyn ProgramProvider>,
        store: Arc<dyn AssignmentStore>,
    ) -> Self {
        Self {
            roster,
            history,
            family,
            permission,
            program,
            store,
        }
    }

    /// 基于同一 SQLite 连接构建全部协作者
    pub fn sqlite(conn: Arc<Mutex<Connection>>) -> Self {
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));

        Self {
            roster: Arc::new(StudentRepository::new(conn.clone())),
            history: assignment_repo.clone(),
            family: Arc::new(FamilyLinkRepository::new(conn.clone())),
            permission: Arc::new(PermissionRepository::new(conn.clone())),
            program: Arc::new(ProgramRepository::new(conn)),
            store: assignment_repo,
        }
    }
}
