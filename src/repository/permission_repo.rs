// ==========================================
// 学生作业分派引擎 - 授权仓储
// ==========================================

use crate::engine::providers::PermissionProvider;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 生成/替换分派所需的权限名
pub const GENERATE_ASSIGNMENTS: &str = "GENERATE_ASSIGNMENTS";

// ==========================================
// PermissionRepository - 操作人授权仓储
// ==========================================
// 认证/会话由外部系统负责,这里只保存 (操作人, 会众, 权限) 授权表
pub struct PermissionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PermissionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 授权（幂等）
    pub fn grant(&self, actor_id: &str, congregation_id: &str, permission: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO actor_permission (actor_id, congregation_id, permission) VALUES (?, ?, ?)",
            params![actor_id, congregation_id, permission],
        )?;
        Ok(())
    }

    /// 撤销授权
    pub fn revoke(&self, actor_id: &str, congregation_id: &str, permission: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM actor_permission WHERE actor_id = ? AND congregation_id = ? AND permission = ?",
            params![actor_id, congregation_id, permission],
        )?;
        Ok(affected)
    }

    /// 是否拥有指定权限
    pub fn has_permission(
        &self,
        actor_id: &str,
        congregation_id: &str,
        permission: &str,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i32> = conn
            .query_row(
                "SELECT 1 FROM actor_permission WHERE actor_id = ? AND congregation_id = ? AND permission = ?",
                params![actor_id, congregation_id, permission],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl PermissionProvider for PermissionRepository {
    async fn has_generation_permission(&self, actor_id: &str, scope: &str) -> RepositoryResult<bool> {
        self.has_permission(actor_id, scope, GENERATE_ASSIGNMENTS)
    }
}
