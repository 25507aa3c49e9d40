// ==========================================
// 学生作业分派引擎 - 操作日志数据仓储
// ==========================================
// 红线: 所有分派集写入必须记录
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入操作日志
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        insert_with_conn(&conn, log)?;
        Ok(log.action_id.clone())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询节目单相关的操作日志（时间倒序）
    pub fn find_by_program(&self, program_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, program_id, set_id, action_type, action_ts, actor,
                      payload_json, detail
               FROM action_log
               WHERE program_id = ?
               ORDER BY action_ts DESC, rowid DESC"#,
        )?;

        let logs = stmt
            .query_map(params![program_id], map_row)?
            .collect::<Result<Vec<ActionLog>, _>>()?;
        Ok(logs)
    }

    /// 最近 N 条操作日志
    pub fn find_recent(&self, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT action_id, program_id, set_id, action_type, action_ts, actor,
                      payload_json, detail
               FROM action_log
               ORDER BY action_ts DESC, rowid DESC
               LIMIT ?"#,
        )?;

        let logs = stmt
            .query_map(params![limit], map_row)?
            .collect::<Result<Vec<ActionLog>, _>>()?;
        Ok(logs)
    }
}

/// 在调用方持有的连接/事务上写入日志
///
/// 说明：分派集替换与日志写入需在同一事务内提交
pub(crate) fn insert_with_conn(conn: &Connection, log: &ActionLog) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO action_log (
            action_id, program_id, set_id, action_type, action_ts, actor,
            payload_json, detail
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            log.action_id,
            log.program_id,
            log.set_id,
            log.action_type,
            log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            log.actor,
            log.payload_json.as_ref().map(|v| v.to_string()),
            log.detail,
        ],
    )
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ActionLog> {
    let ts_raw: String = row.get(4)?;
    let payload_raw: Option<String> = row.get(6)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        program_id: row.get(1)?,
        set_id: row.get(2)?,
        action_type: row.get(3)?,
        action_ts: NaiveDateTime::parse_from_str(&ts_raw, "%Y-%m-%d %H:%M:%S")
            .map_err(|_| crate::repository::error::conversion_error(4, "action_ts", &ts_raw))?,
        actor: row.get(5)?,
        payload_json: payload_raw.and_then(|raw| serde_json::from_str(&raw).ok()),
        detail: row.get(7)?,
    })
}
