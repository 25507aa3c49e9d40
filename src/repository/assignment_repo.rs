// ==========================================
// 学生作业分派引擎 - 分派集仓储
// ==========================================
// 红线: 替换 = 写入新版本 + 归档旧版本 + 激活新版本, 同一事务提交
// 红线: 每个节目单同一时刻最多一个 ACTIVE 分派集
// 说明: 旧版本只归档不删除, 可回滚; 节目单删除时级联清除
// ==========================================

use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::assignment::{AssignmentRecord, AssignmentSetVersion, HistoryRecord};
use crate::domain::types::{AssignmentSetStatus, PartType};
use crate::engine::providers::{AssignmentStore, HistoryProvider};
use crate::repository::action_log_repo::insert_with_conn;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const DATE_FMT: &str = "%Y-%m-%d";
const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// AssignmentRepository - 分派集仓储
// ==========================================
pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AssignmentRepository {
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

    /// 替换节目单的当前分派集
    ///
    /// # 参数
    /// - `program_id`: 节目单ID
    /// - `scope`: 会众ID（节目单必须属于该会众）
    /// - `records`: 新分派记录
    /// - `actor_id`: 操作人
    /// - `replace_existing`: 是否允许替换已有的 ACTIVE 分派集
    /// - `config_snapshot_json`: 生成时的配置快照
    ///
    /// # 返回
    /// - `Ok(version)`: 新激活的分派集版本
    /// - `Err(NotFound)`: 节目单不存在或不属于该会众
    /// - `Err(VersionConflict)`: 已有 ACTIVE 分派集且未允许替换（在事务内判定）
    ///
    /// # 红线
    /// - 任何一步失败整体回滚, 旧版本保持 ACTIVE
    pub fn replace_current(
        &self,
        program_id: &str,
        scope: &str,
        records: &[AssignmentRecord],
        actor_id: &str,
        replace_existing: bool,
        config_snapshot_json: Option<String>,
    ) -> RepositoryResult<AssignmentSetVersion> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let owner: Option<String> = tx
            .query_row(
                "SELECT congregation_id FROM program WHERE program_id = ?",
                params![program_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.as_deref() != Some(scope) {
            return Err(RepositoryError::NotFound {
                entity: "Program".to_string(),
                id: program_id.to_string(),
            });
        }

        let previous_set_id: Option<String> = tx
            .query_row(
                "SELECT set_id FROM assignment_set WHERE program_id = ? AND status = 'ACTIVE'",
                params![program_id],
                |row| row.get(0),
            )
            .optional()?;
        if let (Some(active), false) = (&previous_set_id, replace_existing) {
            return Err(RepositoryError::VersionConflict {
                message: format!("节目单 {} 已有生效分派集 {}, 未允许替换", program_id, active),
            });
        }

        let version_no: i32 = tx.query_row(
            "SELECT COALESCE(MAX(version_no), 0) + 1 FROM assignment_set WHERE program_id = ?",
            params![program_id],
            |row| row.get(0),
        )?;

        let set_id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let created_at = now.with_nanosecond(0).unwrap_or(now);

        // 先归档旧版本（ACTIVE 唯一索引）
        tx.execute(
            "UPDATE assignment_set SET status = 'ARCHIVED' WHERE program_id = ? AND status = 'ACTIVE'",
            params![program_id],
        )?;

        tx.execute(
            r#"INSERT INTO assignment_set (
                    set_id, program_id, version_no, status, created_by, created_at,
                    config_snapshot_json
                ) VALUES (?, ?, ?, 'ACTIVE', ?, ?, ?)"#,
            params![
                &set_id,
                program_id,
                version_no,
                actor_id,
                created_at.format(TS_FMT).to_string(),
                &config_snapshot_json,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO assignment (
                        set_id, part_ordinal, part_type, principal_id, helper_id, is_family_pair
                    ) VALUES (?, ?, ?, ?, ?, ?)"#,
            )?;

            for record in records {
                stmt.execute(params![
                    &set_id,
                    record.part_ordinal,
                    record.part_type.to_db_str(),
                    &record.principal_id,
                    &record.helper_id,
                    if record.is_family_pair { 1 } else { 0 },
                ])?;
            }
        }

        let action_type = if previous_set_id.is_some() {
            ActionType::AssignmentsReplaced
        } else {
            ActionType::AssignmentsGenerated
        };
        insert_with_conn(
            &tx,
            &ActionLog {
                action_id: Uuid::new_v4().to_string(),
                program_id: Some(program_id.to_string()),
                set_id: Some(set_id.clone()),
                action_type: action_type.to_string(),
                action_ts: created_at,
                actor: actor_id.to_string(),
                payload_json: Some(json!({
                    "version_no": version_no,
                    "record_count": records.len(),
                    "previous_set_id": previous_set_id,
                })),
                detail: None,
            },
        )?;

        tx.commit()?;

        Ok(AssignmentSetVersion {
            set_id,
            program_id: program_id.to_string(),
            version_no,
            status: AssignmentSetStatus::Active,
            record_count: records.len(),
            created_by: actor_id.to_string(),
            created_at,
            config_snapshot_json,
        })
    }

    /// 激活历史版本（回滚）
    ///
    /// # 返回
    /// - `Err(NotFound)`: 版本不存在或不属于该节目单
    pub fn activate_version(
        &self,
        program_id: &str,
        set_id: &str,
        actor_id: &str,
    ) -> RepositoryResult<AssignmentSetVersion> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let belongs: bool = tx
            .query_row(
                "SELECT 1 FROM assignment_set WHERE set_id = ? AND program_id = ?",
                params![set_id, program_id],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if !belongs {
            return Err(RepositoryError::NotFound {
                entity: "AssignmentSet".to_string(),
                id: set_id.to_string(),
            });
        }

        tx.execute(
            "UPDATE assignment_set SET status = 'ARCHIVED' WHERE program_id = ? AND status = 'ACTIVE'",
            params![program_id],
        )?;
        tx.execute(
            "UPDATE assignment_set SET status = 'ACTIVE' WHERE set_id = ?",
            params![set_id],
        )?;

        insert_with_conn(
            &tx,
            &ActionLog {
                action_id: Uuid::new_v4().to_string(),
                program_id: Some(program_id.to_string()),
                set_id: Some(set_id.to_string()),
                action_type: ActionType::AssignmentsRolledBack.to_string(),
                action_ts: Utc::now().naive_utc(),
                actor: actor_id.to_string(),
                payload_json: None,
                detail: None,
            },
        )?;

        let version = Self::query_version(&tx, set_id)?;
        tx.commit()?;

        version.ok_or_else(|| RepositoryError::NotFound {
            entity: "AssignmentSet".to_string(),
            id: set_id.to_string(),
        })
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 当前生效的分派记录数
    pub fn count_current(&self, program_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*)
               FROM assignment a
               JOIN assignment_set s ON s.set_id = a.set_id
               WHERE s.program_id = ? AND s.status = 'ACTIVE'"#,
            params![program_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    /// 当前生效的分派记录（ordinal 升序）
    pub fn find_current(&self, program_id: &str) -> RepositoryResult<Vec<AssignmentRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT s.program_id, p.week_start, a.part_ordinal, a.part_type,
                      a.principal_id, a.helper_id, a.is_family_pair
               FROM assignment a
               JOIN assignment_set s ON s.set_id = a.set_id
               JOIN program p ON p.program_id = s.program_id
               WHERE s.program_id = ? AND s.status = 'ACTIVE'
               ORDER BY a.part_ordinal"#,
        )?;

        let records = stmt
            .query_map(params![program_id], map_record_row)?
            .collect::<Result<Vec<AssignmentRecord>, _>>()?;
        Ok(records)
    }

    /// 指定版本的分派记录
    pub fn find_by_set(&self, set_id: &str) -> RepositoryResult<Vec<AssignmentRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT s.program_id, p.week_start, a.part_ordinal, a.part_type,
                      a.principal_id, a.helper_id, a.is_family_pair
               FROM assignment a
               JOIN assignment_set s ON s.set_id = a.set_id
               JOIN program p ON p.program_id = s.program_id
               WHERE a.set_id = ?
               ORDER BY a.part_ordinal"#,
        )?;

        let records = stmt
            .query_map(params![set_id], map_record_row)?
            .collect::<Result<Vec<AssignmentRecord>, _>>()?;
        Ok(records)
    }

    /// 节目单的全部版本（version_no 降序）
    pub fn list_versions(&self, program_id: &str) -> RepositoryResult<Vec<AssignmentSetVersion>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT s.set_id, s.program_id, s.version_no, s.status,
                      (SELECT COUNT(*) FROM assignment a WHERE a.set_id = s.set_id),
                      s.created_by, s.created_at, s.config_snapshot_json
               FROM assignment_set s
               WHERE s.program_id = ?
               ORDER BY s.version_no DESC"#,
        )?;

        let versions = stmt
            .query_map(params![program_id], map_version_row)?
            .collect::<Result<Vec<AssignmentSetVersion>, _>>()?;
        Ok(versions)
    }

    /// 统计 [since, before) 范围内各学生的分派次数（仅 ACTIVE 分派集）
    pub fn aggregate_history(
        &self,
        congregation_id: &str,
        since: NaiveDate,
        before: NaiveDate,
    ) -> RepositoryResult<Vec<HistoryRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT student_id, COUNT(*), MAX(week_start)
               FROM (
                   SELECT a.principal_id AS student_id, p.week_start AS week_start
                   FROM assignment a
                   JOIN assignment_set s ON s.set_id = a.set_id
                   JOIN program p ON p.program_id = s.program_id
                   WHERE s.status = 'ACTIVE' AND p.congregation_id = ?1
                     AND p.week_start >= ?2 AND p.week_start < ?3
                   UNION ALL
                   SELECT a.helper_id AS student_id, p.week_start AS week_start
                   FROM assignment a
                   JOIN assignment_set s ON s.set_id = a.set_id
                   JOIN program p ON p.program_id = s.program_id
                   WHERE s.status = 'ACTIVE' AND p.congregation_id = ?1
                     AND p.week_start >= ?2 AND p.week_start < ?3
                     AND a.helper_id IS NOT NULL
               )
               GROUP BY student_id
               ORDER BY student_id"#,
        )?;

        let history = stmt
            .query_map(
                params![
                    congregation_id,
                    since.format(DATE_FMT).to_string(),
                    before.format(DATE_FMT).to_string(),
                ],
                |row| {
                    let last_raw: Option<String> = row.get(2)?;
                    let last_assigned = match last_raw {
                        Some(raw) => Some(
                            NaiveDate::parse_from_str(&raw, DATE_FMT)
                                .map_err(|_| conversion_error(2, "week_start", &raw))?,
                        ),
                        None => None,
                    };
                    Ok(HistoryRecord {
                        student_id: row.get(0)?,
                        assignment_count: row.get(1)?,
                        last_assigned,
                    })
                },
            )?
            .collect::<Result<Vec<HistoryRecord>, _>>()?;

        Ok(history)
    }

    fn query_version(conn: &Connection, set_id: &str) -> RepositoryResult<Option<AssignmentSetVersion>> {
        let version = conn
            .query_row(
                r#"SELECT s.set_id, s.program_id, s.version_no, s.status,
                          (SELECT COUNT(*) FROM assignment a WHERE a.set_id = s.set_id),
                          s.created_by, s.created_at, s.config_snapshot_json
                   FROM assignment_set s
                   WHERE s.set_id = ?"#,
                params![set_id],
                map_version_row,
            )
            .optional()?;
        Ok(version)
    }
}

fn map_record_row(row: &rusqlite::Row) -> rusqlite::Result<AssignmentRecord> {
    let week_raw: String = row.get(1)?;
    let part_type_raw: String = row.get(3)?;
    let is_family: i32 = row.get(6)?;

    Ok(AssignmentRecord {
        program_id: row.get(0)?,
        week_start: NaiveDate::parse_from_str(&week_raw, DATE_FMT)
            .map_err(|_| conversion_error(1, "week_start", &week_raw))?,
        part_ordinal: row.get(2)?,
        part_type: PartType::from_db_str(&part_type_raw),
        principal_id: row.get(4)?,
        helper_id: row.get(5)?,
        is_family_pair: is_family != 0,
    })
}

fn map_version_row(row: &rusqlite::Row) -> rusqlite::Result<AssignmentSetVersion> {
    let status_raw: String = row.get(3)?;
    let count: i64 = row.get(4)?;
    let created_raw: String = row.get(6)?;

    Ok(AssignmentSetVersion {
        set_id: row.get(0)?,
        program_id: row.get(1)?,
        version_no: row.get(2)?,
        status: AssignmentSetStatus::from_str(&status_raw),
        record_count: count.max(0) as usize,
        created_by: row.get(5)?,
        created_at: NaiveDateTime::parse_from_str(&created_raw, TS_FMT)
            .map_err(|_| conversion_error(6, "created_at", &created_raw))?,
        config_snapshot_json: row.get(7)?,
    })
}

#[async_trait]
impl AssignmentStore for AssignmentRepository {
    async fn replace_assignments(
        &self,
        program_id: &str,
        scope: &str,
        records: &[AssignmentRecord],
        actor_id: &str,
        replace_existing: bool,
        config_snapshot_json: Option<String>,
    ) -> RepositoryResult<AssignmentSetVersion> {
        self.replace_current(
            program_id,
            scope,
            records,
            actor_id,
            replace_existing,
            config_snapshot_json,
        )
    }

    async fn count_existing(&self, program_id: &str) -> RepositoryResult<usize> {
        self.count_current(program_id)
    }
}

#[async_trait]
impl HistoryProvider for AssignmentRepository {
    async fn list_assignment_history(
        &self,
        scope: &str,
        since: NaiveDate,
        before: NaiveDate,
    ) -> RepositoryResult<Vec<HistoryRecord>> {
        self.aggregate_history(scope, since, before)
    }
}
