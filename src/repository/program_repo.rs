// ==========================================
// 学生作业分派引擎 - 节目单仓储
// ==========================================

use crate::domain::program::{PartDefinition, Program};
use crate::domain::types::PartType;
use crate::engine::providers::ProgramProvider;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// ProgramRepository - 周节目单仓储
// ==========================================
// 节目单由导入模块写入; 删除节目单级联删除其全部分派集
pub struct ProgramRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProgramRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建节目单及其节目（单事务）
    pub fn create(&self, program: &Program, parts: &[PartDefinition]) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO program (program_id, congregation_id, week_start, title) VALUES (?, ?, ?, ?)",
            params![
                &program.program_id,
                &program.congregation_id,
                program.week_start.format("%Y-%m-%d").to_string(),
                &program.title,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO program_part (
                        program_id, ordinal, part_type, title, duration_minutes, scene
                    ) VALUES (?, ?, ?, ?, ?, ?)"#,
            )?;

            for part in parts {
                stmt.execute(params![
                    &program.program_id,
                    part.ordinal,
                    part.part_type.to_db_str(),
                    &part.title,
                    part.duration_minutes,
                    &part.scene,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// 按ID查询节目单
    pub fn find_by_id(&self, program_id: &str) -> RepositoryResult<Option<Program>> {
        let conn = self.get_conn()?;

        let program = conn
            .query_row(
                "SELECT program_id, congregation_id, week_start, title FROM program WHERE program_id = ?",
                params![program_id],
                |row| {
                    let week_raw: String = row.get(2)?;
                    Ok(Program {
                        program_id: row.get(0)?,
                        congregation_id: row.get(1)?,
                        week_start: NaiveDate::parse_from_str(&week_raw, "%Y-%m-%d")
                            .map_err(|_| conversion_error(2, "week_start", &week_raw))?,
                        title: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(program)
    }

    /// 查询节目列表（ordinal 升序）
    pub fn find_parts(&self, program_id: &str) -> RepositoryResult<Vec<PartDefinition>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT ordinal, part_type, title, duration_minutes, scene
               FROM program_part
               WHERE program_id = ?
               ORDER BY ordinal"#,
        )?;

        let parts = stmt
            .query_map(params![program_id], |row| {
                let part_type_raw: String = row.get(1)?;
                Ok(PartDefinition {
                    ordinal: row.get(0)?,
                    part_type: PartType::from_db_str(&part_type_raw),
                    title: row.get(2)?,
                    duration_minutes: row.get(3)?,
                    scene: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<PartDefinition>, _>>()?;

        Ok(parts)
    }

    /// 删除节目单（级联删除节目与分派集）
    pub fn delete(&self, program_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM program WHERE program_id = ?", params![program_id])?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Program".to_string(),
                id: program_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ProgramProvider for ProgramRepository {
    async fn find_program(&self, program_id: &str) -> RepositoryResult<Option<Program>> {
        self.find_by_id(program_id)
    }

    async fn list_parts(&self, program_id: &str) -> RepositoryResult<Vec<PartDefinition>> {
        self.find_parts(program_id)
    }
}
