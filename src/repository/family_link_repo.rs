// ==========================================
// 学生作业分派引擎 - 家庭关系仓储
// ==========================================

use crate::domain::student::FamilyLink;
use crate::domain::types::RelationshipKind;
use crate::engine::providers::FamilyLinkProvider;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// FamilyLinkRepository - 家庭关系仓储
// ==========================================
// 关系无向存储: (a, b) 与 (b, a) 视为同一关系, 查询时双向匹配
pub struct FamilyLinkRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FamilyLinkRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新增关系
    ///
    /// # 返回
    /// - `Err(FieldValueError)`: 自关联
    /// - `Err(UniqueConstraintViolation)`: 反向关系已存在
    pub fn insert(&self, link: &FamilyLink) -> RepositoryResult<()> {
        if link.student_a == link.student_b {
            return Err(RepositoryError::FieldValueError {
                field: "student_b".to_string(),
                message: "家庭关系不能指向本人".to_string(),
            });
        }

        let conn = self.get_conn()?;

        let reverse_exists: bool = conn
            .query_row(
                "SELECT 1 FROM family_link WHERE student_a = ? AND student_b = ?",
                params![&link.student_b, &link.student_a],
                |_row| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if reverse_exists {
            return Err(RepositoryError::UniqueConstraintViolation(format!(
                "family_link({}, {}) 已存在",
                link.student_b, link.student_a
            )));
        }

        conn.execute(
            "INSERT INTO family_link (student_a, student_b, kind) VALUES (?, ?, ?)",
            params![&link.student_a, &link.student_b, link.kind.to_db_str()],
        )?;
        Ok(())
    }

    /// 删除关系（双向）
    pub fn delete(&self, student_a: &str, student_b: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"DELETE FROM family_link
               WHERE (student_a = ?1 AND student_b = ?2)
                  OR (student_a = ?2 AND student_b = ?1)"#,
            params![student_a, student_b],
        )?;
        Ok(affected)
    }

    /// 查询两人之间的关系（双向）
    pub fn find_relationship(
        &self,
        student_a: &str,
        student_b: &str,
    ) -> RepositoryResult<Option<RelationshipKind>> {
        let conn = self.get_conn()?;

        let raw: Option<String> = conn
            .query_row(
                r#"SELECT kind FROM family_link
                   WHERE (student_a = ?1 AND student_b = ?2)
                      OR (student_a = ?2 AND student_b = ?1)
                   LIMIT 1"#,
                params![student_a, student_b],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(kind) => RelationshipKind::from_db_str(&kind)
                .map(Some)
                .ok_or_else(|| RepositoryError::FieldValueError {
                    field: "kind".to_string(),
                    message: format!("无法识别的关系类型: {}", kind),
                }),
            None => Ok(None),
        }
    }

    /// 查询会众内全部关系（任一端属于该会众即返回）
    pub fn find_by_congregation(&self, congregation_id: &str) -> RepositoryResult<Vec<FamilyLink>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT fl.student_a, fl.student_b, fl.kind
               FROM family_link fl
               JOIN student sa ON sa.student_id = fl.student_a
               JOIN student sb ON sb.student_id = fl.student_b
               WHERE sa.congregation_id = ?1 OR sb.congregation_id = ?1
               ORDER BY fl.student_a, fl.student_b"#,
        )?;

        let links = stmt
            .query_map(params![congregation_id], |row| {
                let kind_raw: String = row.get(2)?;
                Ok(FamilyLink {
                    student_a: row.get(0)?,
                    student_b: row.get(1)?,
                    kind: RelationshipKind::from_db_str(&kind_raw)
                        .ok_or_else(|| conversion_error(2, "kind", &kind_raw))?,
                })
            })?
            .collect::<Result<Vec<FamilyLink>, _>>()?;

        Ok(links)
    }
}

#[async_trait]
impl FamilyLinkProvider for FamilyLinkRepository {
    async fn get_relationship(
        &self,
        student_a: &str,
        student_b: &str,
    ) -> RepositoryResult<Option<RelationshipKind>> {
        self.find_relationship(student_a, student_b)
    }

    async fn list_family_links(&self, scope: &str) -> RepositoryResult<Vec<FamilyLink>> {
        self.find_by_congregation(scope)
    }
}
