// ==========================================
// 学生作业分派引擎 - 学生名册仓储
// ==========================================
// 职责: student 表读写; 实现 RosterProvider
// ==========================================

use crate::domain::student::Student;
use crate::domain::types::{Gender, StudentRole};
use crate::engine::providers::RosterProvider;
use crate::repository::error::{conversion_error, RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const STUDENT_COLUMNS: &str =
    "student_id, congregation_id, display_name, gender, role, age, active, guardian_id";

// ==========================================
// StudentRepository - 学生名册仓储
// ==========================================
// 红线: 引擎只读; 写入方法仅供管理端与测试数据使用
pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    /// 创建新的StudentRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入或更新学生
    pub fn upsert(&self, student: &Student) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO student (
                    student_id, congregation_id, display_name, gender, role,
                    age, active, guardian_id
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(student_id) DO UPDATE SET
                    congregation_id = excluded.congregation_id,
                    display_name = excluded.display_name,
                    gender = excluded.gender,
                    role = excluded.role,
                    age = excluded.age,
                    active = excluded.active,
                    guardian_id = excluded.guardian_id"#,
            params![
                &student.student_id,
                &student.congregation_id,
                &student.display_name,
                student.gender.to_db_str(),
                student.role.to_db_str(),
                student.age,
                if student.active { 1 } else { 0 },
                &student.guardian_id,
            ],
        )?;

        Ok(())
    }

    /// 批量插入或更新（单事务）
    pub fn batch_upsert(&self, students: &[Student]) -> RepositoryResult<usize> {
        if students.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO student (
                        student_id, congregation_id, display_name, gender, role,
                        age, active, guardian_id
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(student_id) DO UPDATE SET
                        congregation_id = excluded.congregation_id,
                        display_name = excluded.display_name,
                        gender = excluded.gender,
                        role = excluded.role,
                        age = excluded.age,
                        active = excluded.active,
                        guardian_id = excluded.guardian_id"#,
            )?;

            for student in students {
                stmt.execute(params![
                    &student.student_id,
                    &student.congregation_id,
                    &student.display_name,
                    student.gender.to_db_str(),
                    student.role.to_db_str(),
                    student.age,
                    if student.active { 1 } else { 0 },
                    &student.guardian_id,
                ])?;
            }
        }

        tx.commit()?;
        Ok(students.len())
    }

    /// 停用/启用学生
    pub fn set_active(&self, student_id: &str, active: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE student SET active = ? WHERE student_id = ?",
            params![if active { 1 } else { 0 }, student_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Student".to_string(),
                id: student_id.to_string(),
            });
        }
        Ok(())
    }

    /// 按ID查询
    pub fn find_by_id(&self, student_id: &str) -> RepositoryResult<Option<Student>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM student WHERE student_id = ?", STUDENT_COLUMNS);

        let student = conn
            .query_row(&sql, params![student_id], |row| Self::map_row(row))
            .optional()?;
        Ok(student)
    }

    /// 查询会众内学生（按ID排序,保证下游遍历顺序稳定）
    pub fn find_by_congregation(
        &self,
        congregation_id: &str,
        active_only: bool,
    ) -> RepositoryResult<Vec<Student>> {
        let conn = self.get_conn()?;

        let mut sql = format!(
            "SELECT {} FROM student WHERE congregation_id = ?",
            STUDENT_COLUMNS
        );
        if active_only {
            sql.push_str(" AND active = 1");
        }
        sql.push_str(" ORDER BY student_id");

        let mut stmt = conn.prepare(&sql)?;
        let students = stmt
            .query_map(params![congregation_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<Student>, _>>()?;

        Ok(students)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Student> {
        let gender_raw: String = row.get(3)?;
        let role_raw: String = row.get(4)?;
        let active: i32 = row.get(6)?;

        Ok(Student {
            student_id: row.get(0)?,
            congregation_id: row.get(1)?,
            display_name: row.get(2)?,
            gender: Gender::from_db_str(&gender_raw)
                .ok_or_else(|| conversion_error(3, "gender", &gender_raw))?,
            role: StudentRole::from_db_str(&role_raw)
                .ok_or_else(|| conversion_error(4, "role", &role_raw))?,
            age: row.get(5)?,
            active: active != 0,
            guardian_id: row.get(7)?,
        })
    }
}

#[async_trait]
impl RosterProvider for StudentRepository {
    async fn list_active_students(&self, scope: &str) -> RepositoryResult<Vec<Student>> {
        self.find_by_congregation(scope, true)
    }

    async fn list_students(&self, scope: &str) -> RepositoryResult<Vec<Student>> {
        self.find_by_congregation(scope, false)
    }
}
