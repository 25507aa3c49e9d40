// ==========================================
// 学生作业分派引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键级联删除依赖 foreign_keys）
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 提供建库脚本，供 CLI / 测试 / 种子数据共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建库脚本（幂等）
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS student (
    student_id TEXT PRIMARY KEY,
    congregation_id TEXT NOT NULL,
    display_name TEXT NOT NULL,
    gender TEXT NOT NULL,
    role TEXT NOT NULL,
    age INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    guardian_id TEXT
);
CREATE INDEX IF NOT EXISTS idx_student_congregation ON student(congregation_id, active);

CREATE TABLE IF NOT EXISTS family_link (
    student_a TEXT NOT NULL REFERENCES student(student_id) ON DELETE CASCADE,
    student_b TEXT NOT NULL REFERENCES student(student_id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    PRIMARY KEY (student_a, student_b)
);

CREATE TABLE IF NOT EXISTS actor_permission (
    actor_id TEXT NOT NULL,
    congregation_id TEXT NOT NULL,
    permission TEXT NOT NULL,
    PRIMARY KEY (actor_id, congregation_id, permission)
);

CREATE TABLE IF NOT EXISTS program (
    program_id TEXT PRIMARY KEY,
    congregation_id TEXT NOT NULL,
    week_start TEXT NOT NULL,
    title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS program_part (
    program_id TEXT NOT NULL REFERENCES program(program_id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    part_type TEXT NOT NULL,
    title TEXT NOT NULL,
    duration_minutes INTEGER NOT NULL,
    scene TEXT,
    PRIMARY KEY (program_id, ordinal)
);

CREATE TABLE IF NOT EXISTS assignment_set (
    set_id TEXT PRIMARY KEY,
    program_id TEXT NOT NULL REFERENCES program(program_id) ON DELETE CASCADE,
    version_no INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    config_snapshot_json TEXT,
    UNIQUE (program_id, version_no)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_assignment_set_active
    ON assignment_set(program_id) WHERE status = 'ACTIVE';

CREATE TABLE IF NOT EXISTS assignment (
    set_id TEXT NOT NULL REFERENCES assignment_set(set_id) ON DELETE CASCADE,
    part_ordinal INTEGER NOT NULL,
    part_type TEXT NOT NULL,
    principal_id TEXT NOT NULL,
    helper_id TEXT,
    is_family_pair INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (set_id, part_ordinal)
);

CREATE TABLE IF NOT EXISTS action_log (
    action_id TEXT PRIMARY KEY,
    program_id TEXT,
    set_id TEXT,
    action_type TEXT NOT NULL,
    action_ts TEXT NOT NULL,
    actor TEXT NOT NULL,
    payload_json TEXT,
    detail TEXT
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 初始化 schema（幂等），并登记当前 schema_version
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
