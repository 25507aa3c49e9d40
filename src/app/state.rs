// ==========================================
// 学生作业分派引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享连接、仓储与API实例
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::AssignmentApi;
use crate::config::config_manager::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::AssignmentProviders;
use crate::repository::{
    ActionLogRepository, AssignmentRepository, FamilyLinkRepository, PermissionRepository,
    ProgramRepository, StudentRepository,
};

/// 应用状态
///
/// 所有仓储共享同一 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 分派API
    pub assignment_api: Arc<AssignmentApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    // 供 CLI / 种子数据使用
    pub student_repo: Arc<StudentRepository>,
    pub family_link_repo: Arc<FamilyLinkRepository>,
    pub permission_repo: Arc<PermissionRepository>,
    pub program_repo: Arc<ProgramRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（不存在时自动建表）
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let student_repo = Arc::new(StudentRepository::new(conn.clone()));
        let family_link_repo = Arc::new(FamilyLinkRepository::new(conn.clone()));
        let permission_repo = Arc::new(PermissionRepository::new(conn.clone()));
        let program_repo = Arc::new(ProgramRepository::new(conn.clone()));
        let assignment_repo = Arc::new(AssignmentRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化引擎协作者与API层
        // ==========================================
        let providers = AssignmentProviders::new(
            student_repo.clone(),
            assignment_repo.clone(),
            family_link_repo.clone(),
            permission_repo.clone(),
            program_repo.clone(),
            assignment_repo.clone(),
        );

        let assignment_api = Arc::new(AssignmentApi::new(
            config_manager.clone(),
            providers,
            assignment_repo,
            program_repo.clone(),
            permission_repo.clone(),
            action_log_repo,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            assignment_api,
            config_manager,
            student_repo,
            family_link_repo,
            permission_repo,
            program_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 MINISTRY_ASSIGN_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("MINISTRY_ASSIGN_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./ministry_assign.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("ministry-assign");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("ministry_assign.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_initializes_schema() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.assignment_api.list_versions("missing").unwrap().is_empty());
    }
}
