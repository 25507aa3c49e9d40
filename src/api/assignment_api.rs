// ==========================================
// 学生作业分派引擎 - 分派 API
// ==========================================
// 职责: 生成 / 预览 / 查询 / 版本回滚 / 节目单删除
// 红线: 写操作前必须校验操作人权限与会众归属
// ==========================================

use std::sync::Arc;

use tracing::{info, instrument};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::action_log::ActionLog;
use crate::domain::assignment::{AssignmentRecord, AssignmentSetVersion};
use crate::engine::orchestrator::{AssignmentOrchestrator, GenerationRequest, GenerationRunReport};
use crate::engine::repositories::AssignmentProviders;
use crate::repository::{
    ActionLogRepository, AssignmentRepository, PermissionRepository, ProgramRepository,
    GENERATE_ASSIGNMENTS,
};

// ==========================================
// AssignmentApi - 分派 API
// ==========================================
pub struct AssignmentApi {
    orchestrator: AssignmentOrchestrator<ConfigManager>,
    assignment_repo: Arc<AssignmentRepository>,
    program_repo: Arc<ProgramRepository>,
    permission_repo: Arc<PermissionRepository>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl AssignmentApi {
    pub fn new(
        config: Arc<ConfigManager>,
        providers: AssignmentProviders,
        assignment_repo: Arc<AssignmentRepository>,
        program_repo: Arc<ProgramRepository>,
        permission_repo: Arc<PermissionRepository>,
        action_log_repo: Arc<ActionLogRepository>,
    ) -> Self {
        Self {
            orchestrator: AssignmentOrchestrator::new(config, providers),
            assignment_repo,
            program_repo,
            permission_repo,
            action_log_repo,
        }
    }

    // ==========================================
    // 生成
    // ==========================================

    /// 生成并（在校验通过时）写入分派
    pub async fn generate(&self, request: GenerationRequest) -> ApiResult<GenerationRunReport> {
        Self::validate_request(&request)?;
        Ok(self.orchestrator.run(&request).await?)
    }

    /// 预览: 生成 + 校验, 不写入
    pub async fn preview(&self, request: GenerationRequest) -> ApiResult<GenerationRunReport> {
        self.generate(request.dry_run(true)).await
    }

    fn validate_request(request: &GenerationRequest) -> ApiResult<()> {
        for (field, value) in [
            ("program_id", &request.program_id),
            ("scope", &request.scope),
            ("actor_id", &request.actor_id),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
            }
        }
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn list_current(&self, program_id: &str) -> ApiResult<Vec<AssignmentRecord>> {
        Ok(self.assignment_repo.find_current(program_id)?)
    }

    pub fn list_versions(&self, program_id: &str) -> ApiResult<Vec<AssignmentSetVersion>> {
        Ok(self.assignment_repo.list_versions(program_id)?)
    }

    pub fn list_action_logs(&self, program_id: &str) -> ApiResult<Vec<ActionLog>> {
        Ok(self.action_log_repo.find_by_program(program_id)?)
    }

    // ==========================================
    // 版本管理
    // ==========================================

    /// 回滚到历史分派集
    #[instrument(skip(self))]
    pub fn rollback(
        &self,
        program_id: &str,
        set_id: &str,
        actor_id: &str,
        scope: &str,
    ) -> ApiResult<AssignmentSetVersion> {
        self.authorize(program_id, actor_id, scope)?;

        let version = self
            .assignment_repo
            .activate_version(program_id, set_id, actor_id)?;
        info!(version_no = version.version_no, "分派集已回滚");
        Ok(version)
    }

    /// 删除节目单（级联删除全部分派集）
    #[instrument(skip(self))]
    pub fn delete_program(&self, program_id: &str, actor_id: &str, scope: &str) -> ApiResult<()> {
        self.authorize(program_id, actor_id, scope)?;
        self.program_repo.delete(program_id)?;
        info!("节目单已删除");
        Ok(())
    }

    /// 权限 + 节目单归属校验
    fn authorize(&self, program_id: &str, actor_id: &str, scope: &str) -> ApiResult<()> {
        if !self
            .permission_repo
            .has_permission(actor_id, scope, GENERATE_ASSIGNMENTS)?
        {
            return Err(ApiError::PermissionDenied(format!(
                "操作人 {} 无权管理会众 {} 的分派",
                actor_id, scope
            )));
        }

        match self.program_repo.find_by_id(program_id)? {
            Some(program) if program.congregation_id == scope => Ok(()),
            // 不暴露其他会众的节目单是否存在
            _ => Err(ApiError::NotFound(format!("节目单(id={})不存在", program_id))),
        }
    }
}
