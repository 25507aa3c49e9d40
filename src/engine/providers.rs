// ==========================================
// 学生作业分派引擎 - 外部协作者接口
// ==========================================
// 职责: 定义引擎依赖的数据提供者（名册/历史/家庭关系/权限/节目单/持久化）
// 红线: 提供者负责会众隔离, 引擎只转发 scope, 不自行推导
// ==========================================

use crate::domain::assignment::{AssignmentRecord, AssignmentSetVersion, HistoryRecord};
use crate::domain::program::{PartDefinition, Program};
use crate::domain::student::{FamilyLink, Student};
use crate::domain::types::RelationshipKind;
use crate::repository::RepositoryResult;
use async_trait::async_trait;
use chrono::NaiveDate;

/// 名册提供者
#[async_trait]
pub trait RosterProvider: Send + Sync {
    /// 会众内在册学生
    async fn list_active_students(&self, scope: &str) -> RepositoryResult<Vec<Student>>;

    /// 会众内全部学生（含停用，供校验区分“不存在”与“已停用”）
    async fn list_students(&self, scope: &str) -> RepositoryResult<Vec<Student>>;
}

/// 历史分派提供者
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// 统计 [since, before) 周范围内每位学生的分派次数
    async fn list_assignment_history(
        &self,
        scope: &str,
        since: NaiveDate,
        before: NaiveDate,
    ) -> RepositoryResult<Vec<HistoryRecord>>;
}

/// 家庭关系提供者
#[async_trait]
pub trait FamilyLinkProvider: Send + Sync {
    /// 单对查询（无向）
    async fn get_relationship(
        &self,
        student_a: &str,
        student_b: &str,
    ) -> RepositoryResult<Option<RelationshipKind>>;

    /// 批量加载会众内全部关系（生成前一次性加载,避免逐对查询）
    async fn list_family_links(&self, scope: &str) -> RepositoryResult<Vec<FamilyLink>>;
}

/// 权限提供者
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn has_generation_permission(&self, actor_id: &str, scope: &str)
        -> RepositoryResult<bool>;
}

/// 节目单提供者
#[async_trait]
pub trait ProgramProvider: Send + Sync {
    async fn find_program(&self, program_id: &str) -> RepositoryResult<Option<Program>>;

    /// 节目列表（按 ordinal 升序）
    async fn list_parts(&self, program_id: &str) -> RepositoryResult<Vec<PartDefinition>>;
}

/// 分派持久化
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// 原子替换节目单的当前分派集
    ///
    /// 红线: 写入新版本与切换 ACTIVE 必须在同一事务内完成
    /// 红线: `replace_existing = false` 时若已有 ACTIVE 分派集, 返回 `VersionConflict`
    async fn replace_assignments(
        &self,
        program_id: &str,
        scope: &str,
        records: &[AssignmentRecord],
        actor_id: &str,
        replace_existing: bool,
        config_snapshot_json: Option<String>,
    ) -> RepositoryResult<AssignmentSetVersion>;

    /// 当前生效分派记录数
    async fn count_existing(&self, program_id: &str) -> RepositoryResult<usize>;
}
