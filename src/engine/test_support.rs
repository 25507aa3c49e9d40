// ==========================================
// 引擎单元测试 - 内存协作者
// ==========================================

use crate::domain::assignment::{AssignmentRecord, AssignmentSetVersion, HistoryRecord};
use crate::domain::program::{PartDefinition, Program};
use crate::domain::student::{FamilyLink, Student};
use crate::domain::types::{AssignmentSetStatus, Gender, PartType, RelationshipKind, StudentRole};
use crate::engine::pairing::PairKey;
use crate::engine::providers::{
    AssignmentStore, FamilyLinkProvider, HistoryProvider, PermissionProvider, ProgramProvider,
    RosterProvider,
};
use crate::engine::repositories::AssignmentProviders;
use crate::repository::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct InMemoryProviders {
    pub students: Vec<Student>,
    pub history: Vec<HistoryRecord>,
    pub links: Vec<FamilyLink>,
    pub permitted: bool,
    pub program: Option<Program>,
    pub parts: Vec<PartDefinition>,
    pub existing: usize,
    pub fail_roster: bool,
    pub committed_elsewhere: bool, // 校验后、写入前已有其他运行提交
    pub saved: Mutex<Vec<Vec<AssignmentRecord>>>,
}

impl InMemoryProviders {
    pub fn into_providers(self) -> (Arc<Self>, AssignmentProviders) {
        let shared = Arc::new(self);
        let providers = AssignmentProviders::new(
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
            shared.clone(),
        );
        (shared, providers)
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().map(|s| s.len()).unwrap_or(0)
    }
}

pub fn week_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
}

pub fn program(program_id: &str, scope: &str) -> Program {
    Program {
        program_id: program_id.to_string(),
        congregation_id: scope.to_string(),
        week_start: week_start(),
        title: "2024年3月4-10日".to_string(),
    }
}

pub fn part(ordinal: u32, part_type: PartType) -> PartDefinition {
    PartDefinition {
        ordinal,
        part_type,
        title: format!("节目{}", ordinal),
        duration_minutes: 5,
        scene: None,
    }
}

pub fn student(id: &str, gender: Gender, role: StudentRole) -> Student {
    Student {
        student_id: id.to_string(),
        congregation_id: "C1".to_string(),
        display_name: id.to_string(),
        gender,
        role,
        age: Some(30),
        active: true,
        guardian_id: None,
    }
}

pub fn record(
    ordinal: u32,
    part_type: PartType,
    principal: &str,
    helper: Option<&str>,
) -> AssignmentRecord {
    AssignmentRecord {
        program_id: "P1".to_string(),
        week_start: week_start(),
        part_ordinal: ordinal,
        part_type,
        principal_id: principal.to_string(),
        helper_id: helper.map(str::to_string),
        is_family_pair: false,
    }
}

#[async_trait]
impl RosterProvider for InMemoryProviders {
    async fn list_active_students(&self, scope: &str) -> RepositoryResult<Vec<Student>> {
        Ok(self
            .list_students(scope)
            .await?
            .into_iter()
            .filter(|s| s.active)
            .collect())
    }

    async fn list_students(&self, scope: &str) -> RepositoryResult<Vec<Student>> {
        if self.fail_roster {
            return Err(RepositoryError::LockError("名册不可用".to_string()));
        }
        Ok(self
            .students
            .iter()
            .filter(|s| s.congregation_id == scope)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl HistoryProvider for InMemoryProviders {
    async fn list_assignment_history(
        &self,
        _scope: &str,
        _since: NaiveDate,
        _before: NaiveDate,
    ) -> RepositoryResult<Vec<HistoryRecord>> {
        Ok(self.history.clone())
    }
}

#[async_trait]
impl FamilyLinkProvider for InMemoryProviders {
    async fn get_relationship(
        &self,
        student_a: &str,
        student_b: &str,
    ) -> RepositoryResult<Option<RelationshipKind>> {
        let key = PairKey::new(student_a, student_b);
        Ok(self
            .links
            .iter()
            .find(|l| PairKey::new(&l.student_a, &l.student_b) == key)
            .map(|l| l.kind))
    }

    async fn list_family_links(&self, _scope: &str) -> RepositoryResult<Vec<FamilyLink>> {
        Ok(self.links.clone())
    }
}

#[async_trait]
impl PermissionProvider for InMemoryProviders {
    async fn has_generation_permission(&self, _actor_id: &str, _scope: &str) -> RepositoryResult<bool> {
        Ok(self.permitted)
    }
}

#[async_trait]
impl ProgramProvider for InMemoryProviders {
    async fn find_program(&self, program_id: &str) -> RepositoryResult<Option<Program>> {
        Ok(self
            .program
            .clone()
            .filter(|p| p.program_id == program_id))
    }

    async fn list_parts(&self, _program_id: &str) -> RepositoryResult<Vec<PartDefinition>> {
        Ok(self.parts.clone())
    }
}

#[async_trait]
impl AssignmentStore for InMemoryProviders {
    async fn replace_assignments(
        &self,
        program_id: &str,
        _scope: &str,
        records: &[AssignmentRecord],
        actor_id: &str,
        replace_existing: bool,
        config_snapshot_json: Option<String>,
    ) -> RepositoryResult<AssignmentSetVersion> {
        let mut saved = self
            .saved
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let active = self.existing > 0 || self.committed_elsewhere || !saved.is_empty();
        if active && !replace_existing {
            return Err(RepositoryError::VersionConflict {
                message: format!("{} 已有生效分派集", program_id),
            });
        }
        saved.push(records.to_vec());

        Ok(AssignmentSetVersion {
            set_id: format!("SET-{}", saved.len()),
            program_id: program_id.to_string(),
            version_no: saved.len() as i32,
            status: AssignmentSetStatus::Active,
            record_count: records.len(),
            created_by: actor_id.to_string(),
            created_at: week_start().and_hms_opt(9, 0, 0).unwrap(),
            config_snapshot_json,
        })
    }

    async fn count_existing(&self, _program_id: &str) -> RepositoryResult<usize> {
        Ok(self.existing)
    }
}

/// 固定值配置
pub struct StaticConfig {
    pub window_weeks: u32,
    pub jitter_max: f64,
    pub adult_age: u32,
    pub seed: Option<u64>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            window_weeks: 8,
            jitter_max: 0.1,
            adult_age: 18,
            seed: Some(7),
        }
    }
}

type ConfigResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[async_trait]
impl crate::config::EngineConfigReader for StaticConfig {
    async fn get_fairness_window_weeks(&self) -> ConfigResult<u32> {
        Ok(self.window_weeks)
    }

    async fn get_fairness_jitter_max(&self) -> ConfigResult<f64> {
        Ok(self.jitter_max)
    }

    async fn get_minor_age_threshold(&self) -> ConfigResult<u32> {
        Ok(self.adult_age)
    }

    async fn get_fairness_seed(&self) -> ConfigResult<Option<u64>> {
        Ok(self.seed)
    }

    async fn get_config_snapshot(&self) -> ConfigResult<String> {
        Ok(format!(r#"{{"fairness_seed":"{:?}"}}"#, self.seed))
    }
}
