// ==========================================
// 学生作业分派引擎 - 引擎编排器
// ==========================================
// 用途: 协调 加载 -> 评分 -> 生成 -> 校验 -> 持久化 的执行顺序
// 红线: 权限与节目单归属检查先于名册加载, 被拒时不返回任何生成结果
// 红线: 校验不通过一律不写入
// ==========================================

use crate::config::EngineConfigReader;
use crate::domain::assignment::AssignmentSetVersion;
use crate::engine::eligibility::EligibilityEngine;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::fairness::FairnessScorer;
use crate::engine::generator::{AssignmentGenerator, GenerationOutcome, WeekContext};
use crate::engine::pairing::PairingEngine;
use crate::engine::repositories::AssignmentProviders;
use crate::engine::roster_loader::RosterLoader;
use crate::engine::validator::{AccessCheck, SafetyValidator, ValidationReport};
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ==========================================
// GenerationRequest - 生成请求
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub program_id: String,
    pub scope: String, // 会众ID
    pub actor_id: String,
    pub excluded_ids: Vec<String>,
    pub replace_existing: bool, // 已有分派时是否替换
    pub dry_run: bool,          // 只预览, 不写入
}

impl GenerationRequest {
    pub fn new(
        program_id: impl Into<String>,
        scope: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            program_id: program_id.into(),
            scope: scope.into(),
            actor_id: actor_id.into(),
            excluded_ids: Vec::new(),
            replace_existing: false,
            dry_run: false,
        }
    }

    pub fn with_excluded(mut self, excluded_ids: Vec<String>) -> Self {
        self.excluded_ids = excluded_ids;
        self
    }

    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// 未写入原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    ValidationFailed,
    DryRun,
    ExistingNotReplaced,
    NothingGenerated,
}

// ==========================================
// GenerationRunReport - 单次运行结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRunReport {
    pub program_id: String,
    pub week_start: Option<NaiveDate>, // 访问被拒时为空
    pub outcome: GenerationOutcome,
    pub validation: ValidationReport,
    pub persisted: Option<AssignmentSetVersion>,
    pub skipped_reason: Option<SkipReason>,
}

// ==========================================
// AssignmentOrchestrator - 引擎编排器
// ==========================================
pub struct AssignmentOrchestrator<C>
where
    C: EngineConfigReader,
{
    config: Arc<C>,
    providers: AssignmentProviders,
}

impl<C> AssignmentOrchestrator<C>
where
    C: EngineConfigReader,
{
    /// # 参数
    /// - config: 配置读取器
    /// - providers: 外部协作者
    pub fn new(config: Arc<C>, providers: AssignmentProviders) -> Self {
        Self { config, providers }
    }

    /// 执行完整分派流程（单个节目单）
    ///
    /// # 返回
    /// - Ok(report): 包含生成结果、校验报告与写入结果
    /// - Err: 节目单不存在 / 配置读取失败 / 上游数据失败 / 写入失败
    #[instrument(skip(self, request), fields(program_id = %request.program_id, scope = %request.scope))]
    pub async fn run(&self, request: &GenerationRequest) -> EngineResult<GenerationRunReport> {
        info!(
            actor_id = %request.actor_id,
            excluded = request.excluded_ids.len(),
            replace_existing = request.replace_existing,
            dry_run = request.dry_run,
            "开始执行分派流程"
        );

        // ==========================================
        // 步骤1: 配置
        // ==========================================
        let window_weeks = self
            .config
            .get_fairness_window_weeks()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let jitter_max = self
            .config
            .get_fairness_jitter_max()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let adult_age = self
            .config
            .get_minor_age_threshold()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let seed = self
            .config
            .get_fairness_seed()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let config_snapshot = self
            .config
            .get_config_snapshot()
            .await
            .map_err(|e| EngineError::Config(e.to_string()))?;

        debug!(window_weeks, jitter_max, adult_age, seed = ?seed, "配置加载完成");

        // ==========================================
        // 步骤2: 权限与节目单归属 (先于任何名册读取)
        // ==========================================
        let validator = SafetyValidator::new(self.providers.clone(), adult_age);
        let program = match validator
            .check_access(&request.program_id, &request.actor_id, &request.scope)
            .await?
        {
            AccessCheck::Granted(program) => program,
            AccessCheck::Denied(validation) => {
                warn!(errors = ?validation.errors, "访问被拒, 不加载名册");
                return Ok(GenerationRunReport {
                    program_id: request.program_id.clone(),
                    week_start: None,
                    outcome: GenerationOutcome::default(),
                    validation,
                    persisted: None,
                    skipped_reason: Some(SkipReason::ValidationFailed),
                });
            }
            AccessCheck::ProgramMissing => {
                return Err(EngineError::ProgramNotFound(request.program_id.clone()))
            }
        };

        let parts = self
            .providers
            .program
            .list_parts(&request.program_id)
            .await
            .map_err(|e| EngineError::upstream("program", e))?;

        // ==========================================
        // 步骤3: 名册快照 + 公平评分
        // ==========================================
        let snapshot = RosterLoader::new(self.providers.clone())
            .load(&request.scope, program.week_start, window_weeks)
            .await?;
        let scorer = FairnessScorer::with_seed(
            snapshot.history(),
            snapshot.student_ids(),
            jitter_max,
            seed,
        );

        // ==========================================
        // 步骤4: 生成
        // ==========================================
        let week = WeekContext {
            program_id: program.program_id.clone(),
            week_start: program.week_start,
        };
        let generator =
            AssignmentGenerator::new(EligibilityEngine::new(), PairingEngine::new(adult_age));
        let outcome = generator.generate(&week, &parts, &request.excluded_ids, &snapshot, &scorer);

        info!(
            parts = parts.len(),
            records = outcome.records.len(),
            unfilled = outcome.unfilled.len(),
            helper_shortfalls = outcome.helper_shortfalls.len(),
            "分派生成完成"
        );

        // ==========================================
        // 步骤5: 校验
        // ==========================================
        let mut validation = validator
            .validate(
                &outcome.records,
                &request.program_id,
                &request.actor_id,
                &request.scope,
            )
            .await?;

        // ==========================================
        // 步骤6: 写入
        // ==========================================
        let mut skipped_reason = if !validation.valid {
            Some(SkipReason::ValidationFailed)
        } else if request.dry_run {
            Some(SkipReason::DryRun)
        } else if validation.existing_count > 0 && !request.replace_existing {
            Some(SkipReason::ExistingNotReplaced)
        } else if outcome.records.is_empty() {
            Some(SkipReason::NothingGenerated)
        } else {
            None
        };

        let persisted = match skipped_reason {
            Some(reason) => {
                warn!(reason = ?reason, "分派未写入");
                None
            }
            None => {
                let written = self
                    .providers
                    .store
                    .replace_assignments(
                        &request.program_id,
                        &request.scope,
                        &outcome.records,
                        &request.actor_id,
                        request.replace_existing,
                        Some(config_snapshot),
                    )
                    .await;
                match written {
                    Ok(version) => {
                        info!(
                            set_id = %version.set_id,
                            version_no = version.version_no,
                            "分派集已写入"
                        );
                        Some(version)
                    }
                    // 校验之后已有其他运行提交了分派集
                    Err(RepositoryError::VersionConflict { message }) => {
                        warn!(%message, "写入时发现已有生效分派集, 未替换");
                        validation
                            .warnings
                            .push(format!("EXISTING_ASSIGNMENTS: {}", message));
                        skipped_reason = Some(SkipReason::ExistingNotReplaced);
                        None
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        Ok(GenerationRunReport {
            program_id: program.program_id,
            week_start: Some(program.week_start),
            outcome,
            validation,
            persisted,
            skipped_reason,
        })
    }
}
