// ==========================================
// 学生作业分派引擎 - 引擎层
// ==========================================
// 职责: 实现分派规则与生成流程, 不拼 SQL
// 红线: 所有判定必须输出 reason
// ==========================================

pub mod eligibility;
pub mod error;
pub mod fairness;
pub mod generator;
pub mod orchestrator;
pub mod pairing;
pub mod providers;
pub mod repositories;
pub mod roster_loader;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_support;

// 重导出核心引擎
pub use eligibility::{EligibilityDecision, EligibilityEngine};
pub use error::{EngineError, EngineResult};
pub use fairness::FairnessScorer;
pub use generator::{
    AssignmentGenerator, GenerationOutcome, HelperShortfall, UnfilledPart, WeekContext,
};
pub use orchestrator::{
    AssignmentOrchestrator, GenerationRequest, GenerationRunReport, SkipReason,
};
pub use pairing::{FamilyIndex, PairKey, PairingDecision, PairingEngine, DEFAULT_ADULT_AGE};
pub use providers::{
    AssignmentStore, FamilyLinkProvider, HistoryProvider, PermissionProvider, ProgramProvider,
    RosterProvider,
};
pub use repositories::AssignmentProviders;
pub use roster_loader::{RosterLoader, RosterSnapshot};
pub use validator::{AccessCheck, Conflict, ConflictKind, SafetyValidator, ValidationReport};
