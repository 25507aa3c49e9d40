// ==========================================
// 学生作业分派引擎 - 安全校验器
// ==========================================
// 职责: 持久化前对一组分派记录做完整校验
// 红线: 权限与节目单归属失败立即返回, 不再执行后续检查
// 红线: 其余检查累积全部问题, 不在首个错误处中止
// ==========================================
// 检查顺序:
// 1. 操作人权限
// 2. 节目单存在且属于会众, 记录引用本节目单
// 3. 学生存在且在册
// 4. 结构冲突 (重复学生 / 自我配对 / 重复节目)
// 5. 资格与配对规则复核
// 6. 已有分派 -> 警告
// ==========================================

use crate::domain::assignment::AssignmentRecord;
use crate::domain::program::Program;
use crate::domain::student::Student;
use crate::engine::eligibility::EligibilityEngine;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pairing::{FamilyIndex, PairingEngine};
use crate::engine::repositories::AssignmentProviders;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

/// 结构冲突类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    DuplicateStudent, // 同一学生出现在多条记录
    SelfPairing,      // 主讲 == 助手
    DuplicatePart,    // 同一节目出现多条记录
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub student_id: Option<String>,
    pub part_ordinals: Vec<u32>,
    pub message: String,
}

/// 校验报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub conflicts: Vec<Conflict>,
    pub existing_count: usize,
}

impl ValidationReport {
    fn rejected(error: String) -> Self {
        Self {
            errors: vec![error],
            ..Default::default()
        }
    }

    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty() && self.conflicts.is_empty();
        self
    }
}

/// 权限与节目单归属检查结果
#[derive(Debug, Clone, PartialEq)]
pub enum AccessCheck {
    Granted(Program),
    Denied(ValidationReport),
    ProgramMissing,
}

// ==========================================
// SafetyValidator - 安全校验器
// ==========================================
pub struct SafetyValidator {
    providers: AssignmentProviders,
    eligibility: EligibilityEngine,
    pairing: PairingEngine,
}

impl SafetyValidator {
    /// # 参数
    /// - providers: 外部协作者
    /// - adult_age: 成年年龄阈值
    pub fn new(providers: AssignmentProviders, adult_age: u32) -> Self {
        Self {
            providers,
            eligibility: EligibilityEngine::new(),
            pairing: PairingEngine::new(adult_age),
        }
    }

    /// 权限与节目单归属检查
    ///
    /// 权限先于节目单查询执行, 无权限时不暴露节目单是否存在
    pub async fn check_access(
        &self,
        program_id: &str,
        actor_id: &str,
        scope: &str,
    ) -> EngineResult<AccessCheck> {
        let permitted = self
            .providers
            .permission
            .has_generation_permission(actor_id, scope)
            .await
            .map_err(|e| EngineError::upstream("permission", e))?;
        if !permitted {
            debug!(actor_id = %actor_id, scope = %scope, "操作人无生成权限");
            return Ok(AccessCheck::Denied(ValidationReport::rejected(format!(
                "PERMISSION_DENIED: 操作人 {} 无权为会众 {} 生成分派",
                actor_id, scope
            ))));
        }

        let program = self
            .providers
            .program
            .find_program(program_id)
            .await
            .map_err(|e| EngineError::upstream("program", e))?;
        Ok(match program {
            Some(p) if p.congregation_id == scope => AccessCheck::Granted(p),
            Some(_) => AccessCheck::Denied(ValidationReport::rejected(format!(
                "PROGRAM_SCOPE_MISMATCH: 节目单 {} 不属于会众 {}",
                program_id, scope
            ))),
            None => AccessCheck::ProgramMissing,
        })
    }

    /// 校验分派记录
    ///
    /// # 返回
    /// - Ok(report): 规则/结构问题以报告形式返回
    /// - Err: 上游数据加载失败
    pub async fn validate(
        &self,
        records: &[AssignmentRecord],
        program_id: &str,
        actor_id: &str,
        scope: &str,
    ) -> EngineResult<ValidationReport> {
        let mut report = ValidationReport::default();

        // ===== 1-2. 权限 / 节目单 =====
        let program = match self.check_access(program_id, actor_id, scope).await? {
            AccessCheck::Granted(program) => program,
            AccessCheck::Denied(denied) => return Ok(denied),
            AccessCheck::ProgramMissing => {
                report
                    .errors
                    .push(format!("PROGRAM_NOT_FOUND: 节目单 {} 不存在", program_id));
                return Ok(report.finish());
            }
        };

        let parts = self
            .providers
            .program
            .list_parts(program_id)
            .await
            .map_err(|e| EngineError::upstream("program", e))?;
        let parts_by_ordinal: HashMap<u32, _> = parts.iter().map(|p| (p.ordinal, p)).collect();

        for record in records {
            if record.program_id != program.program_id || record.week_start != program.week_start {
                report.errors.push(format!(
                    "PROGRAM_MISMATCH: 节目 {} 引用了 {} / {}, 期望 {} / {}",
                    record.part_ordinal,
                    record.program_id,
                    record.week_start,
                    program.program_id,
                    program.week_start
                ));
            }
            match parts_by_ordinal.get(&record.part_ordinal) {
                Some(part) if part.part_type == record.part_type => {}
                Some(part) => report.errors.push(format!(
                    "PART_MISMATCH: 节目 {} 类型为 {}, 记录为 {}",
                    record.part_ordinal, part.part_type, record.part_type
                )),
                None => report.errors.push(format!(
                    "PART_NOT_FOUND: 节目单中不存在节目 {}",
                    record.part_ordinal
                )),
            }
        }

        // ===== 3. 学生存在且在册 =====
        let roster = self
            .providers
            .roster
            .list_students(scope)
            .await
            .map_err(|e| EngineError::upstream("roster", e))?;
        let roster: HashMap<&str, &Student> =
            roster.iter().map(|s| (s.student_id.as_str(), s)).collect();

        let mut unusable: HashSet<&str> = HashSet::new();
        for record in records {
            for id in record.student_ids() {
                if unusable.contains(id) {
                    continue;
                }
                match roster.get(id) {
                    None => {
                        report
                            .errors
                            .push(format!("STUDENT_NOT_FOUND: 会众内不存在学生 {}", id));
                        unusable.insert(id);
                    }
                    Some(s) if !s.active => {
                        report
                            .errors
                            .push(format!("STUDENT_INACTIVE: 学生 {} 已停用", id));
                        unusable.insert(id);
                    }
                    Some(_) => {}
                }
            }
        }

        // ===== 4. 结构冲突 =====
        report.conflicts = Self::structural_conflicts(records);

        // ===== 5. 规则复核 =====
        let links = self
            .providers
            .family
            .list_family_links(scope)
            .await
            .map_err(|e| EngineError::upstream("family", e))?;
        let family = FamilyIndex::from_links(links);

        for record in records {
            if let Some(principal) = roster
                .get(record.principal_id.as_str())
                .filter(|_| !unusable.contains(record.principal_id.as_str()))
            {
                let decision = self.eligibility.evaluate(principal, &record.part_type);
                if !decision.eligible {
                    report.errors.push(format!(
                        "ELIGIBILITY: 节目 {} 主讲 {} 不合格 ({})",
                        record.part_ordinal, principal.student_id, decision.reason
                    ));
                }
            }

            let Some(helper_id) = record.helper_id.as_deref() else {
                continue;
            };

            if !record.part_type.requires_helper() {
                report.errors.push(format!(
                    "HELPER_NOT_ALLOWED: 节目 {} ({}) 不需要助手",
                    record.part_ordinal, record.part_type
                ));
            }

            // 自我配对已作为结构冲突上报
            if helper_id == record.principal_id
                || unusable.contains(helper_id)
                || unusable.contains(record.principal_id.as_str())
            {
                continue;
            }

            if let (Some(principal), Some(helper)) = (
                roster.get(record.principal_id.as_str()),
                roster.get(helper_id),
            ) {
                let decision = self.pairing.can_pair(principal, helper, &family);
                if !decision.allowed {
                    report.errors.push(format!(
                        "PAIRING: 节目 {} {} 与 {} 不能配对 ({})",
                        record.part_ordinal, principal.student_id, helper_id, decision.reason
                    ));
                } else if decision.is_family != record.is_family_pair {
                    report.warnings.push(format!(
                        "FAMILY_FLAG: 节目 {} 家庭配对标记与关系数据不一致",
                        record.part_ordinal
                    ));
                }
            }
        }

        // ===== 6. 已有分派 =====
        let existing = self
            .providers
            .store
            .count_existing(program_id)
            .await
            .map_err(|e| EngineError::upstream("store", e))?;
        report.existing_count = existing;
        if existing > 0 {
            report.warnings.push(format!(
                "EXISTING_ASSIGNMENTS: 节目单 {} 已有 {} 条生效分派",
                program_id, existing
            ));
        }

        let report = report.finish();
        info!(
            program_id = %program_id,
            records = records.len(),
            valid = report.valid,
            errors = report.errors.len(),
            conflicts = report.conflicts.len(),
            warnings = report.warnings.len(),
            "分派校验完成"
        );
        Ok(report)
    }

    /// 结构冲突检测（纯函数）
    pub fn structural_conflicts(records: &[AssignmentRecord]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let mut by_student: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        let mut by_part: BTreeMap<u32, usize> = BTreeMap::new();

        for record in records {
            *by_part.entry(record.part_ordinal).or_default() += 1;

            if record.helper_id.as_deref() == Some(record.principal_id.as_str()) {
                conflicts.push(Conflict {
                    kind: ConflictKind::SelfPairing,
                    student_id: Some(record.principal_id.clone()),
                    part_ordinals: vec![record.part_ordinal],
                    message: format!(
                        "SELF_PAIRING: 节目 {} 主讲与助手为同一人 {}",
                        record.part_ordinal, record.principal_id
                    ),
                });
            }

            let distinct: HashSet<&str> = record.student_ids().collect();
            for id in distinct {
                by_student.entry(id).or_default().push(record.part_ordinal);
            }
        }

        for (student_id, ordinals) in by_student {
            if ordinals.len() > 1 {
                conflicts.push(Conflict {
                    kind: ConflictKind::DuplicateStudent,
                    student_id: Some(student_id.to_string()),
                    message: format!(
                        "DUPLICATE_STUDENT: 学生 {} 出现在节目 {:?}",
                        student_id, ordinals
                    ),
                    part_ordinals: ordinals,
                });
            }
        }

        for (ordinal, count) in by_part {
            if count > 1 {
                conflicts.push(Conflict {
                    kind: ConflictKind::DuplicatePart,
                    student_id: None,
                    part_ordinals: vec![ordinal],
                    message: format!("DUPLICATE_PART: 节目 {} 有 {} 条记录", ordinal, count),
                });
            }
        }

        debug!(conflicts = conflicts.len(), "结构冲突检测完成");
        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::student::FamilyLink;
    use crate::domain::types::{Gender, PartType, RelationshipKind, StudentRole};
    use crate::engine::test_support::*;

    fn base() -> InMemoryProviders {
        InMemoryProviders {
            students: vec![
                student("E1", Gender::Male, StudentRole::Elder),
                student("B1", Gender::Male, StudentRole::BaptizedPublisher),
                student("S1", Gender::Female, StudentRole::BaptizedPublisher),
                student("S2", Gender::Female, StudentRole::RegularPioneer),
            ],
            permitted: true,
            program: Some(program("P1", "C1")),
            parts: vec![
                part(1, PartType::OpeningPrayer),
                part(3, PartType::BibleReading),
                part(5, PartType::StartingConversation),
            ],
            ..Default::default()
        }
    }

    fn validator(data: InMemoryProviders) -> SafetyValidator {
        let (_, providers) = data.into_providers();
        SafetyValidator::new(providers, 18)
    }

    #[tokio::test]
    async fn test_valid_set_passes() {
        let records = vec![
            record(1, PartType::OpeningPrayer, "E1", None),
            record(3, PartType::BibleReading, "B1", None),
            record(5, PartType::StartingConversation, "S1", Some("S2")),
        ];

        let report = validator(base())
            .validate(&records, "P1", "actor", "C1")
            .await
            .unwrap();

        assert!(report.valid, "{:?}", report);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_self_pair_is_structural_conflict() {
        let records = vec![record(5, PartType::StartingConversation, "S1", Some("S1"))];

        let report = validator(base())
            .validate(&records, "P1", "actor", "C1")
            .await
            .unwrap();

        assert!(!report.valid);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind, ConflictKind::SelfPairing);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_permission_denied_returns_early() {
        let mut data = base();
        data.permitted = false;
        data.existing = 3;
        let records = vec![record(3, PartType::BibleReading, "S1", Some("S1"))];

        let report = validator(data)
            .validate(&records, "P1", "actor", "C1")
            .await
            .unwrap();

        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("PERMISSION_DENIED"));
        assert!(report.conflicts.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_foreign_program_returns_early() {
        let mut data = base();
        data.program = Some(program("P1", "C2"));

        let report = validator(data)
            .validate(&[], "P1", "actor", "C1")
            .await
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("PROGRAM_SCOPE_MISMATCH"));
    }

    #[tokio::test]
    async fn test_accumulates_every_problem() {
        let mut data = base();
        data.students[3].active = false;
        data.existing = 4;
        let records = vec![
            record(1, PartType::OpeningPrayer, "S1", None),
            record(3, PartType::BibleReading, "GHOST", None),
            record(5, PartType::StartingConversation, "B1", Some("S2")),
            record(9, PartType::Talk, "B1", None),
        ];

        let report = validator(data)
            .validate(&records, "P1", "actor", "C1")
            .await
            .unwrap();

        assert!(!report.valid);
        let has = |prefix: &str| report.errors.iter().any(|e| e.starts_with(prefix));
        assert!(has("ELIGIBILITY"));
        assert!(has("STUDENT_NOT_FOUND"));
        assert!(has("STUDENT_INACTIVE"));
        assert!(has("PART_NOT_FOUND"));
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].kind, ConflictKind::DuplicateStudent);
        assert_eq!(report.conflicts[0].part_ordinals, vec![5, 9]);
        assert_eq!(report.existing_count, 4);
        assert!(report.warnings[0].starts_with("EXISTING_ASSIGNMENTS"));
    }

    #[tokio::test]
    async fn test_pairing_and_helper_rules_rechecked() {
        let mut data = base();
        data.links = vec![FamilyLink {
            student_a: "E1".to_string(),
            student_b: "S2".to_string(),
            kind: RelationshipKind::Spouse,
        }];
        let mut family_record = record(5, PartType::StartingConversation, "S2", Some("E1"));
        family_record.is_family_pair = true;

        let ok = validator(base_with_links(data.links.clone()))
            .validate(&[family_record], "P1", "actor", "C1")
            .await
            .unwrap();
        assert!(ok.valid, "{:?}", ok);

        let records = vec![
            record(5, PartType::StartingConversation, "S1", Some("B1")),
            record(3, PartType::BibleReading, "E1", Some("S2")),
        ];
        let report = validator(data)
            .validate(&records, "P1", "actor", "C1")
            .await
            .unwrap();

        assert!(report.errors.iter().any(|e| e.starts_with("PAIRING")));
        assert!(report.errors.iter().any(|e| e.starts_with("HELPER_NOT_ALLOWED")));
    }

    fn base_with_links(links: Vec<FamilyLink>) -> InMemoryProviders {
        InMemoryProviders { links, ..base() }
    }

    #[tokio::test]
    async fn test_upstream_failure_is_error() {
        let mut data = base();
        data.fail_roster = true;

        let result = validator(data).validate(&[], "P1", "actor", "C1").await;
        assert!(matches!(
            result,
            Err(EngineError::Upstream { provider: "roster", .. })
        ));
    }

    #[test]
    fn test_duplicate_part_detected() {
        let conflicts = SafetyValidator::structural_conflicts(&[
            record(3, PartType::BibleReading, "A", None),
            record(3, PartType::BibleReading, "B", None),
        ]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::DuplicatePart);
    }
}
