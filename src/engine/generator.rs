// ==========================================
// 学生作业分派引擎 - 贪心分派生成器
// ==========================================
// 职责: 按节目顺序依次挑选主讲与助手
// 输入: 节目列表 + 名册快照 + 公平评分器
// 输出: 分派记录 + 未填节目 + 助手缺口
// ==========================================
// 红线: 同一周内每位学生最多出现一次
// 红线: 找不到人选不是错误, 记录后继续下一节目
// ==========================================

use crate::domain::assignment::AssignmentRecord;
use crate::domain::program::PartDefinition;
use crate::domain::student::Student;
use crate::domain::types::PartType;
use crate::engine::eligibility::EligibilityEngine;
use crate::engine::fairness::FairnessScorer;
use crate::engine::pairing::PairingEngine;
use crate::engine::roster_loader::RosterSnapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// 生成目标周
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekContext {
    pub program_id: String,
    pub week_start: NaiveDate,
}

/// 未能填充的节目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnfilledPart {
    pub ordinal: u32,
    pub part_type: PartType,
    pub reason: String,
}

/// 已有主讲但找不到助手的节目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperShortfall {
    pub ordinal: u32,
    pub part_type: PartType,
    pub principal_id: String,
    pub reason: String,
}

/// 生成结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub records: Vec<AssignmentRecord>,
    pub unfilled: Vec<UnfilledPart>,
    pub helper_shortfalls: Vec<HelperShortfall>,
}

impl GenerationOutcome {
    pub fn is_complete(&self) -> bool {
        self.unfilled.is_empty() && self.helper_shortfalls.is_empty()
    }
}

// ==========================================
// AssignmentGenerator - 分派生成器
// ==========================================
// 无跨调用状态: 已分派集合只存在于单次 generate 调用内
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignmentGenerator {
    eligibility: EligibilityEngine,
    pairing: PairingEngine,
}

impl AssignmentGenerator {
    pub fn new(eligibility: EligibilityEngine, pairing: PairingEngine) -> Self {
        Self {
            eligibility,
            pairing,
        }
    }

    /// 生成一周的分派
    ///
    /// # 参数
    /// - `week`: 目标节目单与周起始日
    /// - `parts`: 节目列表（内部按 ordinal 稳定排序）
    /// - `excluded_ids`: 本周不参与分派的学生, 视为已分派
    /// - `snapshot`: 名册快照
    /// - `scorer`: 公平评分器
    pub fn generate(
        &self,
        week: &WeekContext,
        parts: &[PartDefinition],
        excluded_ids: &[String],
        snapshot: &RosterSnapshot,
        scorer: &FairnessScorer,
    ) -> GenerationOutcome {
        let mut ordered: Vec<&PartDefinition> = parts.iter().collect();
        ordered.sort_by_key(|p| p.ordinal);

        let mut used: HashSet<&str> = excluded_ids.iter().map(String::as_str).collect();
        let mut outcome = GenerationOutcome::default();

        for part in ordered {
            // 1. 主讲候选
            let mut candidates: Vec<&Student> = snapshot
                .students()
                .iter()
                .filter(|s| s.active && !used.contains(s.student_id.as_str()))
                .filter(|s| self.eligibility.is_eligible(s, part))
                .collect();

            if candidates.is_empty() {
                let reason = format!(
                    "NO_ELIGIBLE: 在册 {} 人, 本周已占用 {} 人, 无合格人选",
                    snapshot.students().len(),
                    used.len()
                );
                warn!(
                    program_id = %week.program_id,
                    ordinal = part.ordinal,
                    part_type = %part.part_type,
                    "节目无法填充"
                );
                outcome.unfilled.push(UnfilledPart {
                    ordinal: part.ordinal,
                    part_type: part.part_type.clone(),
                    reason,
                });
                continue;
            }

            candidates.sort_by(|a, b| scorer.compare(&a.student_id, &b.student_id));
            let principal = candidates[0];
            used.insert(principal.student_id.as_str());

            // 2. 助手
            let mut helper_id = None;
            let mut is_family_pair = false;

            if part.requires_helper() {
                let mut helpers: Vec<(&Student, bool)> = snapshot
                    .students()
                    .iter()
                    .filter(|s| s.active && !used.contains(s.student_id.as_str()))
                    .filter_map(|s| {
                        let decision = self.pairing.can_pair(principal, s, snapshot.family());
                        decision.allowed.then_some((s, decision.is_family))
                    })
                    .collect();

                // 家庭配对优先, 其次公平分数
                helpers.sort_by(|(a, a_family), (b, b_family)| {
                    b_family
                        .cmp(a_family)
                        .then_with(|| scorer.compare(&a.student_id, &b.student_id))
                });

                match helpers.first() {
                    Some((helper, family)) => {
                        used.insert(helper.student_id.as_str());
                        helper_id = Some(helper.student_id.clone());
                        is_family_pair = *family;
                    }
                    None => {
                        warn!(
                            program_id = %week.program_id,
                            ordinal = part.ordinal,
                            principal_id = %principal.student_id,
                            "找不到可配对的助手"
                        );
                        outcome.helper_shortfalls.push(HelperShortfall {
                            ordinal: part.ordinal,
                            part_type: part.part_type.clone(),
                            principal_id: principal.student_id.clone(),
                            reason: "NO_PAIRABLE_HELPER: 无符合配对规则的助手".to_string(),
                        });
                    }
                }
            }

            debug!(
                ordinal = part.ordinal,
                principal_id = %principal.student_id,
                helper_id = ?helper_id,
                is_family_pair,
                "节目已分派"
            );

            outcome.records.push(AssignmentRecord {
                program_id: week.program_id.clone(),
                week_start: week.week_start,
                part_ordinal: part.ordinal,
                part_type: part.part_type.clone(),
                principal_id: principal.student_id.clone(),
                helper_id,
                is_family_pair,
            });
        }

        outcome
    }
}
