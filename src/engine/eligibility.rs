// ==========================================
// 学生作业分派引擎 - 资格判定引擎
// ==========================================
// 红线: 角色/性别判定只在此处实现, 其他模块不得重复
// 红线: 未识别节目类型一律不合格 (fail closed)
// ==========================================
// 职责: (学生, 节目) -> 合格/不合格 + 原因
// 纯函数, 无副作用
// ==========================================

use crate::domain::program::PartDefinition;
use crate::domain::student::Student;
use crate::domain::types::{Gender, PartType};
use serde::{Deserialize, Serialize};

/// 资格判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub eligible: bool,
    pub reason: String,
}

impl EligibilityDecision {
    fn allow(reason: impl Into<String>) -> Self {
        Self {
            eligible: true,
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            eligible: false,
            reason: reason.into(),
        }
    }
}

/// 节目类型对应的资格要求
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Requirement {
    MaleOnly,
    QualifiedMale,
    AnyStudent,
    Never,
}

// ==========================================
// EligibilityEngine - 资格判定引擎
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct EligibilityEngine {
    // 无状态引擎,不需要注入依赖
}

impl EligibilityEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// 学生是否可担任该节目主讲
    pub fn is_eligible(&self, student: &Student, part: &PartDefinition) -> bool {
        self.evaluate(student, &part.part_type).eligible
    }

    /// 判定资格并给出原因
    ///
    /// # 规则
    /// 1. 停用学生一律不合格
    /// 2. 经文朗读/学生演讲: 仅限弟兄
    /// 3. 宝藏/属灵宝石/研经班/祷告/开场白/结束语/基督徒生活演讲:
    ///    弟兄且身份 ∈ {长老, 助理仆人, 正规先驱, 受浸传道员}
    /// 4. 传道示范类: 任何在册学生
    /// 5. 未识别类型: 不合格
    pub fn evaluate(&self, student: &Student, part_type: &PartType) -> EligibilityDecision {
        if !student.active {
            return EligibilityDecision::deny(format!(
                "INACTIVE: 学生 {} 已停用",
                student.student_id
            ));
        }

        match Self::requirement(part_type) {
            Requirement::MaleOnly => {
                if student.gender == Gender::Male {
                    EligibilityDecision::allow(format!("{}: 弟兄可担任", part_type))
                } else {
                    EligibilityDecision::deny(format!("GENDER: {} 仅限弟兄", part_type))
                }
            }
            Requirement::QualifiedMale => {
                if student.gender != Gender::Male {
                    EligibilityDecision::deny(format!("GENDER: {} 仅限弟兄", part_type))
                } else if !student.role.is_discourse_qualified() {
                    EligibilityDecision::deny(format!(
                        "ROLE: {} 需要讲演资格, 当前身份 {}",
                        part_type, student.role
                    ))
                } else {
                    EligibilityDecision::allow(format!(
                        "{}: 具备讲演资格 ({})",
                        part_type, student.role
                    ))
                }
            }
            Requirement::AnyStudent => {
                EligibilityDecision::allow(format!("{}: 任何在册学生均可担任", part_type))
            }
            Requirement::Never => {
                EligibilityDecision::deny(format!("UNKNOWN_PART: 无法识别的节目类型 {}", part_type))
            }
        }
    }

    // 穷举匹配: 新增节目类型必须在此显式归类
    fn requirement(part_type: &PartType) -> Requirement {
        match part_type {
            PartType::BibleReading | PartType::Talk => Requirement::MaleOnly,
            PartType::Treasures
            | PartType::SpiritualGems
            | PartType::CongregationBibleStudy
            | PartType::OpeningPrayer
            | PartType::ClosingPrayer
            | PartType::OpeningComments
            | PartType::ClosingComments
            | PartType::ChristianLifeTalk => Requirement::QualifiedMale,
            PartType::Demonstration
            | PartType::StartingConversation
            | PartType::FollowingUp
            | PartType::MakingDisciples
            | PartType::MinistryPart => Requirement::AnyStudent,
            PartType::Unknown(_) => Requirement::Never,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::StudentRole;

    fn student(id: &str, gender: Gender, role: StudentRole, active: bool) -> Student {
        Student {
            student_id: id.to_string(),
            congregation_id: "C1".to_string(),
            display_name: id.to_string(),
            gender,
            role,
            age: Some(30),
            active,
            guardian_id: None,
        }
    }

    const ALL_ROLES: [StudentRole; 6] = [
        StudentRole::UnbaptizedPublisher,
        StudentRole::BaptizedPublisher,
        StudentRole::RegularPioneer,
        StudentRole::MinisterialServant,
        StudentRole::Elder,
        StudentRole::NewStudent,
    ];

    fn all_part_types() -> Vec<PartType> {
        vec![
            PartType::BibleReading,
            PartType::Talk,
            PartType::Treasures,
            PartType::SpiritualGems,
            PartType::CongregationBibleStudy,
            PartType::OpeningPrayer,
            PartType::ClosingPrayer,
            PartType::OpeningComments,
            PartType::ClosingComments,
            PartType::ChristianLifeTalk,
            PartType::Demonstration,
            PartType::StartingConversation,
            PartType::FollowingUp,
            PartType::MakingDisciples,
            PartType::MinistryPart,
            PartType::Unknown("WATCHTOWER".to_string()),
        ]
    }

    #[test]
    fn test_reading_and_talk_are_male_only() {
        let engine = EligibilityEngine::new();

        for role in ALL_ROLES {
            for gender in [Gender::Male, Gender::Female] {
                let s = student("S", gender, role, true);
                for part_type in [PartType::BibleReading, PartType::Talk] {
                    let decision = engine.evaluate(&s, &part_type);
                    assert_eq!(decision.eligible, gender == Gender::Male, "{:?}", decision);
                }
            }
        }
    }

    #[test]
    fn test_qualified_parts_require_male_and_discourse_role() {
        let engine = EligibilityEngine::new();

        let elder = student("E", Gender::Male, StudentRole::Elder, true);
        let publisher = student("P", Gender::Male, StudentRole::BaptizedPublisher, true);
        let unbaptized = student("U", Gender::Male, StudentRole::UnbaptizedPublisher, true);
        let new_student = student("N", Gender::Male, StudentRole::NewStudent, true);
        let pioneer_sister = student("F", Gender::Female, StudentRole::RegularPioneer, true);

        for part_type in [PartType::Treasures, PartType::OpeningPrayer, PartType::CongregationBibleStudy] {
            assert!(engine.evaluate(&elder, &part_type).eligible);
            assert!(engine.evaluate(&publisher, &part_type).eligible);
            assert!(!engine.evaluate(&unbaptized, &part_type).eligible);
            assert!(!engine.evaluate(&new_student, &part_type).eligible);

            let denied = engine.evaluate(&pioneer_sister, &part_type);
            assert!(!denied.eligible);
            assert!(denied.reason.starts_with("GENDER"));
        }
    }

    #[test]
    fn test_ministry_parts_open_to_everyone_active() {
        let engine = EligibilityEngine::new();
        let sister = student("F", Gender::Female, StudentRole::NewStudent, true);

        assert!(engine.evaluate(&sister, &PartType::Demonstration).eligible);
        assert!(engine.evaluate(&sister, &PartType::MakingDisciples).eligible);
        assert!(engine.evaluate(&sister, &PartType::MinistryPart).eligible);
    }

    #[test]
    fn test_inactive_never_eligible() {
        let engine = EligibilityEngine::new();
        let inactive_elder = student("E", Gender::Male, StudentRole::Elder, false);

        for part_type in all_part_types() {
            let decision = engine.evaluate(&inactive_elder, &part_type);
            assert!(!decision.eligible);
            assert!(decision.reason.starts_with("INACTIVE"));
        }
    }

    #[test]
    fn test_unknown_part_type_fails_closed() {
        let engine = EligibilityEngine::new();
        let elder = student("E", Gender::Male, StudentRole::Elder, true);

        let decision = engine.evaluate(&elder, &PartType::Unknown("LOCAL_NEEDS".to_string()));
        assert!(!decision.eligible);
        assert!(decision.reason.starts_with("UNKNOWN_PART"));
    }

    #[test]
    fn test_is_eligible_uses_part_definition() {
        let engine = EligibilityEngine::new();
        let sister = student("F", Gender::Female, StudentRole::BaptizedPublisher, true);
        let part = PartDefinition {
            ordinal: 3,
            part_type: PartType::BibleReading,
            title: "经文朗读".to_string(),
            duration_minutes: 4,
            scene: None,
        };

        assert!(!engine.is_eligible(&sister, &part));
    }
}
