// ==========================================
// 学生作业分派引擎 - 配对规则引擎
// ==========================================
// 红线: 未成年人只能同性配对
// 红线: 异性配对必须存在家庭关系
// ==========================================
// 职责: 判定 (主讲, 助手) 是否可配对, 以及是否为家庭配对
// 输入: 两位学生 + 预加载的家庭关系索引
// ==========================================

use crate::domain::student::{FamilyLink, Student};
use crate::domain::types::RelationshipKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 默认成年年龄
pub const DEFAULT_ADULT_AGE: u32 = 18;

// ==========================================
// PairKey - 无序学生ID对
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            PairKey(a.to_string(), b.to_string())
        } else {
            PairKey(b.to_string(), a.to_string())
        }
    }
}

// ==========================================
// FamilyIndex - 家庭关系索引
// ==========================================
// 生成前一次性批量加载, 循环内只做内存查找
#[derive(Debug, Clone, Default)]
pub struct FamilyIndex {
    links: HashMap<PairKey, RelationshipKind>,
}

impl FamilyIndex {
    pub fn from_links(links: impl IntoIterator<Item = FamilyLink>) -> Self {
        let links = links
            .into_iter()
            .filter(|link| link.student_a != link.student_b)
            .map(|link| (PairKey::new(&link.student_a, &link.student_b), link.kind))
            .collect();
        Self { links }
    }

    pub fn relationship(&self, a: &str, b: &str) -> Option<RelationshipKind> {
        self.links.get(&PairKey::new(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// 配对判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingDecision {
    pub allowed: bool,
    pub reason: String,
    pub is_family: bool,
}

impl PairingDecision {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            is_family: false,
        }
    }
}

// ==========================================
// PairingEngine - 配对规则引擎
// ==========================================
#[derive(Debug, Clone, Copy)]
pub struct PairingEngine {
    adult_age: u32,
}

impl Default for PairingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ADULT_AGE)
    }
}

impl PairingEngine {
    /// # 参数
    /// - adult_age: 成年年龄阈值, 低于此年龄视为未成年; 不得低于 18
    pub fn new(adult_age: u32) -> Self {
        Self {
            adult_age: adult_age.max(DEFAULT_ADULT_AGE),
        }
    }

    pub fn adult_age(&self) -> u32 {
        self.adult_age
    }

    /// 判定两位学生能否配对
    ///
    /// # 步骤
    /// 0. 同一人: 拒绝
    /// 1. 任一停用: 拒绝
    /// 2. 任一未成年且性别不同: 拒绝
    /// 3. 同性: 允许 (is_family = false)
    /// 4. 异性: 直接关系 / 同一监护人 / 监护关系 任一成立则允许 (is_family = true)
    pub fn can_pair(&self, a: &Student, b: &Student, family: &FamilyIndex) -> PairingDecision {
        if a.student_id == b.student_id {
            return PairingDecision::deny("SELF_PAIR: 不能与本人配对");
        }

        if !a.active || !b.active {
            return PairingDecision::deny(format!(
                "INACTIVE: {} 已停用",
                if a.active { &b.student_id } else { &a.student_id }
            ));
        }

        let mixed_gender = a.gender != b.gender;

        if mixed_gender && (a.is_minor(self.adult_age) || b.is_minor(self.adult_age)) {
            return PairingDecision::deny(format!(
                "MINOR_MIXED_GENDER: 未满 {} 岁只能同性配对",
                self.adult_age
            ));
        }

        if !mixed_gender {
            return PairingDecision {
                allowed: true,
                reason: "SAME_GENDER: 同性配对".to_string(),
                is_family: false,
            };
        }

        match Self::family_relation(a, b, family) {
            Some(relation) => PairingDecision {
                allowed: true,
                reason: format!("FAMILY: 异性家庭配对 ({})", relation),
                is_family: true,
            },
            None => PairingDecision::deny("MIXED_GENDER_NO_FAMILY: 异性配对需要家庭关系"),
        }
    }

    /// 查找家庭关系（返回描述,仅用于原因输出）
    fn family_relation(a: &Student, b: &Student, family: &FamilyIndex) -> Option<String> {
        if let Some(kind) = family.relationship(&a.student_id, &b.student_id) {
            return Some(kind.to_string());
        }

        if let (Some(ga), Some(gb)) = (&a.guardian_id, &b.guardian_id) {
            if ga == gb {
                return Some("SHARED_GUARDIAN".to_string());
            }
        }

        if a.guardian_id.as_deref() == Some(b.student_id.as_str())
            || b.guardian_id.as_deref() == Some(a.student_id.as_str())
        {
            return Some("GUARDIAN_WARD".to_string());
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Gender, StudentRole};

    fn student(id: &str, gender: Gender, age: Option<u32>) -> Student {
        Student {
            student_id: id.to_string(),
            congregation_id: "C1".to_string(),
            display_name: id.to_string(),
            gender,
            role: StudentRole::BaptizedPublisher,
            age,
            active: true,
            guardian_id: None,
        }
    }

    fn link(a: &str, b: &str, kind: RelationshipKind) -> FamilyLink {
        FamilyLink {
            student_a: a.to_string(),
            student_b: b.to_string(),
            kind,
        }
    }

    #[test]
    fn test_pair_key_is_unordered() {
        assert_eq!(PairKey::new("a", "b"), PairKey::new("b", "a"));

        let index = FamilyIndex::from_links(vec![link("x", "y", RelationshipKind::Spouse)]);
        assert_eq!(index.relationship("y", "x"), Some(RelationshipKind::Spouse));
        assert_eq!(index.relationship("x", "z"), None);
    }

    #[test]
    fn test_same_gender_allowed_without_family() {
        let engine = PairingEngine::default();
        let a = student("A", Gender::Female, Some(30));
        let b = student("B", Gender::Female, Some(14));

        let decision = engine.can_pair(&a, &b, &FamilyIndex::default());
        assert!(decision.allowed);
        assert!(!decision.is_family);
    }

    #[test]
    fn test_mixed_gender_requires_family() {
        let engine = PairingEngine::default();
        let sister = student("F", Gender::Female, Some(40));
        let brother = student("M", Gender::Male, Some(42));

        let denied = engine.can_pair(&sister, &brother, &FamilyIndex::default());
        assert!(!denied.allowed);

        let family = FamilyIndex::from_links(vec![link("M", "F", RelationshipKind::Spouse)]);
        let allowed = engine.can_pair(&sister, &brother, &family);
        assert!(allowed.allowed);
        assert!(allowed.is_family);
    }

    #[test]
    fn test_minor_mixed_gender_denied_even_with_family() {
        let engine = PairingEngine::default();
        let mother = student("F", Gender::Female, Some(40));
        let son = student("M", Gender::Male, Some(12));
        let family = FamilyIndex::from_links(vec![link("F", "M", RelationshipKind::Parent)]);

        let decision = engine.can_pair(&mother, &son, &family);
        assert!(!decision.allowed);
        assert!(decision.reason.starts_with("MINOR_MIXED_GENDER"));
    }

    #[test]
    fn test_shared_guardian_and_guardian_ward_count_as_family() {
        let engine = PairingEngine::default();

        let mut sister = student("F", Gender::Female, Some(19));
        let mut brother = student("M", Gender::Male, Some(21));
        sister.guardian_id = Some("P".to_string());
        brother.guardian_id = Some("P".to_string());
        assert!(engine.can_pair(&sister, &brother, &FamilyIndex::default()).is_family);

        let guardian = student("G", Gender::Male, Some(50));
        let mut ward = student("W", Gender::Female, Some(20));
        ward.guardian_id = Some("G".to_string());
        let decision = engine.can_pair(&guardian, &ward, &FamilyIndex::default());
        assert!(decision.allowed);
        assert!(decision.is_family);
    }

    #[test]
    fn test_inactive_and_self_pair_denied() {
        let engine = PairingEngine::default();
        let a = student("A", Gender::Male, Some(30));
        let mut b = student("B", Gender::Male, Some(30));
        b.active = false;

        assert!(!engine.can_pair(&a, &b, &FamilyIndex::default()).allowed);
        assert!(!engine.can_pair(&a, &a, &FamilyIndex::default()).allowed);
    }

    #[test]
    fn test_adult_age_cannot_be_lowered_below_18() {
        let family = FamilyIndex::from_links(vec![link("F", "M", RelationshipKind::Parent)]);
        let mother = student("F", Gender::Female, Some(40));
        let son = student("M", Gender::Male, Some(12));
        let teen = student("T", Gender::Male, Some(17));

        for threshold in [0, 12, 16, 18] {
            let engine = PairingEngine::new(threshold);
            assert_eq!(engine.adult_age(), DEFAULT_ADULT_AGE);
            let decision = engine.can_pair(&mother, &son, &family);
            assert!(!decision.allowed, "threshold {}: {:?}", threshold, decision);
            assert!(teen.is_minor(engine.adult_age()));
        }

        assert_eq!(PairingEngine::new(21).adult_age(), 21);
    }

    #[test]
    fn test_mixed_gender_allowed_implies_family_for_all_ages() {
        let engine = PairingEngine::default();
        let family = FamilyIndex::from_links(vec![link("A", "B", RelationshipKind::Sibling)]);

        for age_a in [None, Some(10), Some(17), Some(18), Some(60)] {
            for age_b in [None, Some(9), Some(18), Some(35)] {
                let a = student("A", Gender::Male, age_a);
                let b = student("B", Gender::Female, age_b);
                let c = student("C", Gender::Female, age_b);

                let with_family = engine.can_pair(&a, &b, &family);
                let without_family = engine.can_pair(&a, &c, &family);

                assert!(!without_family.allowed);
                let any_minor = age_a.map_or(false, |x| x < 18) || age_b.map_or(false, |x| x < 18);
                assert_eq!(with_family.allowed, !any_minor);
                if with_family.allowed {
                    assert!(with_family.is_family);
                }
            }
        }
    }
}
