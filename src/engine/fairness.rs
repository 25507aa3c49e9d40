// ==========================================
// 学生作业分派引擎 - 公平轮换评分
// ==========================================
// 职责: 历史分派次数 -> 优先级分数 (越小越优先)
// 红线: 只作为排序键, 不作为硬过滤条件
// 红线: 抖动 < 1, 窗口内零分派者永远排在有分派者之前
// ==========================================

use crate::config::config_manager::MAX_FAIRNESS_JITTER;
use crate::domain::assignment::HistoryRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::collections::HashMap;

// ==========================================
// FairnessScorer - 公平轮换评分器
// ==========================================
// 每次生成独立构建, 抖动在构建时一次性抽取 (运行内排序稳定)
#[derive(Debug, Clone)]
pub struct FairnessScorer {
    counts: HashMap<String, u32>,
    jitter: HashMap<String, f64>,
}

impl FairnessScorer {
    /// 构建评分器
    ///
    /// # 参数
    /// - `history`: 窗口内历史统计
    /// - `student_ids`: 需要评分的学生（通常为在册名册）
    /// - `jitter_max`: 抖动上限, 会被裁剪到 [0, 0.1]
    /// - `rng`: 随机源
    pub fn new<'h, 's, R: Rng>(
        history: impl IntoIterator<Item = &'h HistoryRecord>,
        student_ids: impl IntoIterator<Item = &'s str>,
        jitter_max: f64,
        rng: &mut R,
    ) -> Self {
        let counts: HashMap<String, u32> = history
            .into_iter()
            .map(|h| (h.student_id.clone(), h.assignment_count))
            .collect();

        let jitter_max = if jitter_max.is_finite() {
            jitter_max.clamp(0.0, MAX_FAIRNESS_JITTER)
        } else {
            0.0
        };

        let jitter = student_ids
            .into_iter()
            .map(|id| {
                let j = if jitter_max > 0.0 {
                    rng.gen_range(0.0..jitter_max)
                } else {
                    0.0
                };
                (id.to_string(), j)
            })
            .collect();

        Self { counts, jitter }
    }

    /// 使用固定种子或系统熵构建
    pub fn with_seed<'h, 's>(
        history: impl IntoIterator<Item = &'h HistoryRecord>,
        student_ids: impl IntoIterator<Item = &'s str>,
        jitter_max: f64,
        seed: Option<u64>,
    ) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(history, student_ids, jitter_max, &mut rng)
    }

    /// 窗口内分派次数
    pub fn recent_count(&self, student_id: &str) -> u32 {
        self.counts.get(student_id).copied().unwrap_or(0)
    }

    /// 优先级分数 = 分派次数 + 抖动
    pub fn priority(&self, student_id: &str) -> f64 {
        self.recent_count(student_id) as f64 + self.jitter.get(student_id).copied().unwrap_or(0.0)
    }

    /// 比较两位学生的优先级 (Less 表示 a 优先)
    ///
    /// 分数相同时按学生ID排序, 保证确定性
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.priority(a)
            .total_cmp(&self.priority(b))
            .then_with(|| a.cmp(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(id: &str, count: u32) -> HistoryRecord {
        HistoryRecord {
            student_id: id.to_string(),
            assignment_count: count,
            last_assigned: None,
        }
    }

    #[test]
    fn test_zero_count_always_ahead_regardless_of_jitter() {
        let records = vec![history("B", 1), history("C", 3)];
        for seed in 0..200 {
            let scorer = FairnessScorer::with_seed(&records, ["A", "B", "C"], 0.1, Some(seed));
            assert!(scorer.priority("A") < 1.0);
            assert_eq!(scorer.compare("A", "B"), Ordering::Less);
            assert_eq!(scorer.compare("B", "C"), Ordering::Less);
        }
    }

    #[test]
    fn test_jitter_is_clamped() {
        let records: Vec<HistoryRecord> = vec![];
        let scorer = FairnessScorer::with_seed(&records, ["A", "B"], 5.0, Some(7));
        assert!(scorer.priority("A") < MAX_FAIRNESS_JITTER);
        assert!(scorer.priority("B") < MAX_FAIRNESS_JITTER);

        let flat = FairnessScorer::with_seed(&records, ["A", "B"], 0.0, Some(7));
        assert_eq!(flat.priority("A"), 0.0);
        assert_eq!(flat.compare("A", "B"), Ordering::Less);
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let records = vec![history("A", 2)];
        let first = FairnessScorer::with_seed(&records, ["A", "B", "C"], 0.1, Some(99));
        let second = FairnessScorer::with_seed(&records, ["A", "B", "C"], 0.1, Some(99));

        for id in ["A", "B", "C"] {
            assert_eq!(first.priority(id), second.priority(id));
        }
        assert_eq!(first.recent_count("A"), 2);
        assert_eq!(first.recent_count("unknown"), 0);
    }
}
