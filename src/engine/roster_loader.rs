// ==========================================
// 学生作业分派引擎 - 名册快照加载
// ==========================================
// 职责: 一次性加载 名册 -> 历史 -> 家庭关系, 形成本次运行的只读快照
// 红线: 任一提供者失败则整次运行中止, 不做部分生成
// ==========================================

use crate::domain::assignment::HistoryRecord;
use crate::domain::student::{FamilyLink, Student};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::pairing::FamilyIndex;
use crate::engine::repositories::AssignmentProviders;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use tracing::debug;

// ==========================================
// RosterSnapshot - 单次运行的名册快照
// ==========================================
#[derive(Debug, Clone)]
pub struct RosterSnapshot {
    students: Vec<Student>, // 在册学生, 按ID升序
    by_id: HashMap<String, usize>,
    history: Vec<HistoryRecord>,
    family: FamilyIndex,
    window_start: NaiveDate,
}

impl RosterSnapshot {
    pub fn new(
        mut students: Vec<Student>,
        history: Vec<HistoryRecord>,
        links: Vec<FamilyLink>,
        window_start: NaiveDate,
    ) -> Self {
        students.retain(|s| s.active);
        students.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        students.dedup_by(|a, b| a.student_id == b.student_id);

        let by_id = students
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.student_id.clone(), idx))
            .collect();

        Self {
            students,
            by_id,
            history,
            family: FamilyIndex::from_links(links),
            window_start,
        }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.by_id.get(student_id).map(|&idx| &self.students[idx])
    }

    pub fn history(&self) -> &[HistoryRecord] {
        &self.history
    }

    pub fn family(&self) -> &FamilyIndex {
        &self.family
    }

    pub fn window_start(&self) -> NaiveDate {
        self.window_start
    }

    pub fn student_ids(&self) -> impl Iterator<Item = &str> {
        self.students.iter().map(|s| s.student_id.as_str())
    }
}

// ==========================================
// RosterLoader - 快照加载器
// ==========================================
pub struct RosterLoader {
    providers: AssignmentProviders,
}

impl RosterLoader {
    pub fn new(providers: AssignmentProviders) -> Self {
        Self { providers }
    }

    /// 历史窗口: [week_start - N 周, week_start)
    ///
    /// 目标周本身不计入, 重新生成同一周时分数不受旧分派影响
    pub fn history_window(week_start: NaiveDate, window_weeks: u32) -> NaiveDate {
        week_start - Duration::weeks(i64::from(window_weeks))
    }

    /// 按固定顺序加载快照
    pub async fn load(
        &self,
        scope: &str,
        week_start: NaiveDate,
        window_weeks: u32,
    ) -> EngineResult<RosterSnapshot> {
        let students = self
            .providers
            .roster
            .list_active_students(scope)
            .await
            .map_err(|e| EngineError::upstream("roster", e))?;

        let window_start = Self::history_window(week_start, window_weeks);
        let history = self
            .providers
            .history
            .list_assignment_history(scope, window_start, week_start)
            .await
            .map_err(|e| EngineError::upstream("history", e))?;

        let links = self
            .providers
            .family
            .list_family_links(scope)
            .await
            .map_err(|e| EngineError::upstream("family", e))?;

        debug!(
            scope = %scope,
            students = students.len(),
            history = history.len(),
            family_links = links.len(),
            window_start = %window_start,
            "名册快照加载完成"
        );

        Ok(RosterSnapshot::new(students, history, links, window_start))
    }
}
