// ==========================================
// 分派流程端到端测试
// ==========================================
// 测试目标: AppState -> AssignmentApi -> 编排器 -> SQLite
// 覆盖: 生成写入 / 替换闸门 / 预览 / 回滚 / 权限 / 跨周公平轮换 / 删除
// ==========================================


use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use ministry_assign::api::ApiError;
use ministry_assign::app::AppState;
use ministry_assign::config::config_keys;
use ministry_assign::domain::types::Gender;
use ministry_assign::domain::{AssignmentRecord, Student};
use ministry_assign::engine::{GenerationRequest, SkipReason};
use ministry_assign::logging;
use ministry_assign::repository::AssignmentRepository;
use test_helpers::*;

fn setup() -> (tempfile::NamedTempFile, AppState) {
    logging::init_test();
    let (tmp, db_path) = create_test_db().unwrap();
    let conn = open_shared(&db_path).unwrap();
    seed_standard(&conn, "P1", week(2024, 3, 4)).unwrap();
    drop(conn);

    let state = AppState::new(db_path).unwrap();
    state
        .config_manager
        .set_global_config_value(config_keys::FAIRNESS_SEED, "42")
        .unwrap();
    (tmp, state)
}

fn assert_safe(records: &[AssignmentRecord], roster: &[Student]) {
    let by_id: HashMap<&str, &Student> =
        roster.iter().map(|s| (s.student_id.as_str(), s)).collect();
    let mut seen = HashSet::new();

    for record in records {
        for id in record.student_ids() {
            assert!(seen.insert(id.to_string()), "学生 {} 重复分派", id);
        }
        let Some(helper_id) = record.helper_id.as_deref() else {
            continue;
        };
        let principal = by_id[record.principal_id.as_str()];
        let helper = by_id[helper_id];
        if principal.gender != helper.gender {
            assert!(record.is_family_pair);
            assert!(!principal.is_minor(18) && !helper.is_minor(18));
        }
    }
}

#[tokio::test]
async fn test_generate_persists_safe_assignments() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    let report = api
        .generate(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();

    assert!(report.validation.valid, "{:?}", report.validation);
    assert_eq!(report.skipped_reason, None);
    let version = report.persisted.clone().unwrap();
    assert_eq!(version.version_no, 1);
    assert_eq!(version.record_count, report.outcome.records.len());
    assert!(version.config_snapshot_json.unwrap().contains("fairness_seed"));

    let current = api.list_current("P1").unwrap();
    assert_eq!(current, report.outcome.records);
    assert_safe(&current, &standard_roster());

    // 经文朗读只能是弟兄
    let reading = current.iter().find(|r| r.part_ordinal == 3).unwrap();
    let roster = standard_roster();
    let reader = roster
        .iter()
        .find(|s| s.student_id == reading.principal_id)
        .unwrap();
    assert_eq!(reader.gender, Gender::Male);

    let logs = api.list_action_logs("P1").unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action_type, "ASSIGNMENTS_GENERATED");
}

#[tokio::test]
async fn test_replace_gate_and_rollback() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    let first = api
        .generate(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();
    let first_set = first.persisted.unwrap();

    let kept = api
        .generate(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();
    assert!(kept.validation.valid);
    assert_eq!(kept.skipped_reason, Some(SkipReason::ExistingNotReplaced));
    assert!(kept.validation.existing_count > 0);
    assert!(kept
        .validation
        .warnings
        .iter()
        .any(|w| w.starts_with("EXISTING_ASSIGNMENTS")));
    assert_eq!(api.list_versions("P1").unwrap().len(), 1);

    let replaced = api
        .generate(
            GenerationRequest::new("P1", SCOPE, ACTOR)
                .replace_existing(true)
                .with_excluded(vec!["E1".to_string()]),
        )
        .await
        .unwrap();
    let second_set = replaced.persisted.unwrap();
    assert_eq!(second_set.version_no, 2);
    assert!(api
        .list_current("P1")
        .unwrap()
        .iter()
        .all(|r| r.student_ids().all(|id| id != "E1")));

    let restored = api
        .rollback("P1", &first_set.set_id, ACTOR, SCOPE)
        .unwrap();
    assert_eq!(restored.set_id, first_set.set_id);
    assert_eq!(api.list_current("P1").unwrap(), first.outcome.records);

    let logs = api.list_action_logs("P1").unwrap();
    assert_eq!(logs.len(), 3);
}

#[tokio::test]
async fn test_preview_is_deterministic_and_never_writes() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    let a = api
        .preview(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();
    let b = api
        .preview(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();

    assert_eq!(a.skipped_reason, Some(SkipReason::DryRun));
    assert_eq!(a.outcome, b.outcome);
    assert!(a.persisted.is_none());
    assert!(api.list_versions("P1").unwrap().is_empty());
    assert!(api.list_action_logs("P1").unwrap().is_empty());
}

#[tokio::test]
async fn test_unauthorized_actor_blocked() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    let report = api
        .generate(GenerationRequest::new("P1", SCOPE, "visitor"))
        .await
        .unwrap();
    assert!(!report.validation.valid);
    assert_eq!(report.validation.errors.len(), 1);
    assert!(report.validation.errors[0].starts_with("PERMISSION_DENIED"));
    assert_eq!(report.skipped_reason, Some(SkipReason::ValidationFailed));
    assert!(report.outcome.records.is_empty());
    assert!(api.list_versions("P1").unwrap().is_empty());

    let preview = api
        .preview(GenerationRequest::new("P1", SCOPE, "visitor"))
        .await
        .unwrap();
    assert!(preview.outcome.records.is_empty());
    assert!(preview.outcome.unfilled.is_empty());
    assert!(preview.validation.errors[0].starts_with("PERMISSION_DENIED"));

    assert!(matches!(
        api.delete_program("P1", "visitor", SCOPE),
        Err(ApiError::PermissionDenied(_))
    ));
    assert!(matches!(
        api.rollback("P1", "any", ACTOR, "C2"),
        Err(ApiError::PermissionDenied(_))
    ));
}

#[tokio::test]
async fn test_invalid_requests_rejected() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    assert!(matches!(
        api.generate(GenerationRequest::new("", SCOPE, ACTOR)).await,
        Err(ApiError::InvalidInput(_))
    ));
    assert!(matches!(
        api.generate(GenerationRequest::new("NOPE", SCOPE, ACTOR)).await,
        Err(ApiError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_fairness_rotates_across_weeks() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    api.generate(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();

    state
        .program_repo
        .create(&program("P2", SCOPE, week(2024, 3, 11)), &standard_parts())
        .unwrap();
    let next = api
        .generate(GenerationRequest::new("P2", SCOPE, ACTOR))
        .await
        .unwrap();
    assert!(next.persisted.is_some());

    // 开场祷告最先处理: 主讲必是合格弟兄中近期分派最少者
    let conn = Arc::new(Mutex::new(
        ministry_assign::db::open_sqlite_connection(&state.db_path).unwrap(),
    ));
    let history = AssignmentRepository::new(conn.clone())
        .aggregate_history(SCOPE, week(2024, 1, 15), week(2024, 3, 11))
        .unwrap();
    let count = |id: &str| {
        history
            .iter()
            .find(|h| h.student_id == id)
            .map(|h| h.assignment_count)
            .unwrap_or(0)
    };

    let prayer = next
        .outcome
        .records
        .iter()
        .find(|r| r.part_ordinal == 1)
        .unwrap();
    let min = ["E1", "E2", "MS1", "B1"]
        .into_iter()
        .map(|id| count(id))
        .min()
        .unwrap();
    assert_eq!(count(prayer.principal_id.as_str()), min);

    // 主讲与助手各计一次
    let own_week = AssignmentRepository::new(conn)
        .aggregate_history(SCOPE, week(2024, 3, 11), week(2024, 3, 18))
        .unwrap();
    assert_eq!(
        own_week.iter().map(|h| h.assignment_count).sum::<u32>() as usize,
        next.outcome.records.iter().map(|r| r.student_ids().count()).sum::<usize>()
    );
}

#[tokio::test]
async fn test_delete_program_removes_versions() {
    let (_tmp, state) = setup();
    let api = &state.assignment_api;

    api.generate(GenerationRequest::new("P1", SCOPE, ACTOR))
        .await
        .unwrap();
    assert_eq!(api.list_versions("P1").unwrap().len(), 1);

    api.delete_program("P1", ACTOR, SCOPE).unwrap();
    assert!(api.list_versions("P1").unwrap().is_empty());
    assert!(api.list_current("P1").unwrap().is_empty());
    assert!(matches!(
        api.delete_program("P1", ACTOR, SCOPE),
        Err(ApiError::NotFound(_))
    ));
}
