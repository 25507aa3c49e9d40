// Dev utility: seed a demo congregation (roster, family links, permission, weekly programs).
//
// Usage:
//   cargo run --bin seed_demo_congregation -- [db_path] [weeks]
//
// Re-running is safe: students are upserted, existing programs and links are skipped.

use chrono::{Datelike, Duration, Local, NaiveDate};
use std::error::Error;

use ministry_assign::app::{get_default_db_path, AppState};
use ministry_assign::config::config_keys;
use ministry_assign::domain::{FamilyLink, PartDefinition, Program, Student};
use ministry_assign::domain::types::{Gender, PartType, RelationshipKind, StudentRole};
use ministry_assign::logging;
use ministry_assign::repository::{RepositoryError, GENERATE_ASSIGNMENTS};

const CONGREGATION_ID: &str = "C-DEMO";
const DEMO_ACTOR: &str = "elder-demo";
const DEFAULT_WEEKS: i64 = 4;

fn student(
    id: &str,
    name: &str,
    gender: Gender,
    role: StudentRole,
    age: Option<u32>,
    guardian_id: Option<&str>,
) -> Student {
    Student {
        student_id: id.to_string(),
        congregation_id: CONGREGATION_ID.to_string(),
        display_name: name.to_string(),
        gender,
        role,
        age,
        active: true,
        guardian_id: guardian_id.map(str::to_string),
    }
}

fn demo_roster() -> Vec<Student> {
    use Gender::{Female, Male};
    use StudentRole::*;

    vec![
        student("S001", "王建国", Male, Elder, Some(58), None),
        student("S002", "李明", Male, Elder, Some(47), None),
        student("S003", "张伟", Male, MinisterialServant, Some(35), None),
        student("S004", "刘洋", Male, MinisterialServant, Some(29), None),
        student("S005", "陈志强", Male, RegularPioneer, Some(26), None),
        student("S006", "杨帆", Male, BaptizedPublisher, Some(33), None),
        student("S007", "赵磊", Male, UnbaptizedPublisher, Some(16), Some("S002")),
        student("S008", "王丽", Female, RegularPioneer, Some(55), None),
        student("S009", "李娜", Female, BaptizedPublisher, Some(45), None),
        student("S010", "张敏", Female, BaptizedPublisher, Some(34), None),
        student("S011", "刘芳", Female, RegularPioneer, Some(28), None),
        student("S012", "陈静", Female, BaptizedPublisher, Some(40), None),
        student("S013", "杨雪", Female, UnbaptizedPublisher, Some(14), Some("S002")),
        student("S014", "赵婷", Female, NewStudent, None, None),
        student("S015", "周杰", Male, NewStudent, None, None),
        student("S016", "吴霞", Female, BaptizedPublisher, Some(62), None),
    ]
}

fn demo_links() -> Vec<FamilyLink> {
    let link = |a: &str, b: &str, kind| FamilyLink {
        student_a: a.to_string(),
        student_b: b.to_string(),
        kind,
    };

    vec![
        link("S001", "S008", RelationshipKind::Spouse),
        link("S002", "S009", RelationshipKind::Spouse),
        link("S003", "S010", RelationshipKind::Spouse),
        link("S002", "S007", RelationshipKind::Parent),
        link("S002", "S013", RelationshipKind::Parent),
        link("S007", "S013", RelationshipKind::Sibling),
    ]
}

fn week_parts() -> Vec<PartDefinition> {
    let part = |ordinal, part_type, title: &str, minutes, scene: Option<&str>| PartDefinition {
        ordinal,
        part_type,
        title: title.to_string(),
        duration_minutes: minutes,
        scene: scene.map(str::to_string),
    };

    vec![
        part(1, PartType::OpeningComments, "开场白", 1, None),
        part(2, PartType::Treasures, "上帝话语的宝藏", 10, None),
        part(3, PartType::SpiritualGems, "挖掘属灵宝石", 10, None),
        part(4, PartType::BibleReading, "经文朗读", 4, None),
        part(5, PartType::StartingConversation, "开始交谈", 3, Some("挨家挨户")),
        part(6, PartType::FollowingUp, "续访", 4, Some("非正式见证")),
        part(7, PartType::MakingDisciples, "培养门徒", 5, None),
        part(8, PartType::ChristianLifeTalk, "基督徒生活", 15, None),
        part(9, PartType::CongregationBibleStudy, "会众研经班", 30, None),
        part(10, PartType::ClosingComments, "结束语", 3, None),
        part(11, PartType::ClosingPrayer, "结束祷告", 1, None),
    ]
}

fn next_monday(today: NaiveDate) -> NaiveDate {
    let offset = (7 - today.weekday().num_days_from_monday()) % 7;
    today + Duration::days(i64::from(offset))
}

fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    logging::init();

    let db_path = std::env::args().nth(1).unwrap_or_else(get_default_db_path);
    let weeks = std::env::args()
        .nth(2)
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_WEEKS)
        .clamp(1, 52);

    let state = AppState::new(db_path.clone())?;

    // Roster
    let roster = demo_roster();
    let upserted = state.student_repo.batch_upsert(&roster)?;

    // Family links
    let mut linked = 0;
    for link in demo_links() {
        match state.family_link_repo.insert(&link) {
            Ok(()) => linked += 1,
            Err(RepositoryError::UniqueConstraintViolation(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    // Permission + config
    state
        .permission_repo
        .grant(DEMO_ACTOR, CONGREGATION_ID, GENERATE_ASSIGNMENTS)?;
    state
        .config_manager
        .set_global_config_value(config_keys::FAIRNESS_WINDOW_WEEKS, "8")?;
    state
        .config_manager
        .set_global_config_value(config_keys::FAIRNESS_JITTER_MAX, "0.1")?;

    // Programs
    let first_week = next_monday(Local::now().date_naive());
    let mut created = Vec::new();
    for i in 0..weeks {
        let week_start = first_week + Duration::weeks(i);
        let program_id = format!("PRG-{}", week_start.format("%Y-%m-%d"));
        if state.program_repo.find_by_id(&program_id)?.is_some() {
            continue;
        }

        let program = Program {
            program_id: program_id.clone(),
            congregation_id: CONGREGATION_ID.to_string(),
            week_start,
            title: format!("{} 周聚会", week_start.format("%Y-%m-%d")),
        };
        state.program_repo.create(&program, &week_parts())?;
        created.push(program_id);
    }

    println!("db_path={}", db_path);
    println!("congregation={} actor={}", CONGREGATION_ID, DEMO_ACTOR);
    println!("students={} family_links_added={}", upserted, linked);
    for program_id in created {
        println!("program={}", program_id);
    }
    Ok(())
}
