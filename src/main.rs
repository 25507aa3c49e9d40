// ==========================================
// 学生作业分派引擎 - 命令行入口
// ==========================================
// 用法:
//   ministry-assign [db_path] <program_id> <actor_id> [--replace] [--dry-run] [--exclude=ID,ID]
//
// 会众 scope 取自节目单所属会众; 结果以 JSON 输出到 stdout, 日志输出到 stderr
// ==========================================

use anyhow::{bail, Context};
use ministry_assign::app::{get_default_db_path, AppState};
use ministry_assign::engine::GenerationRequest;
use ministry_assign::logging;

struct CliArgs {
    db_path: String,
    program_id: String,
    actor_id: String,
    replace: bool,
    dry_run: bool,
    excluded: Vec<String>,
}

fn parse_args(args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut positional = Vec::new();
    let mut replace = false;
    let mut dry_run = false;
    let mut excluded = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--replace" => replace = true,
            "--dry-run" => dry_run = true,
            other if other.starts_with("--exclude=") => {
                excluded.extend(
                    other["--exclude=".len()..]
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                );
            }
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            _ => positional.push(arg),
        }
    }

    let (db_path, program_id, actor_id) = match positional.len() {
        2 => (get_default_db_path(), positional.remove(0), positional.remove(0)),
        3 => (
            positional.remove(0),
            positional.remove(0),
            positional.remove(0),
        ),
        _ => bail!(
            "用法: ministry-assign [db_path] <program_id> <actor_id> [--replace] [--dry-run] [--exclude=ID,ID]"
        ),
    };

    Ok(CliArgs {
        db_path,
        program_id,
        actor_id,
        replace,
        dry_run,
        excluded,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;
    tracing::info!(
        "{} v{} 使用数据库: {}",
        ministry_assign::APP_NAME,
        ministry_assign::VERSION,
        args.db_path
    );

    let state = AppState::new(args.db_path.clone()).map_err(anyhow::Error::msg)?;

    let program = state
        .program_repo
        .find_by_id(&args.program_id)?
        .with_context(|| format!("节目单不存在: {}", args.program_id))?;

    let request = GenerationRequest::new(&args.program_id, &program.congregation_id, &args.actor_id)
        .with_excluded(args.excluded)
        .replace_existing(args.replace)
        .dry_run(args.dry_run);

    let report = state.assignment_api.generate(request).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.validation.valid {
        std::process::exit(2);
    }
    Ok(())
}
