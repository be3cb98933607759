// ==========================================
// 班级学生档案 - 命令行入口
// ==========================================
// 用法:
//   class-master preview <roster|grades> <csv> [db_path] [--upsert] [--semester <学期>]
//   class-master confirm <roster|grades> <csv> [db_path] [--upsert] [--semester <学期>]
//
// 结果以 JSON 输出到 stdout，日志输出到 stderr
// ==========================================

use anyhow::{Context, Result};
use class_master::app::{get_default_db_path, AppState};
use class_master::domain::SheetKind;

const USAGE: &str =
    "用法: class-master <preview|confirm> <roster|grades> <csv> [db_path] [--upsert] [--semester <学期>]";

#[derive(Debug)]
struct CliArgs {
    command: String,
    kind: SheetKind,
    csv_path: String,
    db_path: String,
    full_reset: Option<bool>,
    semester: Option<String>,
}

fn parse_args(args: impl Iterator<Item = String>) -> std::result::Result<CliArgs, String> {
    let mut positional = Vec::new();
    let mut full_reset = None;
    let mut semester = None;

    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--upsert" => full_reset = Some(false),
            "--reset" => full_reset = Some(true),
            "--semester" => {
                semester = Some(args.next().ok_or("--semester 缺少参数")?);
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = positional.next().ok_or(USAGE)?;
    if command != "preview" && command != "confirm" {
        return Err(format!("未知命令: {}\n{}", command, USAGE));
    }
    let kind = match positional.next().as_deref() {
        Some("roster") => SheetKind::Roster,
        Some("grades") => SheetKind::Grades,
        Some(other) => return Err(format!("未知表格类型: {}\n{}", other, USAGE)),
        None => return Err(USAGE.to_string()),
    };
    let csv_path = positional.next().ok_or(USAGE)?;
    let db_path = positional.next().unwrap_or_else(get_default_db_path);

    Ok(CliArgs {
        command,
        kind,
        csv_path,
        db_path,
        full_reset,
        semester,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    class_master::logging::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    tracing::info!(
        "{} v{} - 数据库: {}",
        class_master::APP_NAME,
        class_master::VERSION,
        args.db_path
    );
    let state = AppState::new(args.db_path.clone())
        .await
        .with_context(|| format!("打开数据库失败: {}", args.db_path))?;
    let api = &state.import_api;

    let preview = api
        .preview_csv_file(&args.csv_path, args.kind, args.full_reset, args.semester.clone())
        .await
        .with_context(|| format!("预览失败: {}", args.csv_path))?;

    if args.command == "preview" {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    let source_ref = preview
        .report
        .source_ref
        .clone()
        .context("预览未返回 source_ref")?;
    let confirm = api
        .confirm_staged(&source_ref)
        .await
        .context("确认导入失败")?;
    println!("{}", serde_json::to_string_pretty(&confirm)?);
    Ok(())
}
