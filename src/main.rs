//! Agora - 多模型辩论 / 结论编排引擎
//!
//! 入口：`agora <session.toml> [--manual] [--config <file>] [--summary-model <model>]`
//! 加载会话文件并运行到结束：默认自动推进；`--manual` 时从 stdin 逐步推进。
//! 发言随事件实时输出，结束后打印 Markdown 转录。

use std::path::PathBuf;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use agora::core::{create_scheduler, spawn_controller, Command, SchedulerEvent, SchedulerPhase};
use agora::session::{Mode, SessionPlan};

const USAGE: &str = "usage: agora <session.toml> [--manual] [--config <file>] [--summary-model <model>]";

#[derive(Debug, Default)]
struct CliArgs {
    plan: PathBuf,
    manual: bool,
    config: Option<PathBuf>,
    summary_model: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut parsed = CliArgs::default();
    let mut plan = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--manual" => parsed.manual = true,
            "--config" => {
                let path = args.next().context("--config needs a file path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            "--summary-model" => {
                parsed.summary_model = Some(args.next().context("--summary-model needs a model id")?);
            }
            "-h" | "--help" => bail!(USAGE),
            other if other.starts_with("--") => bail!("unknown option {other}\n{USAGE}"),
            other => plan = Some(PathBuf::from(other)),
        }
    }
    parsed.plan = plan.context(USAGE)?;
    Ok(parsed)
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::TurnAppended { turn, .. } => {
            println!("\n{} ({}):\n{}", turn.participant, turn.role_label, turn.content);
        }
        SchedulerEvent::Concluded { model, artifact } => {
            println!("\n=== Final conclusion ({model}) ===\n{artifact}");
        }
        SchedulerEvent::Retrying { attempt, error } => {
            eprintln!("[retry {attempt}] {error}");
        }
        SchedulerEvent::Failed { error } => eprintln!("[error] {error}"),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agora::observability::init();

    let args = parse_args(std::env::args().skip(1))?;
    let plan = SessionPlan::from_file(&args.plan).context("Failed to load session plan")?;
    let mode = plan.mode;
    let setup = plan.into_setup().validate().context("Invalid session plan")?;

    let (scheduler, _cfg) = create_scheduler(args.config.clone());
    let mut events = scheduler.subscribe();
    let session_id = scheduler.activate(setup).await;
    tracing::info!(session_id = %session_id, "session ready");

    let (cmd_tx, controller) = spawn_controller(scheduler.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if args.manual {
        eprintln!("Enter: step · a: start auto · s: stop auto · q: quit");
    } else {
        cmd_tx.send(Command::StartAuto)?;
    }

    let mut halted = None;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_event(&event);
                    match event {
                        SchedulerEvent::PhaseChanged { phase: SchedulerPhase::Finished } => break,
                        SchedulerEvent::Failed { error } if !args.manual => {
                            halted = Some(error);
                            break;
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!("skipped {} events", n),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if args.manual => match line? {
                Some(line) => match line.trim() {
                    "" | "n" => cmd_tx.send(Command::Step)?,
                    "a" => cmd_tx.send(Command::StartAuto)?,
                    "s" => cmd_tx.send(Command::StopAuto)?,
                    "q" => break,
                    other => eprintln!("unknown command: {other}"),
                },
                None => break,
            },
        }
    }

    if mode == Mode::Debate && halted.is_none() {
        if let Some(model) = &args.summary_model {
            match scheduler.summarize_debate(model).await {
                Ok(summary) => println!("\n=== Summary ({model}) ===\n{summary}"),
                Err(e) => eprintln!("[error] summary failed: {}", e.display_message()),
            }
        }
    }

    cmd_tx.send(Command::Quit)?;
    controller.await.context("Controller task failed")?;

    println!("\n{}", scheduler.view().await.to_markdown());

    if let Some(error) = halted {
        bail!("session halted: {error}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn test_parse_args() {
        let parsed = parse_args(args(&["plan.toml", "--manual", "--config", "c.toml"])).unwrap();
        assert_eq!(parsed.plan, PathBuf::from("plan.toml"));
        assert!(parsed.manual);
        assert_eq!(parsed.config, Some(PathBuf::from("c.toml")));
        assert!(parsed.summary_model.is_none());
    }

    #[test]
    fn test_parse_args_requires_plan() {
        assert!(parse_args(args(&["--manual"])).is_err());
        assert!(parse_args(args(&["plan.toml", "--bogus"])).is_err());
    }
}
