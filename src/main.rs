//! attentive-support：情境辅助机器人交互终端
//!
//! 入口：初始化日志、创建引擎，逐行读取标准输入。普通行是话语（`Felix -> Daniel: ...`），
//! 以 `/` 开头的是控制命令。决策在后台进行，因此 `/stop` 能中断正在执行的动作。

use std::path::PathBuf;

use anyhow::Context;
use attentive_support::core::{create_engine, EngineHandle};
use attentive_support::observability;
use attentive_support::react::{DecisionOutcome, DecisionStatus, InterventionDecision};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "Commands: /reset, /busy <agent> <reason>, /idle <agent>, /stop, /scene, /quit. \
Anything else is an utterance, e.g. `Felix -> Daniel: Can you pass me the red glass?`";

fn print_outcome(outcome: &DecisionOutcome) {
    println!("[{}] {} ({} rounds)", outcome.status.label(), outcome.utterance, outcome.rounds);
    match &outcome.decision {
        InterventionDecision::NoAction { remark } => {
            println!("  no action{}", remark.as_deref().map(|r| format!(": {r}")).unwrap_or_default());
        }
        InterventionDecision::Answer { text } => println!("  said: {text}"),
        InterventionDecision::Act { calls } => {
            for call in calls {
                println!("  did: {}", call.signature());
            }
        }
    }
    if let Some(reason) = match &outcome.status {
        DecisionStatus::Aborted(r) | DecisionStatus::TimedOut(r) | DecisionStatus::CouldNotDecide(r) => Some(r),
        _ => None,
    } {
        println!("  reason: {reason}");
    }
}

fn spawn_plan(handle: &EngineHandle, line: String) -> anyhow::Result<()> {
    let rx = handle.submit(line).context("engine is not running")?;
    tokio::spawn(async move {
        if let Ok(outcome) = rx.await {
            print_outcome(&outcome);
        }
    });
    Ok(())
}

fn spawn_status(handle: &EngineHandle, agent: String, busy: bool, reason: Option<String>) {
    let handle = handle.clone();
    tokio::spawn(async move {
        match handle.set_status(&agent, busy, reason).await {
            Ok(()) => println!("{agent} is now {}.", if busy { "busy" } else { "idle" }),
            Err(e) => println!("cannot change {agent}: {e}"),
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let handle = create_engine(config_path).context("Failed to create engine")?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut words = line.split_whitespace();
        match words.next() {
            Some("/quit") => break,
            Some("/stop") => {
                if !handle.interrupt() {
                    println!("Nothing to stop.");
                }
            }
            Some("/reset") => {
                let handle = handle.clone();
                tokio::spawn(async move {
                    if handle.reset().await.is_ok() {
                        println!("Scene and conversation reset.");
                    }
                });
            }
            Some("/scene") => {
                let scene = handle.scene();
                let summary = scene.read().await.summary();
                println!("{summary}");
            }
            Some("/busy") => match words.next() {
                Some(agent) => {
                    let reason: Vec<&str> = words.collect();
                    let reason = (!reason.is_empty()).then(|| reason.join(" "));
                    spawn_status(&handle, agent.to_string(), true, reason);
                }
                None => println!("usage: /busy <agent> <reason>"),
            },
            Some("/idle") => match words.next() {
                Some(agent) => spawn_status(&handle, agent.to_string(), false, None),
                None => println!("usage: /idle <agent>"),
            },
            Some(cmd) if cmd.starts_with('/') => println!("{HELP}"),
            _ => spawn_plan(&handle, line.to_string())?,
        }
    }

    handle.interrupt();
    handle.shutdown();
    Ok(())
}
