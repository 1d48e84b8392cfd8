//! 引擎编排器：主控循环
//!
//! 后台任务独占 AttentiveEngine，按提交顺序逐条消费命令（Plan/Reset/SetStatus/Shutdown），
//! 同一时刻至多一个决策在进行。中断不经过命令队列，直接取消当前决策。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::{load_config, AppConfig};
use crate::core::{EngineBuilder, SupportError};
use crate::llm::{LlmClient, OpenAiClient};
use crate::react::{AttentiveEngine, DecisionOutcome, InterruptHandle};
use crate::scene::SharedScene;

/// 发往引擎任务的命令
#[derive(Debug)]
pub enum Command {
    /// 处理一条话语，完成后回复决策结果
    Plan {
        utterance: String,
        reply: oneshot::Sender<DecisionOutcome>,
    },
    /// 清空会话并恢复初始场景
    Reset { reply: oneshot::Sender<()> },
    /// 设置某人/机器人的忙碌状态
    SetStatus {
        agent: String,
        busy: bool,
        reason: Option<String>,
        reply: oneshot::Sender<Result<(), SupportError>>,
    },
    /// 停止引擎任务；已排队的命令被丢弃
    Shutdown,
}

/// 根据配置与环境变量选择推理服务后端（OpenAI 兼容 / 离线 Mock）
pub(crate) fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => {
            tracing::info!(provider = %cfg.llm.provider, model = %cfg.llm.model, "using OpenAI-compatible LLM");
            Arc::new(
                OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, Some(&key))
                    .with_temperature(cfg.llm.temperature)
                    .with_request_timeout(Duration::from_secs(cfg.llm.timeouts.request)),
            )
        }
        _ => {
            tracing::warn!("No API key set, using Mock LLM");
            Arc::new(crate::llm::MockLlmClient)
        }
    }
}

/// 引擎前端：可克隆，可在多个任务中使用
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    interrupt: InterruptHandle,
    scene: SharedScene,
    last_outcome: watch::Receiver<Option<DecisionOutcome>>,
}

impl EngineHandle {
    /// 在后台任务中运行引擎
    pub fn spawn(mut engine: AttentiveEngine) -> Self {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (outcome_tx, last_outcome) = watch::channel(None);
        let interrupt = engine.interrupt_handle();
        let scene = engine.scene();

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    Command::Plan { utterance, reply } => {
                        let outcome = engine.plan(&utterance).await;
                        let _ = outcome_tx.send(Some(outcome.clone()));
                        let _ = reply.send(outcome);
                    }
                    Command::Reset { reply } => {
                        engine.reset().await;
                        let _ = reply.send(());
                    }
                    Command::SetStatus {
                        agent,
                        busy,
                        reason,
                        reply,
                    } => {
                        let result = engine.set_agent_status(&agent, busy, reason).await;
                        let _ = reply.send(result);
                    }
                    Command::Shutdown => break,
                }
            }
            engine.interrupt_handle().interrupt();
            tracing::info!("engine task stopped");
        });

        Self {
            cmd_tx,
            interrupt,
            scene,
            last_outcome,
        }
    }

    fn send(&self, cmd: Command) -> Result<(), SupportError> {
        // 引擎任务已退出：请求按取消处理
        self.cmd_tx.send(cmd).map_err(|_| SupportError::Cancelled)
    }

    /// 排队一条话语，立即返回结果接收端
    pub fn submit(&self, utterance: impl Into<String>) -> Result<oneshot::Receiver<DecisionOutcome>, SupportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Plan {
            utterance: utterance.into(),
            reply,
        })?;
        Ok(rx)
    }

    /// 排队并等待决策完成
    pub async fn plan(&self, utterance: impl Into<String>) -> Result<DecisionOutcome, SupportError> {
        self.submit(utterance)?.await.map_err(|_| SupportError::Cancelled)
    }

    pub async fn reset(&self) -> Result<(), SupportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply })?;
        rx.await.map_err(|_| SupportError::Cancelled)
    }

    pub async fn set_status(&self, agent: &str, busy: bool, reason: Option<String>) -> Result<(), SupportError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SetStatus {
            agent: agent.to_string(),
            busy,
            reason,
            reply,
        })?;
        rx.await.map_err(|_| SupportError::Cancelled)?
    }

    /// 取消正在进行的决策；排队中的话语不受影响。返回是否确有决策被中断
    pub fn interrupt(&self) -> bool {
        let active = self.interrupt.interrupt();
        tracing::info!(active, "interrupt requested");
        active
    }

    pub fn is_deciding(&self) -> bool {
        self.interrupt.is_deciding()
    }

    pub fn scene(&self) -> SharedScene {
        self.scene.clone()
    }

    /// 最近一次完成的决策
    pub fn last_outcome(&self) -> watch::Receiver<Option<DecisionOutcome>> {
        self.last_outcome.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

/// 加载配置、构建引擎并在后台运行；配置加载失败时回退到默认值
pub fn create_engine(config_path: Option<PathBuf>) -> anyhow::Result<EngineHandle> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let engine = EngineBuilder::new(cfg).build()?;
    Ok(EngineHandle::spawn(engine))
}
