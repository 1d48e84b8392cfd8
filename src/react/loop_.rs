//! 规划主循环（Attentive-Support Engine）
//!
//! 每条话语：Received -> Deciding（推理桥）-> Answering，或 Resolving（注册表校验）-> Executing（按提议顺序逐个执行）
//! -> 结果回灌 -> 下一轮 Deciding；推理轮数有上限，超出即 TimedOut。
//! 中断时停止在途动作、不再执行剩余调用，按配置放下手中物体并回到默认姿态，并在对话中记下这次中断。
//! 循环本身从不返回错误：所有失败都落在 DecisionOutcome.status 中。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{DecisionPhase, PhaseTrace, RecoveryAction, RecoveryEngine, SessionSupervisor, SupportError};
use crate::dispatch::{ActionExecutor, ExecutionDispatcher, PhysicalAction, Primitive};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::bridge::{DecisionRequest, ReasoningBridge};
use crate::react::planner::{ProposedCall, RawDecision};
use crate::react::{
    CallRecord, CallResult, DecisionOutcome, DecisionStatus, EngineEvent, InterventionDecision, SessionState, Turn,
    Utterance,
};
use crate::scene::SharedScene;
use crate::tools::{ToolCall, ToolContext, ToolExecutor};

/// 中断后写入对话的说明
const INTERRUPTED_NOTE: &str = "You were stopped by the user.";
const RECOVERED_NOTE: &str = "You were stopped by the user and are now back in your default pose.";
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 规划循环参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 机器人 id（物理动作的执行者）
    pub robot: String,
    /// 单次决策内最多推理轮数
    pub max_rounds: usize,
    /// 每个 Executing 步骤的墙钟上限
    pub step_timeout: Duration,
    pub recover_after_interrupt: bool,
    /// 每次决策后清空对话
    pub amnesic: bool,
    pub max_context_turns: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            robot: "Johnnie".to_string(),
            max_rounds: 12,
            step_timeout: Duration::from_secs(60),
            recover_after_interrupt: true,
            amnesic: false,
            max_context_turns: 40,
        }
    }
}

/// 外部中断入口：可克隆，可在任意任务中调用
#[derive(Clone)]
pub struct InterruptHandle {
    supervisor: Arc<SessionSupervisor>,
    dispatcher: Arc<ExecutionDispatcher>,
}

impl InterruptHandle {
    /// 取消当前决策与所有在途动作；返回是否有正在进行的决策
    pub fn interrupt(&self) -> bool {
        let active = self.supervisor.interrupt();
        self.dispatcher.cancel_all();
        active
    }

    pub fn is_deciding(&self) -> bool {
        self.supervisor.is_active()
    }
}

/// 单次决策的可变记录
struct DecisionRun {
    id: String,
    trace: PhaseTrace,
    records: Vec<CallRecord>,
    rounds: usize,
    remark: Option<String>,
}

enum BatchEnd {
    Continue,
    Stop(DecisionStatus),
}

pub struct AttentiveEngine {
    settings: EngineSettings,
    bridge: ReasoningBridge,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    scene: SharedScene,
    dispatcher: Arc<ExecutionDispatcher>,
    supervisor: Arc<SessionSupervisor>,
    session: SessionState,
    event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl AttentiveEngine {
    pub fn new(
        settings: EngineSettings,
        llm: Arc<dyn LlmClient>,
        executor: ToolExecutor,
        recovery: RecoveryEngine,
        scene: SharedScene,
        action_executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let bridge = ReasoningBridge::new(llm, recovery.clone(), &settings.robot, executor.catalog_json());
        let session = SessionState::new(settings.max_context_turns);
        Self {
            settings,
            bridge,
            executor,
            recovery,
            scene,
            dispatcher: Arc::new(ExecutionDispatcher::new(action_executor)),
            supervisor: Arc::new(SessionSupervisor::new()),
            session,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            supervisor: Arc::clone(&self.supervisor),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }

    pub fn scene(&self) -> SharedScene {
        self.scene.clone()
    }

    pub fn dispatcher(&self) -> Arc<ExecutionDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// 推理服务累计 token：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.bridge.token_usage()
    }

    /// 设置某人/机器人的忙碌状态；之后的能力查询立即可见
    pub async fn set_agent_status(&self, agent: &str, busy: bool, reason: Option<String>) -> Result<(), SupportError> {
        self.scene.write().await.set_status(agent, busy, reason)
    }

    /// 清空会话并把场景恢复到初始布局；可重复调用
    pub async fn reset(&mut self) {
        self.dispatcher.cancel_all();
        self.session.clear();
        self.scene.write().await.reset();
        tracing::info!("engine reset");
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn advance(&self, run: &mut DecisionRun, phase: DecisionPhase) {
        run.trace.advance(phase);
        self.emit(EngineEvent::PhaseChanged {
            decision_id: run.id.clone(),
            phase,
        });
    }

    /// 处理一条话语，返回这次决策的完整记录
    pub async fn plan(&mut self, line: &str) -> DecisionOutcome {
        let utterance = Utterance::parse(line);
        let cancel = self.supervisor.begin_decision();
        let mut run = DecisionRun {
            id: uuid::Uuid::new_v4().to_string(),
            trace: PhaseTrace::new(),
            records: Vec::new(),
            rounds: 0,
            remark: None,
        };
        tracing::info!(decision_id = %run.id, utterance = %utterance, "decision started");
        self.emit(EngineEvent::Received {
            decision_id: run.id.clone(),
            utterance: utterance.to_string(),
        });

        let status = self.decide_and_execute(&utterance, &mut run, &cancel).await;

        if status == DecisionStatus::Interrupted {
            self.after_interrupt().await;
        }
        if status == DecisionStatus::Completed {
            self.advance(&mut run, DecisionPhase::Completed);
        } else {
            self.advance(&mut run, DecisionPhase::Aborted);
        }
        self.advance(&mut run, DecisionPhase::Done);
        self.supervisor.end_decision();

        let decision = InterventionDecision::classify(&run.records, run.remark.clone());
        match &status {
            DecisionStatus::Completed | DecisionStatus::Interrupted => tracing::info!(
                decision_id = %run.id,
                decision = decision.label(),
                status = status.label(),
                rounds = run.rounds,
                calls = run.records.len(),
                total_tokens = self.token_usage().2,
                "decision finished"
            ),
            other => tracing::warn!(
                decision_id = %run.id,
                decision = decision.label(),
                status = ?other,
                rounds = run.rounds,
                "decision aborted"
            ),
        }
        self.emit(EngineEvent::Decided {
            decision_id: run.id.clone(),
            decision: decision.label().to_string(),
            status: status.label().to_string(),
        });

        self.session.record_turn(Turn {
            decision_id: run.id.clone(),
            utterance: utterance.clone(),
            decision: decision.clone(),
            status: status.clone(),
            at: chrono::Utc::now(),
        });
        if self.settings.amnesic {
            self.session.forget_conversation();
        }

        DecisionOutcome {
            id: run.id,
            utterance,
            decision,
            status,
            trace: run.trace,
            calls: run.records,
            rounds: run.rounds,
        }
    }

    async fn decide_and_execute(
        &mut self,
        utterance: &Utterance,
        run: &mut DecisionRun,
        cancel: &CancellationToken,
    ) -> DecisionStatus {
        self.session.notes.begin(utterance.to_string());
        self.session.push_message(Message::user(utterance.to_string()));

        let ctx = ToolContext {
            scene: self.scene.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            robot: self.settings.robot.clone(),
            cancel: cancel.clone(),
            step_timeout: self.settings.step_timeout,
        };
        let mut argument_failures = 0u32;

        loop {
            self.advance(run, DecisionPhase::Deciding);
            if cancel.is_cancelled() {
                return DecisionStatus::Interrupted;
            }
            if run.rounds >= self.settings.max_rounds {
                return DecisionStatus::TimedOut(format!(
                    "no final decision within {} reasoning rounds",
                    self.settings.max_rounds
                ));
            }
            run.rounds += 1;
            self.emit(EngineEvent::Thinking {
                round: run.rounds,
                max_rounds: self.settings.max_rounds,
            });

            let scene_summary = self.scene.read().await.summary();
            let notes = self.session.notes_section();
            let request = DecisionRequest {
                history: self.session.messages(),
                scene_summary: &scene_summary,
                notes: &notes,
            };
            let proposal = match self.bridge.decide(request, cancel).await {
                Ok(p) => p,
                Err(SupportError::Cancelled) => return DecisionStatus::Interrupted,
                Err(e) => {
                    tracing::warn!(decision_id = %run.id, error = %e, "reasoning failed");
                    return DecisionStatus::CouldNotDecide(e.to_string());
                }
            };
            self.session.push_message(Message::assistant(proposal.raw.clone()));

            let proposed = match proposal.decision {
                RawDecision::Answer(text) => {
                    self.advance(run, DecisionPhase::Answering);
                    run.remark = Some(text);
                    return DecisionStatus::Completed;
                }
                RawDecision::Calls(calls) => calls,
            };

            self.advance(run, DecisionPhase::Resolving);
            let resolved = match self.resolve_all(&proposed) {
                Ok(calls) => calls,
                Err((tool, err)) => {
                    let attempt = if matches!(err, SupportError::ArgumentMismatch { .. }) {
                        argument_failures += 1;
                        argument_failures
                    } else {
                        1
                    };
                    self.emit(EngineEvent::ToolFailure {
                        tool: tool.clone(),
                        reason: err.to_string(),
                    });
                    match self.recovery.handle(&err, attempt) {
                        RecoveryAction::FeedBack(prompt) => {
                            tracing::warn!(decision_id = %run.id, tool = %tool, error = %err, "call rejected, asking again");
                            self.emit(EngineEvent::Recovery {
                                action: "feed_back".to_string(),
                                detail: prompt.clone(),
                            });
                            self.session.notes.failed(format!("{tool}: {err}"));
                            self.session.push_message(Message::user(prompt));
                            continue;
                        }
                        _ => {
                            self.emit(EngineEvent::Recovery {
                                action: "abort".to_string(),
                                detail: err.to_string(),
                            });
                            return DecisionStatus::Aborted(err.to_string());
                        }
                    }
                }
            };

            self.advance(run, DecisionPhase::Executing);
            match self.execute_batch(&resolved, &ctx, run).await {
                BatchEnd::Continue => continue,
                BatchEnd::Stop(status) => return status,
            }
        }
    }

    /// 全部解析成功才返回；第一个无法解析的调用让整批都不执行
    fn resolve_all(&self, proposed: &[ProposedCall]) -> Result<Vec<ToolCall>, (String, SupportError)> {
        proposed
            .iter()
            .map(|p| {
                self.executor
                    .resolve(&p.tool, &p.args)
                    .map_err(|e| (p.tool.clone(), e))
            })
            .collect()
    }

    /// 按顺序执行；工具失败回灌给下一轮推理并跳过本批剩余调用
    async fn execute_batch(&mut self, calls: &[ToolCall], ctx: &ToolContext, run: &mut DecisionRun) -> BatchEnd {
        let mut observations = Vec::with_capacity(calls.len());
        for call in calls {
            if ctx.cancel.is_cancelled() {
                return BatchEnd::Stop(DecisionStatus::Interrupted);
            }
            let signature = call.signature();
            self.emit(EngineEvent::ToolCall {
                tool: call.tool.clone(),
                args: serde_json::Value::Object(call.args.clone()),
            });

            match self.executor.execute(call, ctx).await {
                Ok(observation) => {
                    self.emit(EngineEvent::Observation {
                        tool: call.tool.clone(),
                        preview: observation.chars().take(OBSERVATION_PREVIEW_CHARS).collect(),
                    });
                    self.session.notes.tried(format!("{signature} -> {observation}"));
                    observations.push(format!("{signature} -> {observation}"));
                    run.records.push(CallRecord {
                        call: call.clone(),
                        result: CallResult::Ok(observation),
                    });
                }
                Err(SupportError::Cancelled) => {
                    run.records.push(CallRecord {
                        call: call.clone(),
                        result: CallResult::Cancelled,
                    });
                    return BatchEnd::Stop(DecisionStatus::Interrupted);
                }
                Err(SupportError::Timeout(reason)) => {
                    run.records.push(CallRecord {
                        call: call.clone(),
                        result: CallResult::Failed(reason.clone()),
                    });
                    return BatchEnd::Stop(DecisionStatus::TimedOut(reason));
                }
                Err(e) if e.is_local() => {
                    self.emit(EngineEvent::ToolFailure {
                        tool: call.tool.clone(),
                        reason: e.to_string(),
                    });
                    self.session.notes.failed(format!("{signature}: {e}"));
                    observations.push(format!("{signature} -> Error: {e}"));
                    run.records.push(CallRecord {
                        call: call.clone(),
                        result: CallResult::Failed(e.to_string()),
                    });
                    break;
                }
                Err(e) => {
                    run.records.push(CallRecord {
                        call: call.clone(),
                        result: CallResult::Failed(e.to_string()),
                    });
                    return BatchEnd::Stop(DecisionStatus::Aborted(e.to_string()));
                }
            }
        }
        self.session
            .push_message(Message::user(format!("Results:\n{}", observations.join("\n"))));
        BatchEnd::Continue
    }

    /// 放下手中物体、回到默认姿态，并在对话中记下中断
    async fn after_interrupt(&mut self) {
        if !self.settings.recover_after_interrupt {
            self.session.push_message(Message::system(INTERRUPTED_NOTE));
            return;
        }
        let robot = self.settings.robot.clone();
        let held = match self.scene.read().await.held_objects(&robot) {
            Ok(held) => held,
            Err(e) => {
                tracing::warn!(error = %e, "cannot inspect held objects after interrupt");
                Vec::new()
            }
        };
        let mut steps: Vec<Primitive> = held
            .into_iter()
            .map(|object| Primitive::PutDown { object })
            .collect();
        steps.push(Primitive::DefaultPose);

        match self.dispatcher.submit(PhysicalAction::new(robot, steps)) {
            Ok(handle) => match self.dispatcher.wait_timeout(&handle, self.settings.step_timeout).await {
                Ok(outcome) => tracing::info!(outcome = outcome.label(), "recovered after interrupt"),
                Err(e) => tracing::warn!(error = %e, "recovery after interrupt did not finish"),
            },
            Err(e) => tracing::warn!(error = %e, "recovery after interrupt not dispatched"),
        }
        self.session.push_message(Message::system(RECOVERED_NOTE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ActionOutcome, SimulatedExecutor};
    use crate::llm::ScriptedLlmClient;
    use crate::scene::{shared, SceneLayout, SceneModel};
    use crate::tools::builtin_registry;

    fn engine(llm: Arc<ScriptedLlmClient>, settings: EngineSettings) -> AttentiveEngine {
        let scene = shared(SceneModel::new(SceneLayout::table_demo("Johnnie")).unwrap());
        let action_executor = Arc::new(SimulatedExecutor::new(scene.clone(), 1000.0));
        AttentiveEngine::new(
            settings,
            llm,
            ToolExecutor::new(builtin_registry().unwrap()),
            RecoveryEngine::new(1, 2, Duration::from_millis(1)),
            scene,
            action_executor,
        )
    }

    #[tokio::test]
    async fn test_answer_only_path() {
        let llm = Arc::new(ScriptedLlmClient::new(["Daniel can answer this himself."]));
        let mut engine = engine(llm, EngineSettings::default());
        let outcome = engine.plan("Felix -> Daniel: What do we have to drink?").await;
        assert_eq!(outcome.status, DecisionStatus::Completed);
        assert_eq!(
            outcome.decision,
            InterventionDecision::NoAction {
                remark: Some("Daniel can answer this himself.".into())
            }
        );
        assert_eq!(
            outcome.trace.phases(),
            &[
                DecisionPhase::Received,
                DecisionPhase::Deciding,
                DecisionPhase::Answering,
                DecisionPhase::Completed,
                DecisionPhase::Done
            ]
        );
        assert_eq!(engine.session().turns().len(), 1);
    }

    #[tokio::test]
    async fn test_argument_mismatch_retried_once_then_aborted() {
        let bad = r#"{"tool": "hand_object_over_to_person", "args": {"object_name": "red_glass"}}"#;
        let llm = Arc::new(ScriptedLlmClient::new([bad, bad, "unused"]));
        let mut engine = engine(llm.clone(), EngineSettings::default());
        let outcome = engine.plan("Felix -> Daniel: hand me the red glass").await;
        assert!(matches!(outcome.status, DecisionStatus::Aborted(ref r) if r.contains("person_name")));
        assert!(outcome.calls.is_empty());
        assert_eq!(llm.request_count(), 2);
        // 回灌的提示出现在第二次请求中
        let second = llm.request(1).unwrap();
        assert!(second.iter().any(|m| m.content.contains("was rejected")));
    }

    #[tokio::test]
    async fn test_round_bound_times_out() {
        let call = r#"{"tool": "get_objects", "args": {}}"#;
        let llm = Arc::new(ScriptedLlmClient::new(Vec::<&str>::new()).with_fallback(call));
        let settings = EngineSettings {
            max_rounds: 3,
            ..EngineSettings::default()
        };
        let mut engine = engine(llm.clone(), settings);
        let outcome = engine.plan("User: keep looking").await;
        assert!(matches!(outcome.status, DecisionStatus::TimedOut(_)));
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.calls.len(), 3);
        assert_eq!(llm.request_count(), 3);
        assert!(outcome.reached(DecisionPhase::Aborted));
    }

    #[tokio::test]
    async fn test_zero_round_bound_aborts_from_deciding() {
        let llm = Arc::new(ScriptedLlmClient::new(["unused"]));
        let settings = EngineSettings {
            max_rounds: 0,
            ..EngineSettings::default()
        };
        let mut engine = engine(llm.clone(), settings);
        let outcome = engine.plan("Felix -> Daniel: hi").await;
        assert!(matches!(outcome.status, DecisionStatus::TimedOut(_)));
        assert_eq!(llm.request_count(), 0);
        assert_eq!(
            outcome.trace.phases(),
            &[
                DecisionPhase::Received,
                DecisionPhase::Deciding,
                DecisionPhase::Aborted,
                DecisionPhase::Done
            ]
        );
    }

    #[tokio::test]
    async fn test_protocol_error_could_not_decide() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"command": "dance"}"#]));
        let mut engine = engine(llm.clone(), EngineSettings::default());
        let outcome = engine.plan("Felix -> Daniel: hi").await;
        assert!(matches!(outcome.status, DecisionStatus::CouldNotDecide(_)));
        assert_eq!(llm.request_count(), 1);
        assert_eq!(
            outcome.trace.phases(),
            &[
                DecisionPhase::Received,
                DecisionPhase::Deciding,
                DecisionPhase::Aborted,
                DecisionPhase::Done
            ]
        );
        // 循环仍可处理下一条
        let next = engine.plan("Felix -> Daniel: hi again").await;
        assert_eq!(next.status, DecisionStatus::Completed);
    }

    #[tokio::test]
    async fn test_unknown_entity_fed_back_as_failed_call() {
        let llm = Arc::new(ScriptedLlmClient::new([
            r#"{"tool": "can_person_reach_object", "args": {"person_name": "Felix", "object_name": "green_glass"}}"#,
            "Never mind.",
        ]));
        let mut engine = engine(llm.clone(), EngineSettings::default());
        let outcome = engine.plan("Felix -> Daniel: pass the green glass").await;
        assert_eq!(outcome.status, DecisionStatus::Completed);
        assert!(matches!(outcome.calls[0].result, CallResult::Failed(ref r) if r.contains("Did you mean")));
        let second = llm.request(1).unwrap();
        assert!(second.iter().any(|m| m.content.contains("Error: Not found")));
    }

    #[tokio::test]
    async fn test_amnesic_forgets_between_decisions() {
        let llm = Arc::new(ScriptedLlmClient::new(["ok", "ok"]));
        let settings = EngineSettings {
            amnesic: true,
            ..EngineSettings::default()
        };
        let mut engine = engine(llm.clone(), settings);
        engine.plan("Felix -> Daniel: pineapple juice?").await;
        engine.plan("Felix -> Daniel: anything else?").await;
        let second = llm.request(1).unwrap();
        assert!(!second.iter().any(|m| m.content.contains("pineapple")));
        assert_eq!(engine.session().turns().len(), 2);
    }

    /// 仿真执行器外包一层，记下每个动作最终的结果
    struct RecordingExecutor {
        inner: SimulatedExecutor,
        settled: std::sync::Mutex<Vec<ActionOutcome>>,
    }

    #[async_trait::async_trait]
    impl ActionExecutor for RecordingExecutor {
        async fn perform(&self, action: &PhysicalAction, cancel: CancellationToken) -> ActionOutcome {
            let outcome = self.inner.perform(action, cancel).await;
            self.settled.lock().unwrap().push(outcome.clone());
            outcome
        }
    }

    #[tokio::test]
    async fn test_step_timeout_cancels_action_and_times_out() {
        let hand_over =
            r#"{"tool": "hand_object_over_to_person", "args": {"object_name": "red_glass", "person_name": "Felix"}}"#;
        let llm = Arc::new(ScriptedLlmClient::new([hand_over, "unused"]));
        let scene = shared(SceneModel::new(SceneLayout::table_demo("Johnnie")).unwrap());
        let recorder = Arc::new(RecordingExecutor {
            inner: SimulatedExecutor::new(scene.clone(), 1.0),
            settled: std::sync::Mutex::new(Vec::new()),
        });
        let settings = EngineSettings {
            step_timeout: Duration::from_millis(20),
            ..EngineSettings::default()
        };
        let mut engine = AttentiveEngine::new(
            settings,
            llm.clone(),
            ToolExecutor::new(builtin_registry().unwrap()),
            RecoveryEngine::new(1, 2, Duration::from_millis(1)),
            scene.clone(),
            recorder.clone(),
        );

        let outcome = engine.plan("Felix -> Daniel: Can you pass me the red glass?").await;
        assert!(matches!(outcome.status, DecisionStatus::TimedOut(ref r) if r.contains("exceeded")));
        assert_eq!(outcome.calls.len(), 1);
        assert!(matches!(outcome.calls[0].result, CallResult::Failed(_)));
        assert_eq!(llm.request_count(), 1);

        // 超时后动作被取消，执行者随即空闲
        let dispatcher = engine.dispatcher();
        for _ in 0..100 {
            if !dispatcher.in_flight("Johnnie") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!dispatcher.in_flight("Johnnie"));
        assert_eq!(*recorder.settled.lock().unwrap(), vec![ActionOutcome::Cancelled]);
        assert_eq!(scene.read().await.holder_of("red_glass").unwrap(), None);
    }
}
