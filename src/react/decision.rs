//! 单次决策的结果：介入决定、状态、阶段轨迹与执行过的调用

use serde::Serialize;

use crate::core::{DecisionPhase, PhaseTrace};
use crate::react::Utterance;
use crate::tools::{ToolCall, ToolKind};

/// 介入决定
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterventionDecision {
    /// 不介入；remark 是推理服务的内心独白（不说出口）
    NoAction { remark: Option<String> },
    /// 只说话
    Answer { text: String },
    /// 执行了物理动作（按执行顺序）
    Act { calls: Vec<ToolCall> },
}

impl InterventionDecision {
    pub fn label(&self) -> &'static str {
        match self {
            InterventionDecision::NoAction { .. } => "no_action",
            InterventionDecision::Answer { .. } => "answer",
            InterventionDecision::Act { .. } => "act",
        }
    }

    pub fn is_act(&self) -> bool {
        matches!(self, InterventionDecision::Act { .. })
    }

    /// 按执行记录归类：有已下发的物理动作即 Act；否则有语音即 Answer；否则 NoAction
    pub fn classify(records: &[CallRecord], remark: Option<String>) -> Self {
        let physical: Vec<ToolCall> = records
            .iter()
            .filter(|r| r.is_dispatched_physical())
            .map(|r| r.call.clone())
            .collect();
        if !physical.is_empty() {
            return InterventionDecision::Act { calls: physical };
        }
        let spoken: Vec<&str> = records
            .iter()
            .filter(|r| r.call.kind == ToolKind::Speech && matches!(r.result, CallResult::Ok(_)))
            .filter_map(|r| r.call.opt_str_arg("text"))
            .collect();
        if !spoken.is_empty() {
            return InterventionDecision::Answer { text: spoken.join(" ") };
        }
        InterventionDecision::NoAction { remark }
    }
}

/// 单个调用的执行结果
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum CallResult {
    Ok(String),
    Failed(String),
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallRecord {
    pub call: ToolCall,
    pub result: CallResult,
}

impl CallRecord {
    /// 物理动作且确实交给了执行器（Failed 表示执行前就被拒绝）
    pub fn is_dispatched_physical(&self) -> bool {
        self.call.kind == ToolKind::Physical && !matches!(self.result, CallResult::Failed(_))
    }
}

/// 决策结束状态
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DecisionStatus {
    Completed,
    /// 被外部中断；不是需要告警的错误
    Interrupted,
    Aborted(String),
    TimedOut(String),
    /// 推理服务不可用或回复格式错误
    CouldNotDecide(String),
}

impl DecisionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionStatus::Completed => "completed",
            DecisionStatus::Interrupted => "interrupted",
            DecisionStatus::Aborted(_) => "aborted",
            DecisionStatus::TimedOut(_) => "timed_out",
            DecisionStatus::CouldNotDecide(_) => "could_not_decide",
        }
    }
}

/// 一次决策的完整记录
#[derive(Clone, Debug, Serialize)]
pub struct DecisionOutcome {
    pub id: String,
    pub utterance: Utterance,
    pub decision: InterventionDecision,
    pub status: DecisionStatus,
    pub trace: PhaseTrace,
    pub calls: Vec<CallRecord>,
    /// 推理轮数
    pub rounds: usize,
}

impl DecisionOutcome {
    /// 执行过的调用名（按顺序）
    pub fn tool_names(&self) -> Vec<&str> {
        self.calls.iter().map(|r| r.call.tool.as_str()).collect()
    }

    pub fn executed_physical(&self) -> bool {
        self.calls.iter().any(CallRecord::is_dispatched_physical)
    }

    pub fn reached(&self, phase: DecisionPhase) -> bool {
        self.trace.contains(phase)
    }
}
