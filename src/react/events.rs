//! 规划过程事件：阶段变化、工具调用、观察、重试与最终结果，可序列化为 JSON 供前端展示

use serde::Serialize;

use crate::core::DecisionPhase;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// 收到话语，开始一次决策
    Received { decision_id: String, utterance: String },
    PhaseChanged { decision_id: String, phase: DecisionPhase },
    /// 第几轮推理
    Thinking { round: usize, max_rounds: usize },
    ToolCall { tool: String, args: serde_json::Value },
    /// 工具返回（预览）
    Observation { tool: String, preview: String },
    ToolFailure { tool: String, reason: String },
    /// 恢复动作（FeedBack / Abort 等）
    Recovery { action: String, detail: String },
    /// 决策结束
    Decided {
        decision_id: String,
        decision: String,
        status: String,
    },
}
