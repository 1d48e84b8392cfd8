//! 决策层：话语解析、推理桥、规划主循环、决策结果与会话状态

pub mod bridge;
pub mod decision;
pub mod events;
pub mod loop_;
pub mod memory;
pub mod planner;
pub mod utterance;

pub use bridge::{DecisionRequest, Proposal, ReasoningBridge};
pub use decision::{CallRecord, CallResult, DecisionOutcome, DecisionStatus, InterventionDecision};
pub use events::EngineEvent;
pub use loop_::{AttentiveEngine, EngineSettings, InterruptHandle};
pub use memory::{SessionState, Turn};
pub use planner::{parse_llm_output, ProposedCall, RawDecision};
pub use utterance::{Utterance, DIRECT_SPEAKER};
