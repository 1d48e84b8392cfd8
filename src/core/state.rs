//! 决策状态机：单条话语从接收到完成的阶段
//!
//! Received → Deciding → {Answering | Resolving → Executing → Completed} → Done；
//! Resolving / Executing 可因取消或无法解析的调用进入 Aborted。
//! Executing 之后可回到 Deciding（多轮调用/回应）。
//! Deciding 也可直接进入 Aborted：推理期间被中断、推理服务无法给出决策、或推理轮数用尽。

use serde::Serialize;

/// 决策阶段
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionPhase {
    Received,
    Deciding,
    Answering,
    Resolving,
    Executing,
    Completed,
    Aborted,
    Done,
}

impl DecisionPhase {
    /// 是否允许从 self 迁移到 next
    pub fn can_transition_to(self, next: DecisionPhase) -> bool {
        use DecisionPhase::*;
        matches!(
            (self, next),
            (Received, Deciding)
                | (Deciding, Answering)
                | (Deciding, Resolving)
                | (Deciding, Aborted)
                | (Resolving, Executing)
                | (Resolving, Deciding)
                | (Resolving, Aborted)
                | (Executing, Deciding)
                | (Executing, Completed)
                | (Executing, Aborted)
                | (Answering, Completed)
                | (Completed, Done)
                | (Aborted, Done)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DecisionPhase::Done)
    }
}

/// 阶段轨迹：记录每次迁移，非法迁移只告警不 panic（规划循环不能崩溃）
#[derive(Clone, Debug, Serialize)]
pub struct PhaseTrace {
    phases: Vec<DecisionPhase>,
}

impl Default for PhaseTrace {
    fn default() -> Self {
        Self {
            phases: vec![DecisionPhase::Received],
        }
    }
}

impl PhaseTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> DecisionPhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(DecisionPhase::Received)
    }

    pub fn advance(&mut self, next: DecisionPhase) {
        let current = self.current();
        if !current.can_transition_to(next) {
            tracing::warn!(from = ?current, to = ?next, "unexpected decision phase transition");
        }
        tracing::debug!(from = ?current, to = ?next, "decision phase");
        self.phases.push(next);
    }

    pub fn phases(&self) -> &[DecisionPhase] {
        &self.phases
    }

    pub fn contains(&self, phase: DecisionPhase) -> bool {
        self.phases.contains(&phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_path() {
        let mut trace = PhaseTrace::new();
        trace.advance(DecisionPhase::Deciding);
        trace.advance(DecisionPhase::Answering);
        trace.advance(DecisionPhase::Completed);
        trace.advance(DecisionPhase::Done);
        assert!(trace.current().is_terminal());
        assert!(!trace.contains(DecisionPhase::Executing));
    }

    #[test]
    fn test_abort_edges() {
        assert!(DecisionPhase::Executing.can_transition_to(DecisionPhase::Aborted));
        assert!(DecisionPhase::Resolving.can_transition_to(DecisionPhase::Aborted));
        assert!(DecisionPhase::Deciding.can_transition_to(DecisionPhase::Aborted));
        assert!(!DecisionPhase::Received.can_transition_to(DecisionPhase::Aborted));
        assert!(!DecisionPhase::Completed.can_transition_to(DecisionPhase::Aborted));
        assert!(!DecisionPhase::Answering.can_transition_to(DecisionPhase::Executing));
    }
}
