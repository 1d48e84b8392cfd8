//! 会话状态：对话记忆 + 决策内笔记 + 已完成决策的有序记录
//!
//! 由规划循环独占；reset 时全部清空。

use serde::Serialize;

use crate::memory::{ConversationMemory, DecisionNotes, Message};
use crate::react::{DecisionStatus, InterventionDecision, Utterance};

/// 一条话语及其决策
#[derive(Clone, Debug, Serialize)]
pub struct Turn {
    pub decision_id: String,
    pub utterance: Utterance,
    pub decision: InterventionDecision,
    pub status: DecisionStatus,
    pub at: chrono::DateTime<chrono::Utc>,
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub conversation: ConversationMemory,
    pub notes: DecisionNotes,
    turns: Vec<Turn>,
}

impl SessionState {
    pub fn new(max_turns: usize) -> Self {
        Self {
            conversation: ConversationMemory::new(max_turns),
            notes: DecisionNotes::new(),
            turns: Vec::new(),
        }
    }

    pub fn push_message(&mut self, msg: Message) {
        self.conversation.push(msg);
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// 决策内笔记（拼入 system prompt）
    pub fn notes_section(&self) -> String {
        self.notes.render()
    }

    pub fn record_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// 只清对话（amnesic 模式），保留决策记录
    pub fn forget_conversation(&mut self) {
        self.conversation.clear();
        self.notes.clear();
    }

    pub fn clear(&mut self) {
        self.forget_conversation();
        self.turns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.conversation.is_empty() && self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_is_idempotent() {
        let mut state = SessionState::new(10);
        state.push_message(Message::user("Felix -> Daniel: hi"));
        state.notes.begin("hi");
        state.record_turn(Turn {
            decision_id: "d1".into(),
            utterance: Utterance::parse("Felix -> Daniel: hi"),
            decision: InterventionDecision::NoAction { remark: None },
            status: DecisionStatus::Completed,
            at: chrono::Utc::now(),
        });
        state.clear();
        assert!(state.is_empty());
        state.clear();
        assert!(state.is_empty());
        assert!(state.notes.utterance().is_none());
    }
}
