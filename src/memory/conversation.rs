//! 对话记忆：跨决策保留的 utterance / 工具观察 / 机器人回复
//!
//! 只保留最近 N 轮，超出时从最旧处剪枝；amnesic 模式下每次决策结束后清空。

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 对话记忆：最多保留 max_turns*2 条消息
///
/// 裁剪后历史总以 user 或 system 消息开头，不会留下没有前因的助手回复。
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    max_turns: usize,
}

impl ConversationMemory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_turns: max_turns.max(1),
        }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        let mut cut = self.messages.len().saturating_sub(self.max_turns * 2);
        if cut == 0 {
            return;
        }
        while self.messages.get(cut).is_some_and(|m| m.role == Role::Assistant) {
            cut += 1;
        }
        self.messages.drain(..cut);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 最近一条 user 消息
    pub fn last_user(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_never_starts_with_assistant() {
        let mut memory = ConversationMemory::new(1);
        memory.push(Message::user("Felix -> Daniel: hi"));
        memory.push(Message::assistant("Nothing to do."));
        assert_eq!(memory.len(), 2);

        memory.push(Message::user("Felix -> Daniel: the red glass please"));
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.messages()[0].role, Role::User);
        assert_eq!(
            memory.last_user().map(|m| m.content.as_str()),
            Some("Felix -> Daniel: the red glass please")
        );

        memory.push(Message::assistant("{\"tool\": \"get_objects\"}"));
        memory.push(Message::user("Results:\n- get_objects() -> ..."));
        assert_eq!(memory.len(), 1);
        assert!(memory.messages()[0].content.starts_with("Results:"));
    }
}
