//! 记忆层：对话记忆（跨决策）与决策内笔记

pub mod conversation;
pub mod notes;

pub use conversation::{ConversationMemory, Message, Role};
pub use notes::DecisionNotes;
