//! 测试 / 离线用 LLM 客户端（无需 API）
//!
//! MockLlmClient 只给纯文本回答，不调用工具；ScriptedLlmClient 按顺序返回预置回复并记录每次请求。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// 离线客户端：对最后一条 User 消息给出不带工具调用的回答
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");
        Ok(format!("(offline) I heard \"{last_user}\" and will not intervene."))
    }
}

/// 脚本化客户端：依次弹出预置回复；用完后返回 fallback
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
    fallback: String,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(responses.into_iter().map(|s| Ok(s.into())))
    }

    pub fn with_results(responses: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            fallback: "Nothing to do.".to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// 到目前为止收到的请求数
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 第 n 次请求的消息（从 0 开始）
    pub fn request(&self, n: usize) -> Option<Vec<Message>> {
        self.requests.lock().ok().and_then(|r| r.get(n).cloned())
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }
        let next = self
            .responses
            .lock()
            .map_err(|_| LlmError::Unavailable("script poisoned".to_string()))?
            .pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_in_order_then_fallback() {
        let llm = ScriptedLlmClient::with_results(vec![
            Err(LlmError::Unavailable("down".into())),
            Ok("second".to_string()),
        ])
        .with_fallback("done");
        let msgs = vec![Message::user("hi")];
        assert!(llm.complete(&msgs).await.is_err());
        assert_eq!(llm.complete(&msgs).await.unwrap(), "second");
        assert_eq!(llm.complete(&msgs).await.unwrap(), "done");
        assert_eq!(llm.request_count(), 3);
        assert_eq!(llm.request(0).unwrap()[0].content, "hi");
    }

    #[tokio::test]
    async fn test_mock_answers_without_tools() {
        let reply = MockLlmClient.complete(&[Message::user("hello")]).await.unwrap();
        assert!(reply.contains("hello"));
        assert!(!reply.trim_start().starts_with('{'));
    }
}
