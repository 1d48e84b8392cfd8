//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / 脚本化）实现 LlmClient::complete（非流式）；错误用 LlmError 区分可重试与不可重试。

use async_trait::async_trait;
use thiserror::Error;

use crate::core::SupportError;
use crate::memory::Message;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 网络错误、5xx、超时
    #[error("LLM service unavailable: {0}")]
    Unavailable(String),

    #[error("LLM rate limited: {0}")]
    RateLimited(String),

    /// 返回内容为空或无法使用
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
}

impl From<LlmError> for SupportError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Unavailable(m) | LlmError::RateLimited(m) => SupportError::ServiceUnavailable(m),
            LlmError::InvalidResponse(m) => SupportError::ProtocolError(m),
        }
    }
}

/// LLM 客户端 trait：给定完整上下文，返回助手回复文本
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 累计 token 使用：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
