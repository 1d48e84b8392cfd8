//! 决策错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 SupportError 决定 FeedBack（回灌给推理服务重新考虑）/ RetryAfter（退避重试）/ Abort。

use std::time::Duration;

use thiserror::Error;

/// 单次决策过程中可能出现的错误（实体/工具不存在、参数不匹配、服务不可用、协议错误、忙碌、取消、超时等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SupportError {
    /// 未知实体或工具
    #[error("Not found: {0}")]
    NotFound(String),

    /// 重复注册同名工具
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Argument mismatch for '{tool}': {reason}")]
    ArgumentMismatch { tool: String, reason: String },

    /// 外部推理服务不可用（可退避重试）
    #[error("Reasoning service unavailable: {0}")]
    ServiceUnavailable(String),

    /// 推理服务返回格式错误（不重试）
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// 该实体已有一个正在执行的动作
    #[error("Agent '{0}' is busy with another action")]
    Busy(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("Timeout: {0}")]
    Timeout(String),

    /// 场景布局不合法（重复 id、包含关系成环、未知持有者）
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl SupportError {
    pub fn not_found(kind: &str, name: &str) -> Self {
        Self::NotFound(format!("{kind} '{name}'"))
    }

    pub fn mismatch(tool: &str, reason: impl Into<String>) -> Self {
        Self::ArgumentMismatch {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }

    /// 该错误是否只影响当前一步（可回灌给推理服务），而不终止整个决策
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::ArgumentMismatch { .. } | Self::Busy(_)
        )
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将错误描述作为下一轮上下文回灌给推理服务，让其重新考虑
    FeedBack(String),
    /// 等待后重试同一次请求
    RetryAfter(Duration),
    /// 终止当前决策
    Abort,
}
