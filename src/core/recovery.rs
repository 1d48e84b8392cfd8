//! 错误恢复引擎
//!
//! 根据 SupportError 类型与已用重试次数返回 RecoveryAction，供规划循环决定是回灌、退避重试还是终止。

use std::time::Duration;

use crate::core::{RecoveryAction, SupportError};

/// 语义化错误恢复：参数错误/忙碌/未知实体回灌推理服务，服务不可用按指数退避重试，其余终止当前决策
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    max_argument_retries: u32,
    max_service_retries: u32,
    base_backoff: Duration,
}

impl Default for RecoveryEngine {
    fn default() -> Self {
        Self::new(1, 3, Duration::from_millis(500))
    }
}

impl RecoveryEngine {
    pub fn new(max_argument_retries: u32, max_service_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_argument_retries,
            max_service_retries,
            base_backoff,
        }
    }

    pub fn max_service_retries(&self) -> u32 {
        self.max_service_retries
    }

    /// attempt：该类错误在本次决策内已经发生的次数（从 1 开始）
    pub fn handle(&self, err: &SupportError, attempt: u32) -> RecoveryAction {
        match err {
            SupportError::ArgumentMismatch { tool, reason } => {
                if attempt > self.max_argument_retries {
                    return RecoveryAction::Abort;
                }
                RecoveryAction::FeedBack(format!(
                    "The call to '{tool}' was rejected: {reason}. \
                     Check the tool catalog and call it again with valid arguments."
                ))
            }
            SupportError::NotFound(what) => RecoveryAction::FeedBack(format!(
                "{what} does not exist. Only use tools and names that are available."
            )),
            SupportError::Busy(agent) => RecoveryAction::FeedBack(format!(
                "{agent} is still executing another action. Wait for it or choose another plan."
            )),
            SupportError::ServiceUnavailable(_) => {
                if attempt > self.max_service_retries {
                    return RecoveryAction::Abort;
                }
                let factor = 1u32 << (attempt.saturating_sub(1)).min(16);
                RecoveryAction::RetryAfter(self.base_backoff.saturating_mul(factor))
            }
            _ => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> RecoveryEngine {
        RecoveryEngine::new(1, 3, Duration::from_millis(100))
    }

    #[test]
    fn test_argument_mismatch_fed_back_once() {
        let err = SupportError::mismatch("speak", "missing required parameter 'text'");
        match engine().handle(&err, 1) {
            RecoveryAction::FeedBack(msg) => {
                assert!(msg.contains("speak"));
                assert!(msg.contains("text"));
            }
            other => panic!("Expected FeedBack, got {:?}", other),
        }
        assert_eq!(engine().handle(&err, 2), RecoveryAction::Abort);
    }

    #[test]
    fn test_busy_is_fed_back() {
        let err = SupportError::Busy("Johnnie".to_string());
        assert!(matches!(engine().handle(&err, 5), RecoveryAction::FeedBack(_)));
    }

    #[test]
    fn test_service_unavailable_backoff_doubles() {
        let err = SupportError::ServiceUnavailable("connection refused".to_string());
        assert_eq!(
            engine().handle(&err, 1),
            RecoveryAction::RetryAfter(Duration::from_millis(100))
        );
        assert_eq!(
            engine().handle(&err, 3),
            RecoveryAction::RetryAfter(Duration::from_millis(400))
        );
        assert_eq!(engine().handle(&err, 4), RecoveryAction::Abort);
    }

    #[test]
    fn test_protocol_error_aborts() {
        let err = SupportError::ProtocolError("not json".to_string());
        assert_eq!(engine().handle(&err, 1), RecoveryAction::Abort);
    }

    #[test]
    fn test_timeout_and_cancel_abort() {
        assert_eq!(
            engine().handle(&SupportError::Timeout("rounds".into()), 1),
            RecoveryAction::Abort
        );
        assert_eq!(engine().handle(&SupportError::Cancelled, 1), RecoveryAction::Abort);
    }
}
