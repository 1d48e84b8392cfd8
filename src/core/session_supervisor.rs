//! 会话监管：中断信号
//!
//! 每次决策开始时领取一个新的 CancellationToken；外部中断（mid-action stop）取消当前 token，
//! 不影响之后排队的话语。

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

/// 中断管理：持有当前决策的取消令牌
#[derive(Debug, Default)]
pub struct SessionSupervisor {
    current: Mutex<Option<CancellationToken>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为新决策创建取消令牌（替换上一个）
    pub fn begin_decision(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(token.clone());
        }
        token
    }

    /// 决策结束后释放令牌，之后的中断不再作用于它
    pub fn end_decision(&self) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }
    }

    /// 触发中断；返回是否有正在进行的决策被取消
    pub fn interrupt(&self) -> bool {
        let Ok(guard) = self.current.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(token) => {
                tracing::info!("interrupt signal received, cancelling active decision");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.current
            .lock()
            .map(|g| g.is_some())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_cancels_active_token_only() {
        let supervisor = SessionSupervisor::new();
        assert!(!supervisor.interrupt());

        let first = supervisor.begin_decision();
        assert!(supervisor.interrupt());
        assert!(first.is_cancelled());

        supervisor.end_decision();
        let second = supervisor.begin_decision();
        assert!(!second.is_cancelled());
    }
}
