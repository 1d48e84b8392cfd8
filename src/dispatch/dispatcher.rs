//! 执行分发器
//!
//! submit 把物理动作交给外部执行器（后台任务中运行），返回 ActionHandle；wait / wait_timeout 挂起等待结果；
//! cancel 尽力而为，动作已自然结束时为 no-op。同一执行者同一时刻最多一个在途动作，第二次提交直接返回 Busy。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::core::SupportError;
use crate::dispatch::{ActionId, ActionOutcome, PhysicalAction};

/// 外部执行器（仿真 / 真实机器人）的命令接口：执行一个动作，需响应 cancel
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn perform(&self, action: &PhysicalAction, cancel: CancellationToken) -> ActionOutcome;
}

/// 在途动作句柄：可克隆，wait 与 cancel 可在不同任务中使用
#[derive(Clone, Debug)]
pub struct ActionHandle {
    id: ActionId,
    actor: String,
    token: CancellationToken,
    result: watch::Receiver<Option<ActionOutcome>>,
}

impl ActionHandle {
    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// 已结束时返回结果，不阻塞
    pub fn try_outcome(&self) -> Option<ActionOutcome> {
        self.result.borrow().clone()
    }
}

/// 执行分发器：按执行者登记在途动作
pub struct ExecutionDispatcher {
    executor: Arc<dyn ActionExecutor>,
    /// 执行者 -> 在途动作
    in_flight: Arc<Mutex<HashMap<String, (ActionId, CancellationToken)>>>,
}

impl ExecutionDispatcher {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self {
            executor,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 提交动作；该执行者已有在途动作时返回 Busy（不排队）
    pub fn submit(&self, action: PhysicalAction) -> Result<ActionHandle, SupportError> {
        let id = ActionId::new();
        let token = CancellationToken::new();
        {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| SupportError::Busy(action.actor.clone()))?;
            if in_flight.contains_key(&action.actor) {
                tracing::warn!(actor = %action.actor, "rejecting action: actor already busy");
                return Err(SupportError::Busy(action.actor.clone()));
            }
            in_flight.insert(action.actor.clone(), (id, token.clone()));
        }

        let (tx, rx) = watch::channel(None);
        let handle = ActionHandle {
            id,
            actor: action.actor.clone(),
            token: token.clone(),
            result: rx,
        };

        let executor = Arc::clone(&self.executor);
        let in_flight = Arc::clone(&self.in_flight);
        tracing::info!(%id, actor = %action.actor, command = %action.command(), "action submitted");
        tokio::spawn(async move {
            let start = Instant::now();
            let actor = action.actor.clone();
            let run = tokio::spawn(async move { executor.perform(&action, token).await });
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => ActionOutcome::Failed(format!("executor task failed: {e}")),
            };
            // 先释放执行者，再发布结果：wait 返回后即可提交下一个动作
            if let Ok(mut map) = in_flight.lock() {
                if map.get(&actor).is_some_and(|(current, _)| *current == id) {
                    map.remove(&actor);
                }
            }
            tracing::info!(
                %id,
                actor = %actor,
                outcome = outcome.label(),
                duration_ms = start.elapsed().as_millis() as u64,
                "action settled"
            );
            let _ = tx.send(Some(outcome));
        });

        Ok(handle)
    }

    /// 挂起直到动作结束（成功 / 失败 / 取消）
    pub async fn wait(&self, handle: &ActionHandle) -> ActionOutcome {
        let mut rx = handle.result.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return outcome;
            }
            if rx.changed().await.is_err() {
                return rx
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| ActionOutcome::Failed("executor dropped the action".to_string()));
            }
        }
    }

    /// 带墙钟上限的等待；超时则取消动作并返回 Timeout
    pub async fn wait_timeout(&self, handle: &ActionHandle, limit: Duration) -> Result<ActionOutcome, SupportError> {
        match timeout(limit, self.wait(handle)).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                tracing::warn!(id = %handle.id, actor = %handle.actor, "action exceeded step timeout, cancelling");
                self.cancel(handle);
                Err(SupportError::Timeout(format!(
                    "action on '{}' exceeded {}s",
                    handle.actor,
                    limit.as_secs_f32()
                )))
            }
        }
    }

    /// 尽力取消；动作已结束时无效果
    pub fn cancel(&self, handle: &ActionHandle) {
        if handle.try_outcome().is_none() {
            tracing::info!(id = %handle.id, actor = %handle.actor, "cancelling action");
        }
        handle.token.cancel();
    }

    /// 取消所有在途动作（外部中断）
    pub fn cancel_all(&self) {
        if let Ok(map) = self.in_flight.lock() {
            for (actor, (id, token)) in map.iter() {
                tracing::info!(%id, actor = %actor, "cancelling action");
                token.cancel();
            }
        }
    }

    pub fn in_flight(&self, actor: &str) -> bool {
        self.in_flight
            .lock()
            .map(|m| m.contains_key(actor))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Primitive;

    /// 固定时长的执行器，响应取消
    struct SleepyExecutor {
        duration: Duration,
    }

    #[async_trait]
    impl ActionExecutor for SleepyExecutor {
        async fn perform(&self, action: &PhysicalAction, cancel: CancellationToken) -> ActionOutcome {
            tokio::select! {
                _ = cancel.cancelled() => ActionOutcome::Cancelled,
                _ = tokio::time::sleep(self.duration) => ActionOutcome::Success(action.command()),
            }
        }
    }

    fn dispatcher(ms: u64) -> ExecutionDispatcher {
        ExecutionDispatcher::new(Arc::new(SleepyExecutor {
            duration: Duration::from_millis(ms),
        }))
    }

    fn point(actor: &str) -> PhysicalAction {
        PhysicalAction::new(actor, vec![Primitive::Point { target: "Felix".into() }])
    }

    #[tokio::test]
    async fn test_submit_and_wait_success() {
        let d = dispatcher(10);
        let handle = d.submit(point("Johnnie")).unwrap();
        assert_eq!(d.wait(&handle).await, ActionOutcome::Success("point Felix".into()));
        assert!(!d.in_flight("Johnnie"));
    }

    #[tokio::test]
    async fn test_second_submission_for_same_actor_is_busy() {
        let d = dispatcher(200);
        let first = d.submit(point("Johnnie")).unwrap();
        assert!(matches!(d.submit(point("Johnnie")), Err(SupportError::Busy(a)) if a == "Johnnie"));
        // 不同执行者互不影响
        let other = d.submit(point("Robo2")).unwrap();
        d.cancel(&first);
        d.cancel(&other);
        assert_eq!(d.wait(&first).await, ActionOutcome::Cancelled);
        // 结束后可以再次提交
        assert!(d.submit(point("Johnnie")).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_settles_cancelled() {
        let d = dispatcher(10_000);
        let handle = d.submit(point("Johnnie")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        d.cancel(&handle);
        let outcome = d.wait_timeout(&handle, Duration::from_secs(1)).await.unwrap();
        assert_eq!(outcome, ActionOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let d = dispatcher(5);
        let handle = d.submit(point("Johnnie")).unwrap();
        let outcome = d.wait(&handle).await;
        d.cancel(&handle);
        assert_eq!(d.wait(&handle).await, outcome);
        assert!(matches!(outcome, ActionOutcome::Success(_)));
    }

    #[tokio::test]
    async fn test_wait_timeout_cancels_and_reports_timeout() {
        let d = dispatcher(10_000);
        let handle = d.submit(point("Johnnie")).unwrap();
        let result = d.wait_timeout(&handle, Duration::from_millis(30)).await;
        assert!(matches!(result, Err(SupportError::Timeout(_))));
        assert_eq!(d.wait(&handle).await, ActionOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let d = dispatcher(10_000);
        let handle = d.submit(point("Johnnie")).unwrap();
        d.cancel_all();
        assert_eq!(d.wait(&handle).await, ActionOutcome::Cancelled);
    }
}
