//! 工具执行上下文：共享场景、执行分发器、机器人名、当前决策的取消令牌与单步墙钟上限

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::SupportError;
use crate::dispatch::{ActionOutcome, ExecutionDispatcher, PhysicalAction, Primitive};
use crate::scene::{EntityKind, SceneModel, SharedScene};

/// 取消后等待执行器确认停止的上限
const CANCEL_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ToolContext {
    pub scene: SharedScene,
    pub dispatcher: Arc<ExecutionDispatcher>,
    /// 执行物理动作的机器人 id
    pub robot: String,
    pub cancel: CancellationToken,
    pub step_timeout: Duration,
}

impl ToolContext {
    /// 以机器人为执行者提交动作并挂起等待；中断时取消在途动作，结果记为 Cancelled
    pub async fn run_action(&self, steps: Vec<Primitive>) -> Result<ActionOutcome, SupportError> {
        if self.cancel.is_cancelled() {
            return Err(SupportError::Cancelled);
        }
        let handle = self
            .dispatcher
            .submit(PhysicalAction::new(self.robot.clone(), steps))?;

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.dispatcher.cancel(&handle);
                let settled = self.dispatcher.wait_timeout(&handle, CANCEL_GRACE).await;
                tracing::info!(
                    id = %handle.id(),
                    settled = ?settled.as_ref().map(ActionOutcome::label).ok(),
                    "action stopped by interrupt"
                );
                return Err(SupportError::Cancelled);
            }
            result = self.dispatcher.wait_timeout(&handle, self.step_timeout) => result?,
        };
        match outcome {
            ActionOutcome::Cancelled => Err(SupportError::Cancelled),
            other => Ok(other),
        }
    }
}

/// 校验名称属于给定类别；否则返回带候选名单的 NotFound
pub fn require_entity(scene: &SceneModel, name: &str, kinds: &[EntityKind]) -> Result<(), SupportError> {
    if scene.kind_of(name).is_some_and(|k| kinds.contains(&k)) {
        return Ok(());
    }
    let label = match kinds {
        [EntityKind::Object] => "object",
        [EntityKind::Human] => "person",
        _ => "entity",
    };
    let candidates: Vec<String> = scene
        .snapshot()
        .entities
        .into_iter()
        .filter(|e| kinds.contains(&e.kind))
        .map(|e| e.id)
        .collect();
    Err(SupportError::NotFound(format!(
        "There is no {label} with the name {name} in the scene. Did you mean one of these: [{}]?",
        candidates.join(", ")
    )))
}

pub fn require_object(scene: &SceneModel, name: &str) -> Result<(), SupportError> {
    require_entity(scene, name, &[EntityKind::Object])
}

pub fn require_person(scene: &SceneModel, name: &str) -> Result<(), SupportError> {
    require_entity(scene, name, &[EntityKind::Human])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneLayout;

    #[test]
    fn test_require_object_lists_candidates() {
        let scene = SceneModel::new(SceneLayout::table_demo("Johnnie")).unwrap();
        assert!(require_object(&scene, "red_glass").is_ok());
        let err = require_object(&scene, "green_glass").unwrap_err().to_string();
        assert!(err.contains("no object with the name green_glass"));
        assert!(err.contains("red_glass"));
        assert!(!err.contains("Felix"));
        assert!(require_person(&scene, "red_glass").is_err());
    }
}
