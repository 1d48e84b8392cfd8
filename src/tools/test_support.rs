//! 单元测试共用：演示场景 + 加速仿真执行器构成的工具上下文

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::dispatch::{ExecutionDispatcher, SimulatedExecutor};
use crate::scene::{shared, SceneLayout, SceneModel};
use crate::tools::{ToolCall, ToolContext, ToolKind};

pub fn context() -> ToolContext {
    let scene = shared(SceneModel::new(SceneLayout::table_demo("Johnnie")).unwrap());
    let executor = Arc::new(SimulatedExecutor::new(scene.clone(), 1000.0));
    ToolContext {
        scene,
        dispatcher: Arc::new(ExecutionDispatcher::new(executor)),
        robot: "Johnnie".to_string(),
        cancel: CancellationToken::new(),
        step_timeout: Duration::from_secs(5),
    }
}

/// 直接构造调用（绕过 resolve），用于单个工具的测试
pub fn call(tool: &str, args: &[(&str, &str)]) -> ToolCall {
    ToolCall {
        tool: tool.to_string(),
        args: args
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect(),
        kind: ToolKind::Perception,
    }
}
