//! 工具箱：参数声明、注册表、执行器与内置工具（感知查询 / 语音 / 注视 / 物理动作）

pub mod context;
pub mod executor;
pub mod manipulation;
pub mod perception;
pub mod registry;
pub mod schema;
pub mod speech;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::ToolContext;
pub use executor::ToolExecutor;
pub use manipulation::{
    HandOverTool, LookAtTool, MoveObjectAwayTool, MoveObjectToPersonTool, PointAtTool, PourIntoTool, PutDownTool,
};
pub use perception::{
    BusyOrIdleTool, CanReachTool, CanSeeTool, GetObjectsTool, GetPersonsTool, HeldObjectsTool, HinderingReasonsTool,
    RobotReachTool,
};
pub use registry::{Tool, ToolCall, ToolDescription, ToolKind, ToolRegistry};
pub use schema::{reply_schema_json, ParamSpec, ParamType, ReplyFormat};
pub use speech::SpeakTool;

/// 注册全部内置工具（进程启动时调用一次）
pub fn builtin_registry() -> Result<ToolRegistry, crate::core::SupportError> {
    let mut registry = ToolRegistry::new();
    registry.register(GetObjectsTool)?;
    registry.register(GetPersonsTool)?;
    registry.register(BusyOrIdleTool)?;
    registry.register(CanSeeTool)?;
    registry.register(CanReachTool)?;
    registry.register(HinderingReasonsTool)?;
    registry.register(RobotReachTool)?;
    registry.register(HeldObjectsTool)?;
    registry.register(LookAtTool)?;
    registry.register(SpeakTool)?;
    registry.register(HandOverTool)?;
    registry.register(MoveObjectToPersonTool)?;
    registry.register(MoveObjectAwayTool)?;
    registry.register(PointAtTool)?;
    registry.register(PourIntoTool)?;
    registry.register(PutDownTool)?;
    Ok(registry)
}
