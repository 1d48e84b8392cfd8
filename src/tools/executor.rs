//! 工具执行器
//!
//! 持有 ToolRegistry，resolve(name, args) 先按声明校验参数，execute(call, ctx) 调用工具；
//! 每次执行输出结构化审计日志（JSON）。单步墙钟上限由执行分发器施加。

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::core::SupportError;
use crate::tools::{Tool, ToolCall, ToolContext, ToolDescription, ToolRegistry};

/// 工具执行器：注册表的只读视图 + 审计日志
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// 校验并绑定调用；未知工具返回 NotFound，参数不符返回 ArgumentMismatch
    pub fn resolve(&self, tool_name: &str, args: &Value) -> Result<ToolCall, SupportError> {
        self.registry.resolve(tool_name, args)
    }

    /// 执行已绑定的调用；输出 JSON 审计日志
    pub async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let tool = self
            .registry
            .get(&call.tool)
            .ok_or_else(|| SupportError::not_found("tool", &call.tool))?;
        let start = Instant::now();
        let result = tool.execute(call, ctx).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(SupportError::Cancelled) => "cancelled",
            Err(SupportError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": call.tool,
            "kind": call.kind,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&Value::Object(call.args.clone())),
        });
        tracing::info!(audit = %audit.to_string(), "tool");
        result
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn describe_all(&self) -> Vec<ToolDescription> {
        self.registry.describe_all()
    }

    /// 工具目录 JSON（拼入 system prompt）
    pub fn catalog_json(&self) -> String {
        self.registry.to_schema_json()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
