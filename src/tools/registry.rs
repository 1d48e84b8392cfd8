//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / kind / parameters / execute），在进程启动时静态注册；
//! 注册时校验声明（重名、参数重名、参数缺说明），resolve 在执行前按声明校验参数并绑定为 ToolCall。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::SupportError;
use crate::tools::schema::{parameters_json_schema, ParamSpec};
use crate::tools::ToolContext;

/// 工具类别：感知查询无副作用；语音只说话；注视与物理动作都经执行分发器执行，但只有物理动作算介入
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Perception,
    Speech,
    Gaze,
    Physical,
}

impl ToolKind {
    /// 是否需要经执行分发器驱动机器人
    pub fn is_dispatched(self) -> bool {
        matches!(self, ToolKind::Gaze | ToolKind::Physical)
    }
}

/// 工具 trait：名称、描述（供推理服务理解）、参数声明、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段）
    fn name(&self) -> &str;

    /// 工具描述（供推理服务理解功能）
    fn description(&self) -> &str;

    fn kind(&self) -> ToolKind {
        ToolKind::Perception
    }

    /// 参数声明；默认无参数
    fn parameters(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    /// 执行已通过校验的调用
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError>;
}

/// 已解析、已校验的工具调用
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolCall {
    pub tool: String,
    pub args: serde_json::Map<String, Value>,
    /// 绑定到的工具类别
    pub kind: ToolKind,
}

impl ToolCall {
    /// 取字符串参数（resolve 已保证必填参数存在且类型正确）
    pub fn str_arg(&self, name: &str) -> Result<&str, SupportError> {
        self.args
            .get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| SupportError::mismatch(&self.tool, format!("missing parameter '{name}'")))
    }

    pub fn opt_str_arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).and_then(Value::as_str)
    }

    /// 形如 hand_object_over_to_person(object_name="red_glass", person_name="Felix")
    pub fn signature(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{}({})", self.tool, args.join(", "))
    }
}

/// 对外公布的工具描述
#[derive(Clone, Debug, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    pub parameters: Value,
}

struct Entry {
    tool: Arc<dyn Tool>,
    params: Vec<ParamSpec>,
}

/// 工具注册表：按注册顺序保存，支持 register / describe_all / resolve / get
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名返回 Conflict，声明不完整返回 ArgumentMismatch
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), SupportError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(SupportError::Conflict(format!("tool '{name}' is already registered")));
        }
        if tool.description().trim().is_empty() {
            return Err(SupportError::mismatch(&name, "tool has no description"));
        }
        let params = tool.parameters();
        let mut seen = HashSet::new();
        for p in &params {
            if !seen.insert(p.name.as_str()) {
                return Err(SupportError::mismatch(
                    &name,
                    format!("parameter '{}' is declared twice", p.name),
                ));
            }
            if p.description.trim().is_empty() {
                return Err(SupportError::mismatch(
                    &name,
                    format!("parameter '{}' is not documented", p.name),
                ));
            }
        }
        tracing::debug!(tool = %name, params = params.len(), "tool registered");
        self.order.push(name.clone());
        self.tools.insert(
            name,
            Entry {
                tool: Arc::new(tool),
                params,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|e| Arc::clone(&e.tool))
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 按注册顺序返回所有工具描述（供推理桥公布给推理服务）
    pub fn describe_all(&self) -> Vec<ToolDescription> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|e| (name, e)))
            .map(|(name, e)| ToolDescription {
                name: name.clone(),
                description: e.tool.description().to_string(),
                kind: e.tool.kind(),
                parameters: parameters_json_schema(&e.params),
            })
            .collect()
    }

    /// 工具目录 JSON（拼入 system prompt）
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.describe_all()).unwrap_or_else(|_| "[]".to_string())
    }

    /// 按声明校验参数名与类型，成功则绑定为 ToolCall
    pub fn resolve(&self, name: &str, raw_args: &Value) -> Result<ToolCall, SupportError> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| SupportError::not_found("tool", name))?;

        let args = match raw_args {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map.clone(),
            // 有的模型把 arguments 编码成字符串
            Value::String(s) if s.trim_start().starts_with('{') => serde_json::from_str(s)
                .map_err(|e| SupportError::mismatch(name, format!("arguments are not a JSON object: {e}")))?,
            other => {
                return Err(SupportError::mismatch(
                    name,
                    format!("arguments must be a JSON object, got {other}"),
                ))
            }
        };

        for key in args.keys() {
            if !entry.params.iter().any(|p| &p.name == key) {
                let known: Vec<&str> = entry.params.iter().map(|p| p.name.as_str()).collect();
                return Err(SupportError::mismatch(
                    name,
                    format!("unknown parameter '{key}' (expected: [{}])", known.join(", ")),
                ));
            }
        }
        for p in &entry.params {
            match args.get(&p.name) {
                Some(Value::Null) | None if p.required => {
                    return Err(SupportError::mismatch(
                        name,
                        format!("missing required parameter '{}'", p.name),
                    ));
                }
                Some(Value::Null) | None => {}
                Some(value) => p.check(value).map_err(|reason| SupportError::mismatch(name, reason))?,
            }
        }

        Ok(ToolCall {
            tool: name.to_string(),
            args,
            kind: entry.tool.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubTool(&'static str, Vec<ParamSpec>);

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "Stub tool for tests."
        }
        fn parameters(&self) -> Vec<ParamSpec> {
            self.1.clone()
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<String, SupportError> {
            Ok(call.signature())
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(StubTool(
            "can_person_reach_object",
            vec![
                ParamSpec::string("person_name", "The person."),
                ParamSpec::string("object_name", "The object."),
            ],
        ))
        .unwrap();
        r.register(StubTool("get_objects", vec![])).unwrap();
        r
    }

    #[test]
    fn test_register_duplicate_conflicts() {
        let mut r = registry();
        let err = r.register(StubTool("get_objects", vec![])).unwrap_err();
        assert!(matches!(err, SupportError::Conflict(_)));
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn test_register_rejects_undocumented_param() {
        let mut r = ToolRegistry::new();
        let err = r
            .register(StubTool("bad", vec![ParamSpec::string("x", "")]))
            .unwrap_err();
        assert!(matches!(err, SupportError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_describe_all_keeps_registration_order() {
        let names: Vec<String> = registry().describe_all().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["can_person_reach_object", "get_objects"]);
    }

    #[test]
    fn test_resolve_valid_call() {
        let call = registry()
            .resolve(
                "can_person_reach_object",
                &serde_json::json!({"person_name": "Daniel", "object_name": "red_glass"}),
            )
            .unwrap();
        assert_eq!(call.str_arg("person_name").unwrap(), "Daniel");
        assert_eq!(call.kind, ToolKind::Perception);
    }

    #[test]
    fn test_resolve_unknown_tool() {
        let err = registry().resolve("fly_away", &Value::Null).unwrap_err();
        assert!(matches!(err, SupportError::NotFound(_)));
    }

    #[test]
    fn test_resolve_missing_and_unknown_params() {
        let r = registry();
        let missing = r
            .resolve("can_person_reach_object", &serde_json::json!({"person_name": "Daniel"}))
            .unwrap_err();
        assert!(missing.to_string().contains("object_name"));

        let unknown = r
            .resolve(
                "can_person_reach_object",
                &serde_json::json!({"person_name": "Daniel", "object_name": "cup", "speed": "fast"}),
            )
            .unwrap_err();
        assert!(unknown.to_string().contains("speed"));
    }

    #[test]
    fn test_resolve_wrong_type() {
        let err = registry()
            .resolve(
                "can_person_reach_object",
                &serde_json::json!({"person_name": 7, "object_name": "cup"}),
            )
            .unwrap_err();
        assert!(matches!(err, SupportError::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_resolve_accepts_stringified_arguments() {
        let call = registry()
            .resolve(
                "can_person_reach_object",
                &Value::String(r#"{"person_name": "Felix", "object_name": "cup"}"#.to_string()),
            )
            .unwrap();
        assert_eq!(call.str_arg("object_name").unwrap(), "cup");
    }
}
