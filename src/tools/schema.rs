//! 参数声明与调用格式 Schema（schemars 自动生成调用格式的 JSON Schema）
//!
//! ParamSpec 是工具参数的静态声明（类型、是否必填、取值约束、说明）；
//! ReplyFormat 描述推理服务可返回的合法 JSON（单次调用 / 批量调用 / 直接回答），会拼入 system prompt。

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 参数类型（只支持简单类型）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
}

impl ParamType {
    pub fn json_name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
        }
    }
}

/// 单个参数声明
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub description: String,
    pub ty: ParamType,
    pub required: bool,
    /// 可选的取值白名单
    pub one_of: Option<Vec<String>>,
}

impl ParamSpec {
    pub fn new(name: &str, ty: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            ty,
            required: true,
            one_of: None,
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.one_of = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    /// 校验单个取值；返回失败原因
    pub fn check(&self, value: &Value) -> Result<(), String> {
        if !self.ty.accepts(value) {
            return Err(format!(
                "parameter '{}' must be of type {}, got {}",
                self.name,
                self.ty.json_name(),
                value
            ));
        }
        if let Some(s) = value.as_str() {
            if self.required && s.trim().is_empty() {
                return Err(format!("parameter '{}' must not be empty", self.name));
            }
            if let Some(allowed) = &self.one_of {
                if !allowed.iter().any(|a| a == s) {
                    return Err(format!(
                        "parameter '{}' must be one of [{}], got '{}'",
                        self.name,
                        allowed.join(", "),
                        s
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 由参数声明生成 OpenAI 风格的 parameters JSON Schema
pub fn parameters_json_schema(params: &[ParamSpec]) -> Value {
    let properties: serde_json::Map<String, Value> = params
        .iter()
        .map(|p| {
            let mut prop = serde_json::json!({
                "type": p.ty.json_name(),
                "description": p.description,
            });
            if let Some(values) = &p.one_of {
                prop["enum"] = serde_json::json!(values);
            }
            (p.name.clone(), prop)
        })
        .collect();
    let required: Vec<&str> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// 单次工具调用：{"tool": "...", "args": {...}}
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct CallFormat {
    /// 工具名，必须出现在工具目录中
    pub tool: String,
    /// 工具参数，键为参数名
    #[serde(default)]
    pub args: Value,
}

/// 按顺序执行的多个调用：{"calls": [...]}
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct BatchFormat {
    pub calls: Vec<CallFormat>,
}

/// 直接回答：{"answer": "..."}
#[derive(Clone, Debug, Deserialize, JsonSchema)]
pub struct AnswerFormat {
    pub answer: String,
}

/// 推理服务每一轮的合法 JSON 回复
#[derive(Clone, Debug, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ReplyFormat {
    Batch(BatchFormat),
    Call(CallFormat),
    Answer(AnswerFormat),
}

/// 返回回复格式的 JSON Schema 字符串，可拼入 system prompt
pub fn reply_schema_json() -> String {
    let schema = schema_for!(ReplyFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| String::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_type_and_enum() {
        let p = ParamSpec::string("speed", "Grasp speed.").one_of(&["slow", "fast"]);
        assert!(p.check(&serde_json::json!("slow")).is_ok());
        assert!(p.check(&serde_json::json!("medium")).unwrap_err().contains("one of"));
        assert!(p.check(&serde_json::json!(3)).unwrap_err().contains("type string"));
    }

    #[test]
    fn test_parameters_json_schema_lists_required() {
        let schema = parameters_json_schema(&[
            ParamSpec::string("object_name", "The object."),
            ParamSpec::new("count", ParamType::Integer, "How many.").optional(),
        ]);
        assert_eq!(schema["required"], serde_json::json!(["object_name"]));
        assert_eq!(schema["properties"]["count"]["type"], "integer");
    }

    #[test]
    fn test_reply_schema_mentions_all_shapes() {
        let schema = reply_schema_json();
        assert!(schema.contains("calls"));
        assert!(schema.contains("tool"));
        assert!(schema.contains("answer"));
    }
}
