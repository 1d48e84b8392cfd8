//! 推理服务回复解析
//!
//! 纯文本即直接回答；JSON（可包在 ```json 代码块中）按 ReplyFormat 解析为一个或多个拟调用；
//! 看起来是 JSON 却不符合格式的回复是协议错误，不重试。

use serde::Serialize;
use serde_json::Value;

use crate::core::SupportError;
use crate::tools::schema::{CallFormat, ReplyFormat};

/// 推理服务提议的调用（尚未校验）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposedCall {
    pub tool: String,
    pub args: Value,
}

impl From<CallFormat> for ProposedCall {
    fn from(c: CallFormat) -> Self {
        Self {
            tool: c.tool,
            args: c.args,
        }
    }
}

/// 一轮推理的结果
#[derive(Debug, Clone, PartialEq)]
pub enum RawDecision {
    /// 最终回答（或机器人的内心独白）
    Answer(String),
    /// 按顺序执行的调用
    Calls(Vec<ProposedCall>),
}

/// 取出 JSON 部分；None 表示纯文本
fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    if text.starts_with('{') {
        return Some(text);
    }
    // 前面带一句说明、后面跟调用 JSON 的情况
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    let candidate = &text[start..=end];
    let looks_like_call = ["\"tool\"", "\"calls\"", "\"answer\""]
        .iter()
        .any(|key| candidate.contains(key));
    looks_like_call.then_some(candidate)
}

pub fn parse_llm_output(output: &str) -> Result<RawDecision, SupportError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(SupportError::ProtocolError("empty response".to_string()));
    }
    let Some(json_str) = extract_json(trimmed) else {
        return Ok(RawDecision::Answer(trimmed.to_string()));
    };

    let reply: ReplyFormat = serde_json::from_str(json_str)
        .map_err(|e| SupportError::ProtocolError(format!("{e}: {json_str}")))?;

    let calls: Vec<ProposedCall> = match reply {
        ReplyFormat::Answer(a) => return Ok(RawDecision::Answer(a.answer.trim().to_string())),
        ReplyFormat::Call(c) => vec![c.into()],
        ReplyFormat::Batch(b) => b.calls.into_iter().map(Into::into).collect(),
    };
    if calls.is_empty() {
        return Err(SupportError::ProtocolError("empty call list".to_string()));
    }
    if let Some(blank) = calls.iter().find(|c| c.tool.trim().is_empty()) {
        return Err(SupportError::ProtocolError(format!("call without tool name: {}", blank.args)));
    }
    Ok(RawDecision::Calls(calls))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_answer() {
        assert_eq!(
            parse_llm_output("Daniel can answer that himself.").unwrap(),
            RawDecision::Answer("Daniel can answer that himself.".into())
        );
    }

    #[test]
    fn test_single_call() {
        let decision = parse_llm_output(r#"{"tool": "get_objects", "args": {}}"#).unwrap();
        assert_eq!(
            decision,
            RawDecision::Calls(vec![ProposedCall {
                tool: "get_objects".into(),
                args: serde_json::json!({}),
            }])
        );
    }

    #[test]
    fn test_fenced_batch_keeps_order() {
        let output = "Let me help.\n```json\n{\"calls\": [\
            {\"tool\": \"look_at\", \"args\": {\"name\": \"Felix\"}},\
            {\"tool\": \"hand_object_over_to_person\", \"args\": {\"object_name\": \"red_glass\", \"person_name\": \"Felix\"}}\
            ]}\n```";
        match parse_llm_output(output).unwrap() {
            RawDecision::Calls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls[0].tool, "look_at");
                assert_eq!(calls[1].tool, "hand_object_over_to_person");
            }
            other => panic!("Expected Calls, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_args_defaults_to_null() {
        match parse_llm_output(r#"{"tool": "get_persons"}"#).unwrap() {
            RawDecision::Calls(calls) => assert!(calls[0].args.is_null()),
            other => panic!("Expected Calls, got {:?}", other),
        }
    }

    #[test]
    fn test_json_answer() {
        assert_eq!(
            parse_llm_output(r#"{"answer": "Nothing to do."}"#).unwrap(),
            RawDecision::Answer("Nothing to do.".into())
        );
    }

    #[test]
    fn test_malformed_json_is_protocol_error() {
        assert!(matches!(
            parse_llm_output(r#"{"tool": "get_objects", "args": "#),
            Err(SupportError::ProtocolError(_))
        ));
        assert!(matches!(
            parse_llm_output(r#"{"command": "dance"}"#),
            Err(SupportError::ProtocolError(_))
        ));
        assert!(matches!(parse_llm_output("   "), Err(SupportError::ProtocolError(_))));
        assert!(matches!(
            parse_llm_output(r#"{"calls": []}"#),
            Err(SupportError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_braces_in_prose_stay_prose() {
        assert!(matches!(
            parse_llm_output("I would say {hello} to them."),
            Ok(RawDecision::Answer(_))
        ));
    }
}
