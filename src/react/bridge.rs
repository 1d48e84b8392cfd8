//! 推理桥：把对话历史、场景摘要、工具目录与回复格式交给推理服务，取回一轮决策
//!
//! 服务不可用时按 RecoveryEngine 退避重试；协议错误不重试。推理桥只提议调用，从不执行。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::{RecoveryAction, RecoveryEngine, SupportError};
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::react::planner::{parse_llm_output, RawDecision};
use crate::tools::reply_schema_json;

/// 一次 decide 的输入
pub struct DecisionRequest<'a> {
    pub history: &'a [Message],
    pub scene_summary: &'a str,
    /// 决策内工作记忆（已尝试 / 失败）
    pub notes: &'a str,
}

/// 一轮推理结果与原始回复（原始回复写回对话）
#[derive(Debug, Clone)]
pub struct Proposal {
    pub decision: RawDecision,
    pub raw: String,
}

pub struct ReasoningBridge {
    llm: Arc<dyn LlmClient>,
    recovery: RecoveryEngine,
    character: String,
    catalog: String,
    reply_schema: String,
}

impl ReasoningBridge {
    pub fn new(llm: Arc<dyn LlmClient>, recovery: RecoveryEngine, robot: &str, catalog: String) -> Self {
        Self {
            llm,
            recovery,
            character: character_prompt(robot),
            catalog,
            reply_schema: reply_schema_json(),
        }
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub fn system_prompt(&self, request: &DecisionRequest<'_>) -> String {
        let mut system = format!(
            "{}\n\n## Tools\n{}\n\n## Reply format\n\
             Reply with plain text when no tool is needed. To use tools reply with JSON only, \
             either {{\"tool\": name, \"args\": {{...}}}} or {{\"calls\": [...]}} for several calls in order, \
             matching this schema:\n{}\n\n{}",
            self.character, self.catalog, self.reply_schema, request.scene_summary
        );
        if !request.notes.is_empty() {
            system.push_str("\n\n");
            system.push_str(request.notes);
        }
        system
    }

    /// 调用推理服务一次（含服务不可用时的退避重试）；中断时返回 Cancelled
    pub async fn decide(
        &self,
        request: DecisionRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Proposal, SupportError> {
        let mut messages = vec![Message::system(self.system_prompt(&request))];
        messages.extend_from_slice(request.history);

        let mut attempt = 0u32;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SupportError::Cancelled),
                r = self.llm.complete(&messages) => r,
            };
            let err: SupportError = match result {
                Ok(raw) => {
                    let decision = parse_llm_output(&raw)?;
                    return Ok(Proposal { decision, raw });
                }
                Err(e) => e.into(),
            };
            attempt += 1;
            match self.recovery.handle(&err, attempt) {
                RecoveryAction::RetryAfter(backoff) => {
                    tracing::warn!(attempt, backoff_ms = backoff.as_millis() as u64, error = %err, "reasoning service retry");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(SupportError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                _ => return Err(err),
            }
        }
    }
}

/// 机器人角色与介入原则
fn character_prompt(robot: &str) -> String {
    format!(
        "You are a friendly, attentive and unobtrusive service robot named {robot}. \
         You are standing at a table together with some persons and you overhear their conversation. \
         Lines look like \"Speaker -> Addressee: text\"; lines from \"User\" are commands addressed to you.\n\
         Support the persons only when they need it: if the addressed person can see the object, can reach it \
         and is not busy, they can help themselves and you stay passive. If the person is hindered (cannot see it, \
         cannot reach it, or is busy), help by acting yourself. Use the perception tools to check this before you act. \
         You only know what the tools tell you; never invent names of objects or persons.\n\
         When you stay passive, reply with a short plain-text note that is not spoken aloud. \
         Use the speak tool for anything the persons should hear."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, ScriptedLlmClient};
    use std::time::Duration;

    fn bridge(llm: Arc<ScriptedLlmClient>) -> ReasoningBridge {
        ReasoningBridge::new(
            llm,
            RecoveryEngine::new(1, 2, Duration::from_millis(1)),
            "Johnnie",
            "[]".to_string(),
        )
    }

    fn request(history: &[Message]) -> DecisionRequest<'_> {
        DecisionRequest {
            history,
            scene_summary: "## Scene\n- Felix (human): idle\n",
            notes: "## Current utterance\nFelix -> Daniel: hi\n",
        }
    }

    #[tokio::test]
    async fn test_system_prompt_carries_context() {
        let llm = Arc::new(ScriptedLlmClient::new(["ok"]));
        let b = bridge(llm.clone());
        let history = vec![Message::user("Felix -> Daniel: hi")];
        b.decide(request(&history), &CancellationToken::new()).await.unwrap();
        let sent = llm.request(0).unwrap();
        assert!(sent[0].content.contains("named Johnnie"));
        assert!(sent[0].content.contains("## Scene"));
        assert!(sent[0].content.contains("## Current utterance"));
        assert_eq!(sent[1].content, "Felix -> Daniel: hi");
    }

    #[tokio::test]
    async fn test_retries_unavailable_then_succeeds() {
        let llm = Arc::new(ScriptedLlmClient::with_results(vec![
            Err(LlmError::Unavailable("503".into())),
            Err(LlmError::RateLimited("429".into())),
            Ok("No need to help.".to_string()),
        ]));
        let b = bridge(llm.clone());
        let proposal = b.decide(request(&[]), &CancellationToken::new()).await.unwrap();
        assert_eq!(proposal.decision, RawDecision::Answer("No need to help.".into()));
        assert_eq!(llm.request_count(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_service_retries() {
        let llm = Arc::new(ScriptedLlmClient::with_results(
            (0..5).map(|_| Err(LlmError::Unavailable("down".into()))),
        ));
        let b = bridge(llm.clone());
        let err = b.decide(request(&[]), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SupportError::ServiceUnavailable(_)));
        assert_eq!(llm.request_count(), 3);
    }

    #[tokio::test]
    async fn test_protocol_error_not_retried() {
        let llm = Arc::new(ScriptedLlmClient::new([r#"{"tool": "#, "unused"]));
        let b = bridge(llm.clone());
        let err = b.decide(request(&[]), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SupportError::ProtocolError(_)));
        assert_eq!(llm.request_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let llm = Arc::new(ScriptedLlmClient::new(["ok"]));
        let b = bridge(llm);
        let token = CancellationToken::new();
        token.cancel();
        let err = b.decide(request(&[]), &token).await.unwrap_err();
        assert_eq!(err, SupportError::Cancelled);
    }
}
