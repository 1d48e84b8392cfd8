//! 语音工具：机器人对某人或所有人说话（语音合成不在本 crate 内，这里只记录）

use async_trait::async_trait;

use crate::core::SupportError;
use crate::tools::context::require_person;
use crate::tools::{ParamSpec, Tool, ToolCall, ToolContext, ToolKind};

/// 对所有人说话时使用的收件人名
pub const EVERYONE: &str = "All";

pub struct SpeakTool;

#[async_trait]
impl Tool for SpeakTool {
    fn name(&self) -> &str {
        "speak"
    }

    fn description(&self) -> &str {
        "You speak out the given text to a person, or to everybody when the person is \"All\"."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Speech
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string(
                "person_name",
                "The name of the person to speak to. Use \"All\" to address everybody.",
            ),
            ParamSpec::string("text", "The text to be spoken."),
        ]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let person = call.str_arg("person_name")?;
        let text = call.str_arg("text")?;
        if person != EVERYONE {
            let scene = ctx.scene.read().await;
            require_person(&scene, person)?;
        }
        tracing::info!(target: "speech", robot = %ctx.robot, to = person, text, "speak");
        Ok(format!("You said to {person}: {text}"))
    }
}
