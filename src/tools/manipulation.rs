//! 物理动作与注视工具：由机器人执行，经执行分发器提交，挂起等待结果
//!
//! 执行失败（够不着、手里没有等）作为普通结果回灌给推理服务；被中断时返回 Cancelled，由规划循环终止本次决策。

use async_trait::async_trait;

use crate::core::SupportError;
use crate::dispatch::{ActionOutcome, Primitive};
use crate::scene::EntityKind;
use crate::tools::context::{require_entity, require_object, require_person};
use crate::tools::{ParamSpec, Tool, ToolCall, ToolContext, ToolKind};

fn object_param() -> ParamSpec {
    ParamSpec::string("object_name", "The name of the object.")
}

async fn robot_holds(ctx: &ToolContext, object: &str) -> Result<bool, SupportError> {
    Ok(ctx.scene.read().await.holder_of(object)?.as_deref() == Some(ctx.robot.as_str()))
}

/// 执行动作并把结果转成回灌文本
async fn perform(ctx: &ToolContext, steps: Vec<Primitive>, done: String, attempt: String) -> Result<String, SupportError> {
    match ctx.run_action(steps).await? {
        ActionOutcome::Success(_) => Ok(done),
        ActionOutcome::Failed(reason) => Ok(format!("You were not able to {attempt}: {reason}")),
        ActionOutcome::Cancelled => Err(SupportError::Cancelled),
    }
}

pub struct HandOverTool;

#[async_trait]
impl Tool for HandOverTool {
    fn name(&self) -> &str {
        "hand_object_over_to_person"
    }

    fn description(&self) -> &str {
        "You get the object and hand it over to the person. The person will then hold it."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Physical
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            object_param(),
            ParamSpec::string("person_name", "The name of the person to hand the object over to."),
        ]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let object = call.str_arg("object_name")?;
        let person = call.str_arg("person_name")?;
        {
            let scene = ctx.scene.read().await;
            require_object(&scene, object)?;
            require_person(&scene, person)?;
        }
        let mut steps = Vec::new();
        if !robot_holds(ctx, object).await? {
            steps.push(Primitive::Grasp { object: object.to_string() });
        }
        steps.push(Primitive::HandOver {
            object: object.to_string(),
            person: person.to_string(),
        });
        steps.push(Primitive::DefaultPose);
        perform(
            ctx,
            steps,
            format!("You successfully handed {object} over to {person}."),
            format!("hand {object} over to {person}"),
        )
        .await
    }
}

pub struct MoveObjectToPersonTool;

#[async_trait]
impl Tool for MoveObjectToPersonTool {
    fn name(&self) -> &str {
        "move_object_to_person"
    }

    fn description(&self) -> &str {
        "You get the object and place it on the table close to the person, so the person can reach it."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Physical
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            object_param(),
            ParamSpec::string("person_name", "The name of the person to move the object to."),
        ]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let object = call.str_arg("object_name")?;
        let person = call.str_arg("person_name")?;
        {
            let scene = ctx.scene.read().await;
            require_object(&scene, object)?;
            require_person(&scene, person)?;
        }
        let mut steps = Vec::new();
        if !robot_holds(ctx, object).await? {
            steps.push(Primitive::Grasp { object: object.to_string() });
        }
        steps.push(Primitive::PlaceNear {
            object: object.to_string(),
            target: person.to_string(),
        });
        steps.push(Primitive::DefaultPose);
        perform(
            ctx,
            steps,
            format!("You successfully moved {object} to {person}."),
            format!("move {object} to {person}"),
        )
        .await
    }
}

pub struct MoveObjectAwayTool;

#[async_trait]
impl Tool for MoveObjectAwayTool {
    fn name(&self) -> &str {
        "move_object_away_from_person"
    }

    fn description(&self) -> &str {
        "You move the object away from the person, e.g. when it is in the person's way."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Physical
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            object_param(),
            ParamSpec::string("away_from", "The name of the person to move the object away from."),
        ]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let object = call.str_arg("object_name")?;
        let person = call.str_arg("away_from")?;
        {
            let scene = ctx.scene.read().await;
            require_object(&scene, object)?;
            require_person(&scene, person)?;
        }
        perform(
            ctx,
            vec![
                Primitive::PlaceFar {
                    object: object.to_string(),
                    away_from: person.to_string(),
                },
                Primitive::DefaultPose,
            ],
            format!("You successfully moved {object} away from {person}."),
            format!("move {object} away from {person}"),
        )
        .await
    }
}

pub struct PointAtTool;

#[async_trait]
impl Tool for PointAtTool {
    fn name(&self) -> &str {
        "point_at_object_or_agent"
    }

    fn description(&self) -> &str {
        "You point at an object or an agent, e.g. to show a person where something is."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Physical
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("name", "The name of the object or agent to point at.")]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let target = call.str_arg("name")?;
        {
            let scene = ctx.scene.read().await;
            require_entity(&scene, target, &[EntityKind::Object, EntityKind::Human, EntityKind::Robot])?;
        }
        perform(
            ctx,
            vec![
                Primitive::Point {
                    target: target.to_string(),
                },
                Primitive::DefaultPose,
            ],
            format!("You successfully pointed at {target}."),
            format!("point at {target}"),
        )
        .await
    }
}

pub struct LookAtTool;

#[async_trait]
impl Tool for LookAtTool {
    fn name(&self) -> &str {
        "look_at"
    }

    fn description(&self) -> &str {
        "You look at an object or an agent. Look at a person before you speak to them."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Gaze
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string("name", "The name of the object or agent to look at.")]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let target = call.str_arg("name")?;
        {
            let scene = ctx.scene.read().await;
            require_entity(&scene, target, &[EntityKind::Object, EntityKind::Human, EntityKind::Robot])?;
        }
        perform(
            ctx,
            vec![Primitive::LookAt {
                target: target.to_string(),
            }],
            format!("You are looking at {target}."),
            format!("look at {target}"),
        )
        .await
    }
}

pub struct PourIntoTool;

#[async_trait]
impl Tool for PourIntoTool {
    fn name(&self) -> &str {
        "pour_into"
    }

    fn description(&self) -> &str {
        "You get the source container, pour its content into the target container and put the source container down again."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Physical
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::string("source_container_name", "The name of the container to pour from."),
            ParamSpec::string("target_container_name", "The name of the container to pour into."),
        ]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let source = call.str_arg("source_container_name")?;
        let target = call.str_arg("target_container_name")?;
        {
            let scene = ctx.scene.read().await;
            require_object(&scene, source)?;
            require_object(&scene, target)?;
        }
        let mut steps = Vec::new();
        if !robot_holds(ctx, source).await? {
            steps.push(Primitive::Grasp { object: source.to_string() });
        }
        steps.push(Primitive::Pour {
            source: source.to_string(),
            target: target.to_string(),
        });
        steps.push(Primitive::PutDown { object: source.to_string() });
        steps.push(Primitive::DefaultPose);
        perform(
            ctx,
            steps,
            format!("You successfully poured {source} into {target}."),
            format!("pour {source} into {target}"),
        )
        .await
    }
}

pub struct PutDownTool;

#[async_trait]
impl Tool for PutDownTool {
    fn name(&self) -> &str {
        "put_down_object"
    }

    fn description(&self) -> &str {
        "You put down an object you are holding on the table."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Physical
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![object_param()]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let object = call.str_arg("object_name")?;
        {
            let scene = ctx.scene.read().await;
            require_object(&scene, object)?;
        }
        perform(
            ctx,
            vec![
                Primitive::PutDown {
                    object: object.to_string(),
                },
                Primitive::DefaultPose,
            ],
            format!("You successfully put down {object}."),
            format!("put down {object}"),
        )
        .await
    }
}
