//! 感知查询工具：只读场景模型，每次调用都按当前状态现算

use async_trait::async_trait;

use crate::core::SupportError;
use crate::scene::EntityKind;
use crate::tools::context::{require_entity, require_object, require_person};
use crate::tools::{ParamSpec, Tool, ToolCall, ToolContext};

fn person_param() -> ParamSpec {
    ParamSpec::string("person_name", "The name of the person.")
}

fn object_param() -> ParamSpec {
    ParamSpec::string("object_name", "The name of the object.")
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

pub struct GetObjectsTool;

#[async_trait]
impl Tool for GetObjectsTool {
    fn name(&self) -> &str {
        "get_objects"
    }

    fn description(&self) -> &str {
        "Get all objects that are available in the scene. You can see all these objects."
    }

    async fn execute(&self, _call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let scene = ctx.scene.read().await;
        Ok(format!(
            "Following objects were observed: {}.",
            join_or(&scene.objects(), "none")
        ))
    }
}

pub struct GetPersonsTool;

#[async_trait]
impl Tool for GetPersonsTool {
    fn name(&self) -> &str {
        "get_persons"
    }

    fn description(&self) -> &str {
        "Get all persons that are available in the scene. You can see all these persons."
    }

    async fn execute(&self, _call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let scene = ctx.scene.read().await;
        Ok(format!(
            "Following persons were observed: {}.",
            join_or(&scene.humans(), "none")
        ))
    }
}

pub struct BusyOrIdleTool;

#[async_trait]
impl Tool for BusyOrIdleTool {
    fn name(&self) -> &str {
        "is_person_busy_or_idle"
    }

    fn description(&self) -> &str {
        "Check if the person is busy or idle. If the person is busy, it would be hindered from helping."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![person_param()]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let person = call.str_arg("person_name")?;
        let scene = ctx.scene.read().await;
        require_person(&scene, person)?;
        let status = scene.status(person)?;
        Ok(match (status.busy, status.reason) {
            (true, Some(reason)) => format!("{person} is busy ({reason})."),
            (true, None) => format!("{person} is busy."),
            (false, _) => format!("{person} is idle."),
        })
    }
}

pub struct CanSeeTool;

#[async_trait]
impl Tool for CanSeeTool {
    fn name(&self) -> &str {
        "can_person_see_object"
    }

    fn description(&self) -> &str {
        "Check if the person can see the object. If the person cannot see the object, it would be hindered from helping with the object."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![person_param(), object_param()]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let person = call.str_arg("person_name")?;
        let object = call.str_arg("object_name")?;
        let scene = ctx.scene.read().await;
        require_person(&scene, person)?;
        require_object(&scene, object)?;
        let occluders = scene.occluders(person, object)?;
        Ok(if occluders.is_empty() {
            format!("{person} can see {object}.")
        } else {
            format!(
                "{person} cannot see {object}, it is occluded by {}.",
                occluders.join(" and ")
            )
        })
    }
}

pub struct CanReachTool;

#[async_trait]
impl Tool for CanReachTool {
    fn name(&self) -> &str {
        "can_person_reach_object"
    }

    fn description(&self) -> &str {
        "Check if the person can reach the object. If the person cannot reach the object, it would be hindered from helping with the object."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![person_param(), object_param()]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let person = call.str_arg("person_name")?;
        let object = call.str_arg("object_name")?;
        let scene = ctx.scene.read().await;
        require_person(&scene, person)?;
        require_object(&scene, object)?;
        Ok(if scene.is_reachable(person, object)? {
            format!("{person} can reach {object}.")
        } else {
            format!("{person} cannot reach {object}.")
        })
    }
}

pub struct HinderingReasonsTool;

#[async_trait]
impl Tool for HinderingReasonsTool {
    fn name(&self) -> &str {
        "check_hindering_reasons"
    }

    fn description(&self) -> &str {
        "Checks all hindering reasons of a person regarding an object: whether the person can see it, can reach it, and whether the person is busy. Use it before deciding to help with an object."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![person_param(), object_param()]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let person = call.str_arg("person_name")?;
        let object = call.str_arg("object_name")?;
        let scene = ctx.scene.read().await;
        require_person(&scene, person)?;
        require_object(&scene, object)?;
        Ok(scene.hindrances(person, object)?.describe())
    }
}

pub struct RobotReachTool;

#[async_trait]
impl Tool for RobotReachTool {
    fn name(&self) -> &str {
        "check_reach_object_for_robot"
    }

    fn description(&self) -> &str {
        "Check if you (the robot) can reach the object."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![object_param()]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let object = call.str_arg("object_name")?;
        let scene = ctx.scene.read().await;
        require_object(&scene, object)?;
        Ok(if scene.is_reachable(&ctx.robot, object)? {
            format!("You can reach {object}.")
        } else {
            format!("You cannot reach {object}.")
        })
    }
}

pub struct HeldObjectsTool;

#[async_trait]
impl Tool for HeldObjectsTool {
    fn name(&self) -> &str {
        "get_held_objects"
    }

    fn description(&self) -> &str {
        "Get the objects held by an agent (a person or you, the robot)."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::string(
            "agent_name",
            "The name of the agent whose held objects are requested.",
        )]
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<String, SupportError> {
        let agent = call.str_arg("agent_name")?;
        let scene = ctx.scene.read().await;
        require_entity(&scene, agent, &[EntityKind::Human, EntityKind::Robot])?;
        let held = scene.held_objects(agent)?;
        Ok(if held.is_empty() {
            format!("{agent} is not holding any objects.")
        } else {
            format!("{agent} is holding {}.", held.join(" and "))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{call, context};

    #[tokio::test]
    async fn test_hindering_reasons_reports_occlusion_and_reach() {
        let ctx = context();
        let result = HinderingReasonsTool
            .execute(
                &call("check_hindering_reasons", &[("person_name", "Felix"), ("object_name", "red_glass")]),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.contains("Felix cannot see red_glass, it is occluded by cereal_box."));
        assert!(result.contains("Felix cannot reach red_glass."));
        assert!(result.contains("Felix is idle."));
    }

    #[tokio::test]
    async fn test_busy_status_reflects_latest_update() {
        let ctx = context();
        let query = call("is_person_busy_or_idle", &[("person_name", "Daniel")]);
        assert_eq!(BusyOrIdleTool.execute(&query, &ctx).await.unwrap(), "Daniel is idle.");
        ctx.scene
            .write()
            .await
            .set_status("Daniel", true, Some("iphone5".into()))
            .unwrap();
        assert_eq!(
            BusyOrIdleTool.execute(&query, &ctx).await.unwrap(),
            "Daniel is busy (iphone5)."
        );
    }

    #[tokio::test]
    async fn test_unknown_person_is_not_found() {
        let ctx = context();
        let err = CanReachTool
            .execute(
                &call("can_person_reach_object", &[("person_name", "Mary"), ("object_name", "red_glass")]),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SupportError::NotFound(ref m) if m.contains("Daniel, Felix")));
    }

    #[tokio::test]
    async fn test_robot_reach_and_held_objects() {
        let ctx = context();
        let reach = RobotReachTool
            .execute(&call("check_reach_object_for_robot", &[("object_name", "red_glass")]), &ctx)
            .await
            .unwrap();
        assert_eq!(reach, "You can reach red_glass.");
        let held = HeldObjectsTool
            .execute(&call("get_held_objects", &[("agent_name", "Daniel")]), &ctx)
            .await
            .unwrap();
        assert_eq!(held, "Daniel is holding iphone5.");
    }
}
