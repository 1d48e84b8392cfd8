//! 进程内运动学仿真执行器
//!
//! 每个动作原语耗时（按 speed_up 缩放），期间随时可取消；执行时用场景模型现算可达性，成功后把效果写回场景。

use std::time::Duration;

use async_trait::async_trait;
use nalgebra::Vector3;
use tokio_util::sync::CancellationToken;

use crate::dispatch::{ActionExecutor, ActionOutcome, PhysicalAction, Primitive};
use crate::scene::{EntityKind, SceneModel, SharedScene};

/// 桌面高度（米），放下的物体落在这个高度
const TABLE_HEIGHT: f32 = 0.8;
/// 两只手，最多同时持有两个物体
const MAX_HELD_OBJECTS: usize = 2;
/// 放到某人附近时，距其臂展的比例
const NEAR_FACTOR: f32 = 0.5;
/// 移开时离执行者的距离
const AWAY_DISTANCE: f32 = 0.3;

/// 运动学仿真执行器：共享场景模型
pub struct SimulatedExecutor {
    scene: SharedScene,
    speed_up: f32,
}

impl SimulatedExecutor {
    pub fn new(scene: SharedScene, speed_up: f32) -> Self {
        Self {
            scene,
            speed_up: if speed_up > 0.0 { speed_up } else { 1.0 },
        }
    }

    /// 各原语的名义耗时（秒）
    fn nominal_secs(step: &Primitive) -> f32 {
        match step {
            Primitive::Grasp { .. } => 8.0,
            Primitive::PutDown { .. } => 7.0,
            Primitive::HandOver { .. } => 6.0,
            Primitive::PlaceNear { .. } | Primitive::PlaceFar { .. } => 6.0,
            Primitive::Pour { .. } => 5.0,
            Primitive::Point { .. } => 3.0,
            Primitive::LookAt { .. } => 1.0,
            Primitive::DefaultPose => 4.0,
        }
    }

    fn duration(&self, step: &Primitive) -> Duration {
        Duration::from_secs_f32(Self::nominal_secs(step) / self.speed_up)
    }
}

fn table_point(mut p: Vector3<f32>) -> Vector3<f32> {
    p.z = TABLE_HEIGHT;
    p
}

fn require_held(scene: &SceneModel, actor: &str, object: &str) -> Result<(), String> {
    match scene.holder_of(object).map_err(|e| e.to_string())? {
        Some(holder) if holder == actor => Ok(()),
        _ => Err(format!("{actor} is not holding {object}")),
    }
}

/// 对场景应用一个原语的效果；返回失败原因
fn apply(scene: &mut SceneModel, actor: &str, step: &Primitive) -> Result<(), String> {
    match step {
        Primitive::Grasp { object } => {
            if scene.kind_of(object) != Some(EntityKind::Object) {
                return Err(format!("{object} is not a graspable object"));
            }
            if scene.holder_of(object).map_err(|e| e.to_string())?.as_deref() == Some(actor) {
                return Ok(());
            }
            if let Some(holder) = scene.holding_agent(object) {
                if holder != actor {
                    return Err(format!("{object} is held by {holder}"));
                }
            }
            if !scene.is_reachable(actor, object).map_err(|e| e.to_string())? {
                return Err(format!("{actor} cannot reach {object}"));
            }
            if scene.held_objects(actor).map_err(|e| e.to_string())?.len() >= MAX_HELD_OBJECTS {
                return Err(format!("{actor} has no free hand"));
            }
            scene.attach(object, actor).map_err(|e| e.to_string())
        }
        Primitive::PutDown { object } => {
            require_held(scene, actor, object)?;
            let at = scene.position_of(object).map_err(|e| e.to_string())?;
            scene.detach(object, table_point(at)).map_err(|e| e.to_string())
        }
        Primitive::HandOver { object, person } => {
            require_held(scene, actor, object)?;
            let receiver = scene.get_entity(person).map_err(|e| e.to_string())?;
            if receiver.kind != EntityKind::Human {
                return Err(format!("{person} is not a person"));
            }
            let me = scene.get_entity(actor).map_err(|e| e.to_string())?;
            if (receiver.position - me.position).norm() > me.reach + receiver.reach {
                return Err(format!("{person} is too far away for a hand-over"));
            }
            scene.attach(object, person).map_err(|e| e.to_string())
        }
        Primitive::PlaceNear { object, target } => {
            require_held(scene, actor, object)?;
            let me = scene.get_entity(actor).map_err(|e| e.to_string())?;
            let other = scene.get_entity(target).map_err(|e| e.to_string())?;
            let toward_me = me.position - other.position;
            let offset = if toward_me.norm() > f32::EPSILON {
                toward_me.normalize() * (other.reach.max(0.2) * NEAR_FACTOR)
            } else {
                Vector3::zeros()
            };
            let spot = table_point(other.position + offset);
            if (spot - me.position).norm() > me.reach {
                return Err(format!("{actor} cannot reach a spot near {target}"));
            }
            scene.detach(object, spot).map_err(|e| e.to_string())
        }
        Primitive::PlaceFar { object, away_from } => {
            if scene.holder_of(object).map_err(|e| e.to_string())?.as_deref() != Some(actor) {
                apply(scene, actor, &Primitive::Grasp { object: object.clone() })?;
            }
            let me = scene.get_entity(actor).map_err(|e| e.to_string())?;
            let other = scene.get_entity(away_from).map_err(|e| e.to_string())?;
            let away = me.position - other.position;
            let dir = if away.norm() > f32::EPSILON {
                away.normalize()
            } else {
                Vector3::x()
            };
            let spot = table_point(me.position + dir * AWAY_DISTANCE);
            scene.detach(object, spot).map_err(|e| e.to_string())
        }
        Primitive::Pour { source, target } => {
            require_held(scene, actor, source)?;
            if !scene.is_reachable(actor, target).map_err(|e| e.to_string())? {
                return Err(format!("{actor} cannot reach {target}"));
            }
            Ok(())
        }
        Primitive::Point { target } | Primitive::LookAt { target } => scene
            .set_attention(actor, Some(target.clone()))
            .map_err(|e| e.to_string()),
        Primitive::DefaultPose => scene.set_attention(actor, None).map_err(|e| e.to_string()),
    }
}

#[async_trait]
impl ActionExecutor for SimulatedExecutor {
    async fn perform(&self, action: &PhysicalAction, cancel: CancellationToken) -> ActionOutcome {
        for step in &action.steps {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(actor = %action.actor, step = %step, "simulation step interrupted");
                    return ActionOutcome::Cancelled;
                }
                _ = tokio::time::sleep(self.duration(step)) => {}
            }
            let mut scene = self.scene.write().await;
            if let Err(reason) = apply(&mut scene, &action.actor, step) {
                tracing::debug!(actor = %action.actor, step = %step, %reason, "simulation step failed");
                return ActionOutcome::Failed(format!("{step}: {reason}"));
            }
        }
        ActionOutcome::Success(action.command())
    }
}
