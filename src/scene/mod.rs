//! 场景层：实体、状态、几何判定与场景模型

pub mod entity;
pub mod geometry;
pub mod model;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use entity::{AgentStatus, Entity, EntityKind, EntitySpec};
pub use model::{Hindrances, SceneLayout, SceneModel, SceneSnapshot};

/// 规划循环、工具与执行器共享的场景模型
pub type SharedScene = Arc<RwLock<SceneModel>>;

pub fn shared(scene: SceneModel) -> SharedScene {
    Arc::new(RwLock::new(scene))
}
