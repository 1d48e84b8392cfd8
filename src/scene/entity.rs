//! 场景实体：人、机器人、物体，以及人/机器人的状态

use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// 实体类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Human,
    Robot,
    Object,
}

impl EntityKind {
    pub fn is_agent(self) -> bool {
        matches!(self, EntityKind::Human | EntityKind::Robot)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Human => "human",
            EntityKind::Robot => "robot",
            EntityKind::Object => "object",
        };
        f.write_str(s)
    }
}

fn default_radius() -> f32 {
    0.05
}

/// 场景布局中的一条实体声明（来自配置 [[scene.entities]]）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    pub id: String,
    pub kind: EntityKind,
    /// 位置（米）；人/机器人取眼部/肩部位置
    pub position: [f32; 3],
    /// 遮挡用包围球半径
    #[serde(default = "default_radius")]
    pub radius: f32,
    /// 手臂可达半径；物体为 0
    #[serde(default)]
    pub reach: f32,
    /// 初始持有者（物体在谁手里/在什么之上）
    #[serde(default)]
    pub held_by: Option<String>,
}

impl EntitySpec {
    pub fn human(id: &str, position: [f32; 3], reach: f32) -> Self {
        Self {
            id: id.to_string(),
            kind: EntityKind::Human,
            position,
            radius: 0.25,
            reach,
            held_by: None,
        }
    }

    pub fn robot(id: &str, position: [f32; 3], reach: f32) -> Self {
        Self {
            id: id.to_string(),
            kind: EntityKind::Robot,
            position,
            radius: 0.2,
            reach,
            held_by: None,
        }
    }

    pub fn object(id: &str, position: [f32; 3], radius: f32) -> Self {
        Self {
            id: id.to_string(),
            kind: EntityKind::Object,
            position,
            radius,
            reach: 0.0,
            held_by: None,
        }
    }

    pub fn held_by(mut self, holder: &str) -> Self {
        self.held_by = Some(holder.to_string());
        self
    }
}

/// 调用方拿到的实体视图（值拷贝）；场景 reset 后需重新获取
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    /// 当前有效位置：被持有时跟随持有者
    pub position: Vector3<f32>,
    pub radius: f32,
    pub reach: f32,
    pub held_by: Option<String>,
}

/// 人/机器人的忙碌与注意力状态
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub busy: bool,
    /// 忙碌原因，如设备名 "iphone5"
    pub reason: Option<String>,
    /// 当前关注的对象/人
    pub attention: Option<String>,
}
