//! 物理动作：一个动作是同一执行者的一串动作原语（对应执行器中的一个 plan）

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// 动作原语
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum Primitive {
    Grasp { object: String },
    PutDown { object: String },
    HandOver { object: String, person: String },
    PlaceNear { object: String, target: String },
    PlaceFar { object: String, away_from: String },
    Pour { source: String, target: String },
    Point { target: String },
    LookAt { target: String },
    DefaultPose,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Grasp { object } => write!(f, "get {object}"),
            Primitive::PutDown { object } => write!(f, "put {object}"),
            Primitive::HandOver { object, person } => write!(f, "pass {object} {person}"),
            Primitive::PlaceNear { object, target } => write!(f, "put {object} near {target}"),
            Primitive::PlaceFar { object, away_from } => write!(f, "put {object} far {away_from}"),
            Primitive::Pour { source, target } => write!(f, "pour {source} {target}"),
            Primitive::Point { target } => write!(f, "point {target}"),
            Primitive::LookAt { target } => write!(f, "gaze {target}"),
            Primitive::DefaultPose => f.write_str("pose default"),
        }
    }
}

/// 提交给执行器的一个物理动作
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhysicalAction {
    /// 执行者（机器人）id；同一执行者同一时刻最多一个动作
    pub actor: String,
    pub steps: Vec<Primitive>,
}

impl PhysicalAction {
    pub fn new(actor: impl Into<String>, steps: Vec<Primitive>) -> Self {
        Self {
            actor: actor.into(),
            steps,
        }
    }

    /// 执行器命令文本，如 "get red_glass;pass red_glass Felix;pose default"
    pub fn command(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// 动作结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActionOutcome {
    Success(String),
    Failed(String),
    Cancelled,
}

impl ActionOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ActionOutcome::Success(_) => "success",
            ActionOutcome::Failed(_) => "failed",
            ActionOutcome::Cancelled => "cancelled",
        }
    }
}

/// 动作 ID
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct ActionId(u64);

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

impl Default for ActionId {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionId {
    pub fn new() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action-{}", self.0)
    }
}
