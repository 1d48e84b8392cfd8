//! 场景模型：实体、持有关系（森林）、人/机器人状态，以及能力谓词（可见 / 可达 / 忙碌）
//!
//! 能力谓词每次都从当前状态现算，不做跨变更缓存；reset() 回到初始布局并使旧的实体视图失效（generation+1）。

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::core::SupportError;
use crate::scene::geometry::{segment_hits_sphere, within_reach};
use crate::scene::{AgentStatus, Entity, EntityKind, EntitySpec};

/// 初始场景布局
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneLayout {
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

impl SceneLayout {
    /// 内置演示场景：Felix 与 Daniel 隔桌而坐，机器人在桌头；红杯子只有机器人够得着，且 Felix 视线被麦片盒挡住
    pub fn table_demo(robot: &str) -> Self {
        Self {
            entities: vec![
                EntitySpec::human("Felix", [0.0, -0.8, 1.2], 0.6),
                EntitySpec::human("Daniel", [0.0, 0.8, 1.2], 0.6),
                EntitySpec::robot(robot, [0.9, 0.0, 1.3], 1.2),
                EntitySpec::object("red_glass", [0.85, 0.0, 0.8], 0.04),
                EntitySpec::object("blue_glass", [0.1, -0.5, 0.8], 0.04),
                EntitySpec::object("cola_bottle", [0.1, 0.5, 0.8], 0.05),
                EntitySpec::object("cereal_box", [0.64, -0.2, 0.9], 0.12),
                EntitySpec::object("iphone5", [0.0, 0.8, 1.2], 0.03).held_by("Daniel"),
            ],
        }
    }
}

#[derive(Clone, Debug)]
struct EntityState {
    kind: EntityKind,
    position: Vector3<f32>,
    radius: f32,
    reach: f32,
    held_by: Option<String>,
}

impl EntityState {
    fn from_spec(spec: &EntitySpec) -> Self {
        Self {
            kind: spec.kind,
            position: Vector3::new(spec.position[0], spec.position[1], spec.position[2]),
            radius: spec.radius,
            reach: if spec.kind.is_agent() { spec.reach } else { 0.0 },
            held_by: spec.held_by.clone(),
        }
    }
}

/// 场景快照（可比较、可序列化），用于验证 reset 幂等等
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneSnapshot {
    pub entities: Vec<Entity>,
    pub statuses: BTreeMap<String, AgentStatus>,
}

/// 某人对某物的全部阻碍因素
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Hindrances {
    pub person: String,
    pub object: String,
    pub can_see: bool,
    pub occluded_by: Vec<String>,
    pub can_reach: bool,
    pub busy: bool,
    pub busy_reason: Option<String>,
}

impl Hindrances {
    /// 忙碌作为独立否决项：看得到、够得着且不忙，才算能自己解决
    pub fn can_help_themselves(&self) -> bool {
        self.can_see && self.can_reach && !self.busy
    }

    pub fn describe(&self) -> String {
        let visible = if self.can_see {
            format!("{} can see {}.", self.person, self.object)
        } else {
            format!(
                "{} cannot see {}, it is occluded by {}.",
                self.person,
                self.object,
                self.occluded_by.join(" and ")
            )
        };
        let reach = if self.can_reach {
            format!("{} can reach {}.", self.person, self.object)
        } else {
            format!("{} cannot reach {}.", self.person, self.object)
        };
        let busy = match (self.busy, &self.busy_reason) {
            (true, Some(reason)) => format!("{} is busy ({reason}).", self.person),
            (true, None) => format!("{} is busy.", self.person),
            (false, _) => format!("{} is idle.", self.person),
        };
        format!("{visible} {reach} {busy}")
    }
}

/// 场景模型：单写者；多个决策不会并发修改它（由规划循环串行保证）
#[derive(Debug)]
pub struct SceneModel {
    layout: SceneLayout,
    entities: BTreeMap<String, EntityState>,
    statuses: BTreeMap<String, AgentStatus>,
    generation: u64,
}

impl SceneModel {
    /// 校验布局（id 唯一、持有者存在、持有关系无环）并建立初始状态
    pub fn new(layout: SceneLayout) -> Result<Self, SupportError> {
        let mut entities = BTreeMap::new();
        for spec in &layout.entities {
            if spec.id.trim().is_empty() {
                return Err(SupportError::InvalidScene("entity with empty id".to_string()));
            }
            if entities
                .insert(spec.id.clone(), EntityState::from_spec(spec))
                .is_some()
            {
                return Err(SupportError::InvalidScene(format!(
                    "duplicate entity id '{}'",
                    spec.id
                )));
            }
        }
        for (id, state) in &entities {
            if let Some(holder) = &state.held_by {
                if !entities.contains_key(holder) {
                    return Err(SupportError::InvalidScene(format!(
                        "'{id}' is held by unknown entity '{holder}'"
                    )));
                }
            }
        }
        for id in entities.keys() {
            let mut seen = BTreeSet::new();
            let mut cursor = Some(id.as_str());
            while let Some(current) = cursor {
                if !seen.insert(current) {
                    return Err(SupportError::InvalidScene(format!(
                        "containment cycle through '{id}'"
                    )));
                }
                cursor = entities
                    .get(current)
                    .and_then(|s| s.held_by.as_deref());
            }
        }

        let statuses = entities
            .iter()
            .filter(|(_, s)| s.kind.is_agent())
            .map(|(id, _)| (id.clone(), AgentStatus::default()))
            .collect();

        tracing::debug!(entities = entities.len(), "scene model initialised");
        Ok(Self {
            layout,
            entities,
            statuses,
            generation: 0,
        })
    }

    /// 回到初始布局；已发出的实体视图失效
    pub fn reset(&mut self) {
        self.entities = self
            .layout
            .entities
            .iter()
            .map(|spec| (spec.id.clone(), EntityState::from_spec(spec)))
            .collect();
        self.statuses = self
            .entities
            .iter()
            .filter(|(_, s)| s.kind.is_agent())
            .map(|(id, _)| (id.clone(), AgentStatus::default()))
            .collect();
        self.generation += 1;
        tracing::info!(generation = self.generation, "scene reset");
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn state(&self, id: &str) -> Result<&EntityState, SupportError> {
        self.entities
            .get(id)
            .ok_or_else(|| SupportError::not_found("entity", id))
    }

    fn agent_state(&self, id: &str) -> Result<&EntityState, SupportError> {
        let state = self.state(id)?;
        if state.kind.is_agent() {
            Ok(state)
        } else {
            Err(SupportError::not_found("agent", id))
        }
    }

    /// 有效位置：沿持有链找到最上层的持有者
    fn effective_position(&self, id: &str) -> Vector3<f32> {
        let mut cursor = id;
        // 持有链长度不超过实体总数
        for _ in 0..=self.entities.len() {
            match self.entities.get(cursor) {
                Some(EntityState { held_by: Some(h), .. }) => cursor = h.as_str(),
                Some(state) => return state.position,
                None => break,
            }
        }
        self.entities
            .get(id)
            .map(|s| s.position)
            .unwrap_or_else(Vector3::zeros)
    }

    /// child 是否（直接或间接）被 ancestor 持有
    fn is_held_within(&self, child: &str, ancestor: &str) -> bool {
        let mut cursor = self.entities.get(child).and_then(|s| s.held_by.as_deref());
        let mut steps = 0;
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.entities.len() {
                return false;
            }
            cursor = self.entities.get(current).and_then(|s| s.held_by.as_deref());
        }
        false
    }

    /// 沿持有链向上找到的第一个 agent（人或机器人）
    pub fn holding_agent(&self, id: &str) -> Option<String> {
        let mut cursor = self.entities.get(id).and_then(|s| s.held_by.as_deref());
        let mut steps = 0;
        while let Some(current) = cursor {
            if self.kind_of(current).is_some_and(EntityKind::is_agent) {
                return Some(current.to_string());
            }
            steps += 1;
            if steps > self.entities.len() {
                return None;
            }
            cursor = self.entities.get(current).and_then(|s| s.held_by.as_deref());
        }
        None
    }

    fn to_entity(&self, id: &str, state: &EntityState) -> Entity {
        Entity {
            id: id.to_string(),
            kind: state.kind,
            position: self.effective_position(id),
            radius: state.radius,
            reach: state.reach,
            held_by: state.held_by.clone(),
        }
    }

    pub fn get_entity(&self, id: &str) -> Result<Entity, SupportError> {
        let state = self.state(id)?;
        Ok(self.to_entity(id, state))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn kind_of(&self, id: &str) -> Option<EntityKind> {
        self.entities.get(id).map(|s| s.kind)
    }

    /// 所有物体 id（按 id 排序）
    pub fn objects(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|(_, s)| s.kind == EntityKind::Object)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// 所有人与机器人 id（按 id 排序）
    pub fn agents(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|(_, s)| s.kind.is_agent())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn humans(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|(_, s)| s.kind == EntityKind::Human)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn status(&self, agent: &str) -> Result<AgentStatus, SupportError> {
        self.agent_state(agent)?;
        Ok(self.statuses.get(agent).cloned().unwrap_or_default())
    }

    /// 设置忙碌状态；之后的所有能力查询立即可见
    pub fn set_status(&mut self, agent: &str, busy: bool, reason: Option<String>) -> Result<(), SupportError> {
        self.agent_state(agent)?;
        let status = self.statuses.entry(agent.to_string()).or_default();
        status.busy = busy;
        status.reason = if busy { reason } else { None };
        tracing::info!(agent, busy, reason = ?status.reason, "agent status updated");
        Ok(())
    }

    pub fn set_attention(&mut self, agent: &str, target: Option<String>) -> Result<(), SupportError> {
        self.agent_state(agent)?;
        if let Some(t) = &target {
            self.state(t)?;
        }
        self.statuses.entry(agent.to_string()).or_default().attention = target;
        Ok(())
    }

    pub fn is_busy(&self, agent: &str) -> Result<bool, SupportError> {
        Ok(self.status(agent)?.busy)
    }

    /// 挡住 observer 看 target 的实体（排除双方自身、observer 手中物、target 的持有链）
    pub fn occluders(&self, observer: &str, target: &str) -> Result<Vec<String>, SupportError> {
        self.agent_state(observer)?;
        self.state(target)?;
        if observer == target || self.is_held_within(target, observer) {
            return Ok(Vec::new());
        }
        let eye = self.effective_position(observer);
        let goal = self.effective_position(target);
        let blocking = self
            .entities
            .iter()
            .filter(|(id, _)| id.as_str() != observer && id.as_str() != target)
            .filter(|(id, _)| !self.is_held_within(id, observer))
            .filter(|(id, _)| !self.is_held_within(target, id))
            .filter(|(id, _)| !self.is_held_within(id, target))
            .filter(|(id, state)| {
                segment_hits_sphere(&eye, &goal, &self.effective_position(id), state.radius)
            })
            .map(|(id, _)| id.clone())
            .collect();
        Ok(blocking)
    }

    pub fn is_visible(&self, observer: &str, target: &str) -> Result<bool, SupportError> {
        Ok(self.occluders(observer, target)?.is_empty())
    }

    /// 可达：自己手里的一定可达；别人手里的（包括别人手中容器里的）不可达；否则看臂展
    pub fn is_reachable(&self, observer: &str, target: &str) -> Result<bool, SupportError> {
        let agent = self.agent_state(observer)?;
        self.state(target)?;
        if self.is_held_within(target, observer) {
            return Ok(true);
        }
        if self.holding_agent(target).is_some() {
            return Ok(false);
        }
        Ok(within_reach(
            &self.effective_position(observer),
            &self.effective_position(target),
            agent.reach,
        ))
    }

    pub fn hindrances(&self, person: &str, object: &str) -> Result<Hindrances, SupportError> {
        let occluded_by = self.occluders(person, object)?;
        let can_reach = self.is_reachable(person, object)?;
        let status = self.status(person)?;
        Ok(Hindrances {
            person: person.to_string(),
            object: object.to_string(),
            can_see: occluded_by.is_empty(),
            occluded_by,
            can_reach,
            busy: status.busy,
            busy_reason: status.reason,
        })
    }

    /// agent 直接持有的物体
    pub fn held_objects(&self, agent: &str) -> Result<Vec<String>, SupportError> {
        self.agent_state(agent)?;
        Ok(self
            .entities
            .iter()
            .filter(|(_, s)| s.held_by.as_deref() == Some(agent))
            .map(|(id, _)| id.clone())
            .collect())
    }

    pub fn holder_of(&self, object: &str) -> Result<Option<String>, SupportError> {
        Ok(self.state(object)?.held_by.clone())
    }

    /// 把 object 交给 holder 持有（先解除原持有关系）；拒绝成环
    pub fn attach(&mut self, object: &str, holder: &str) -> Result<(), SupportError> {
        self.state(object)?;
        self.state(holder)?;
        if object == holder || self.is_held_within(holder, object) {
            return Err(SupportError::InvalidScene(format!(
                "attaching '{object}' to '{holder}' would create a containment cycle"
            )));
        }
        if let Some(state) = self.entities.get_mut(object) {
            state.held_by = Some(holder.to_string());
        }
        Ok(())
    }

    /// 解除持有并放到指定位置
    pub fn detach(&mut self, object: &str, position: Vector3<f32>) -> Result<(), SupportError> {
        let state = self
            .entities
            .get_mut(object)
            .ok_or_else(|| SupportError::not_found("entity", object))?;
        state.held_by = None;
        state.position = position;
        Ok(())
    }

    pub fn position_of(&self, id: &str) -> Result<Vector3<f32>, SupportError> {
        self.state(id)?;
        Ok(self.effective_position(id))
    }

    pub fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            entities: self
                .entities
                .iter()
                .map(|(id, s)| self.to_entity(id, s))
                .collect(),
            statuses: self.statuses.clone(),
        }
    }

    /// 供推理上下文使用的可读场景摘要
    pub fn summary(&self) -> String {
        let mut out = String::from("## Scene\n");
        for id in self.agents() {
            let status = self.statuses.get(&id).cloned().unwrap_or_default();
            let kind = self.kind_of(&id).unwrap_or(EntityKind::Human);
            let busy = match (status.busy, status.reason) {
                (true, Some(r)) => format!("busy ({r})"),
                (true, None) => "busy".to_string(),
                (false, _) => "idle".to_string(),
            };
            let held = self.held_objects(&id).unwrap_or_default();
            out.push_str(&format!("- {id} ({kind}): {busy}"));
            if !held.is_empty() {
                out.push_str(&format!(", holding {}", held.join(", ")));
            }
            out.push('\n');
        }
        let objects = self.objects();
        if !objects.is_empty() {
            out.push_str(&format!("- objects: {}\n", objects.join(", ")));
        }
        out
    }
}
