//! 引擎构建器：统一的引擎初始化逻辑
//!
//! 二进制与测试共用同一套组装：场景、执行器、工具注册表、推理服务客户端、恢复策略。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::core::{RecoveryEngine, SupportError};
use crate::dispatch::{ActionExecutor, SimulatedExecutor};
use crate::llm::LlmClient;
use crate::react::{AttentiveEngine, EngineEvent};
use crate::scene::{shared, EntityKind, SceneModel, SharedScene};
use crate::tools::{builtin_registry, ToolExecutor, ToolRegistry};

/// 引擎构建器；未显式提供的组件按配置创建
pub struct EngineBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    scene: Option<SharedScene>,
    action_executor: Option<Arc<dyn ActionExecutor>>,
    event_tx: Option<mpsc::UnboundedSender<EngineEvent>>,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            scene: None,
            action_executor: None,
            event_tx: None,
        }
    }

    /// 使用给定的推理服务客户端（测试中注入脚本化客户端）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_scene(mut self, scene: SharedScene) -> Self {
        self.scene = Some(scene);
        self
    }

    /// 使用外部动作执行接口代替进程内仿真
    pub fn with_action_executor(mut self, executor: Arc<dyn ActionExecutor>) -> Self {
        self.action_executor = Some(executor);
        self
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 工具集是静态声明的；注册失败说明声明本身有误
    pub fn build_tool_registry(&self) -> Result<ToolRegistry, SupportError> {
        builtin_registry()
    }

    pub fn build_llm(&self) -> Arc<dyn LlmClient> {
        crate::core::orchestrator::create_llm_from_config(&self.config)
    }

    pub fn build_recovery(&self) -> RecoveryEngine {
        let planner = &self.config.planner;
        RecoveryEngine::new(
            planner.max_argument_retries,
            planner.service_retries,
            Duration::from_millis(planner.retry_backoff_ms),
        )
    }

    pub fn build_scene(&self) -> Result<SharedScene, SupportError> {
        Ok(shared(SceneModel::new(self.config.scene_layout())?))
    }

    /// 机器人必须以 Robot 实体出现在场景中，否则所有物理动作都无从执行
    fn ensure_robot(&self, scene: &SceneModel) -> Result<(), SupportError> {
        let robot = &self.config.app.robot_name;
        match scene.kind_of(robot) {
            Some(EntityKind::Robot) => Ok(()),
            Some(kind) => Err(SupportError::InvalidScene(format!(
                "robot '{robot}' is declared as {kind:?}, not a robot"
            ))),
            None => Err(SupportError::InvalidScene(format!("robot '{robot}' is missing from the scene"))),
        }
    }

    pub fn build(self) -> Result<AttentiveEngine, SupportError> {
        let tools = self.build_tool_registry()?;
        let recovery = self.build_recovery();
        let scene = match &self.scene {
            Some(scene) => scene.clone(),
            None => self.build_scene()?,
        };
        {
            let guard = scene
                .try_read()
                .map_err(|_| SupportError::InvalidScene("scene is locked while building".into()))?;
            self.ensure_robot(&guard)?;
        }
        let llm = match &self.llm {
            Some(llm) => Arc::clone(llm),
            None => self.build_llm(),
        };
        let action_executor: Arc<dyn ActionExecutor> = match &self.action_executor {
            Some(executor) => Arc::clone(executor),
            None => Arc::new(SimulatedExecutor::new(scene.clone(), self.config.simulation.speed_up)),
        };
        tracing::info!(
            robot = %self.config.app.robot_name,
            tools = tools.len(),
            max_rounds = self.config.planner.max_rounds,
            "engine built"
        );

        let engine = AttentiveEngine::new(
            self.config.engine_settings(),
            llm,
            ToolExecutor::new(tools),
            recovery,
            scene,
            action_executor,
        );
        Ok(match self.event_tx {
            Some(tx) => engine.with_event_tx(tx),
            None => engine,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
