//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ASSIST__*` 覆盖（双下划线表示嵌套，如 `ASSIST__PLANNER__MAX_ROUNDS=6`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::react::EngineSettings;
use crate::scene::{EntitySpec, SceneLayout};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub planner: PlannerSection,
    pub scene: SceneSection,
    pub simulation: SimulationSection,
}

/// [app] 段：机器人名、对话轮数上限、是否每次决策后遗忘
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_robot_name")]
    pub robot_name: String,
    /// 对话历史保留轮数
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
    #[serde(default)]
    pub amnesic: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            robot_name: default_robot_name(),
            max_context_turns: default_max_context_turns(),
            amnesic: false,
        }
    }
}

fn default_robot_name() -> String {
    "Johnnie".to_string()
}

fn default_max_context_turns() -> usize {
    40
}

/// [llm] 段：推理服务后端与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            temperature: default_temperature(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

/// 近似确定性输出
fn default_temperature() -> f32 {
    1e-9
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [planner] 段：推理轮数、重试与单步超时
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSection {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_max_argument_retries")]
    pub max_argument_retries: u32,
    #[serde(default = "default_service_retries")]
    pub service_retries: u32,
    /// 首次退避毫秒数，每次重试翻倍
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    #[serde(default = "default_recover_after_interrupt")]
    pub recover_after_interrupt: bool,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_argument_retries: default_max_argument_retries(),
            service_retries: default_service_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            step_timeout_secs: default_step_timeout_secs(),
            recover_after_interrupt: default_recover_after_interrupt(),
        }
    }
}

fn default_max_rounds() -> usize {
    12
}

fn default_max_argument_retries() -> u32 {
    1
}

fn default_service_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_recover_after_interrupt() -> bool {
    true
}

/// [scene] 段：初始场景；entities 为空时使用内置桌面场景
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SceneSection {
    #[serde(default)]
    pub entities: Vec<EntitySpec>,
}

/// [simulation] 段：仿真动作的加速倍数
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSection {
    #[serde(default = "default_speed_up")]
    pub speed_up: f32,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            speed_up: default_speed_up(),
        }
    }
}

fn default_speed_up() -> f32 {
    1.0
}

impl AppConfig {
    /// 初始场景布局
    pub fn scene_layout(&self) -> SceneLayout {
        if self.scene.entities.is_empty() {
            SceneLayout::table_demo(&self.app.robot_name)
        } else {
            SceneLayout {
                entities: self.scene.entities.clone(),
            }
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            robot: self.app.robot_name.clone(),
            max_rounds: self.planner.max_rounds,
            step_timeout: Duration::from_secs(self.planner.step_timeout_secs),
            recover_after_interrupt: self.planner.recover_after_interrupt,
            amnesic: self.app.amnesic,
            max_context_turns: self.app.max_context_turns,
        }
    }
}

/// 从 config 目录加载配置，环境变量 ASSIST__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ASSIST__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ASSIST")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.robot_name, "Johnnie");
        assert_eq!(cfg.planner.max_rounds, 12);
        assert!(cfg.planner.recover_after_interrupt);
        let layout = cfg.scene_layout();
        assert!(layout.entities.iter().any(|e| e.id == "Johnnie"));
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[app]
robot_name = "Robo"
amnesic = true

[planner]
max_rounds = 4
step_timeout_secs = 5

[[scene.entities]]
id = "Anna"
kind = "human"
position = [0.0, 0.0, 1.2]
reach = 0.6

[[scene.entities]]
id = "Robo"
kind = "robot"
position = [1.0, 0.0, 1.2]
reach = 1.0

[[scene.entities]]
id = "cup"
kind = "object"
position = [0.5, 0.0, 0.8]
"#
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.app.robot_name, "Robo");
        assert_eq!(cfg.planner.max_rounds, 4);
        assert_eq!(cfg.planner.max_argument_retries, 1);
        let settings = cfg.engine_settings();
        assert!(settings.amnesic);
        assert_eq!(settings.step_timeout, Duration::from_secs(5));
        let layout = cfg.scene_layout();
        assert_eq!(layout.entities.len(), 3);
        assert_eq!(layout.entities[2].radius, 0.05);
    }
}
