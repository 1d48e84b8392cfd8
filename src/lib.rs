//! attentive-support：情境辅助机器人的决策与规划核心
//!
//! 旁听人与人之间的对话，判断机器人是否应当介入（说话或动手），并在需要时调用工具完成。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、决策阶段、中断监管、引擎构建与主控循环
//! - **dispatch**: 物理动作的提交、等待、取消与进程内仿真执行器
//! - **llm**: 推理服务客户端抽象与实现（OpenAI 兼容 / Mock / 脚本化）
//! - **memory**: 对话记忆与决策内工作记忆
//! - **react**: 话语解析、推理桥、规划主循环与决策结果
//! - **scene**: 场景模型（实体、持有关系、可见/可达/忙碌判定）
//! - **tools**: 工具声明、注册表与执行器（感知 / 语音 / 注视 / 物理动作）

pub mod config;
pub mod core;
pub mod dispatch;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod scene;
pub mod tools;

pub use crate::core::{EngineBuilder, EngineHandle, SupportError};
pub use crate::react::{AttentiveEngine, DecisionOutcome, DecisionStatus, InterventionDecision};
