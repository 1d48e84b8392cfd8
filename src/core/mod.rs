//! 核心编排层：错误与恢复、决策阶段、中断监管、引擎构建与主控循环

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod state;

pub use builder::EngineBuilder;
pub use error::{RecoveryAction, SupportError};
pub use orchestrator::{create_engine, Command, EngineHandle};
pub use recovery::RecoveryEngine;
pub use session_supervisor::SessionSupervisor;
pub use state::{DecisionPhase, PhaseTrace};
