//! 执行分发层：物理动作、分发器（在途唯一 + 取消）、进程内仿真执行器

pub mod action;
pub mod dispatcher;
pub mod simulated;

pub use action::{ActionId, ActionOutcome, PhysicalAction, Primitive};
pub use dispatcher::{ActionExecutor, ActionHandle, ExecutionDispatcher};
pub use simulated::SimulatedExecutor;
