//! 调度策略
//!
//! 启动时选定一个 [`SchedulingPolicy`]。周期策略把任务保存在 [`PeriodicSchedule`] 中，
//! 由 [`TickDriver`] 按固定间隔重新检查；即时策略对每个被接受的任务只执行一次，不保留任务。

pub mod immediate;
pub mod periodic;
pub mod policy;
pub mod tick;

#[cfg(test)]
pub mod test_utils;

pub use immediate::ImmediatePolicy;
pub use periodic::{PeriodicPolicy, PeriodicSchedule, ScheduledTask};
pub use policy::{build_policy, SchedulingPolicy, TickReport};
pub use tick::TickDriver;
