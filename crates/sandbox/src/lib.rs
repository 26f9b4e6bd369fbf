//! 代码执行沙箱
//!
//! 在资源受限的解释器中运行一段提交的代码，捕获控制台输出和单个
//! 返回值或错误。每次调用创建全新的解释器进程，调用之间不泄漏状态。
//!
//! ## 模块结构
//! - `error` - 错误类型定义（宿主故障，区别于用户程序错误）
//! - `executor` - 沙箱执行器（进程生命周期、超时、输出流）
//! - `harness` - 嵌入的 node:vm 执行壳脚本
//!
//! ## 边界
//! - 用户程序失败（抛出、超时）体现在 `ExecutionResult::error`
//! - 沙箱自身失败（解释器缺失、协议破坏）体现在 `SandboxError`

pub mod error;
pub mod executor;
mod harness;

pub use error::SandboxError;
pub use executor::{ConsoleSink, ExecutionResult, Sandbox};
