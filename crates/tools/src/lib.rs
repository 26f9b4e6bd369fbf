//! 工具进程管理
//!
//! 启动、跟踪和停止外部工具服务进程（如浏览器自动化、网页抓取），
//! 每个进程由进程 id 和工具种类名标识。
//!
//! ## 模块结构
//! - `error` - 错误类型定义
//! - `kinds` - 工具种类注册表（名称 -> 启动命令）
//! - `process` - 单个工具进程（状态机、stdio 协议、崩溃监视）
//! - `manager` - 进程管理器（唯一所有者，显式关停钩子）
//!
//! ## 设计原则
//! - 每个 ToolProcess 是显式状态机：starting → running → {stopped, failed}
//! - 进程句柄不跨请求复用，重新 start 总是产生新 id
//! - 管理器关停前停掉所有仍在运行的进程，不留孤儿

pub mod error;
pub mod kinds;
pub mod manager;
pub mod process;

pub use error::ToolError;
pub use kinds::{ToolKindRegistry, ToolKindSpec};
pub use manager::{StopOutcome, ToolProcessManager};
pub use process::{ToolProcessStatus, ToolStatus};
