//! 核心类型和工具模块
//!
//! 包含 config, logging 等基础功能

pub mod config;
pub mod logging;

pub use config::{
    LoggingSettings, SandboxSettings, ServerSettings, Settings, ToolSettings, WorkspaceSettings,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
