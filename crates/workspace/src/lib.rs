//! 工作区模块
//!
//! 提供根目录受限的文件存储和文件系统监听能力，独立于服务器框架。
//!
//! ## 模块结构
//! - `emitter` - 事件发射器抽象 trait
//! - `error` - 错误类型定义
//! - `store` - 工作区文件存储（读写、列表、删除、重命名）
//! - `watcher` - 文件系统监听器（变更广播）
//!
//! ## 设计原则
//! - 所有路径相对于唯一的工作区根目录解析，越界路径在任何文件系统
//!   调用之前被拒绝
//! - 同一路径上的操作串行化，整个写入作为一个单元生效
//! - 变更通过注入的发射器广播，模块本身不感知连接层

pub mod emitter;
pub mod error;
pub mod store;
pub mod watcher;

pub use emitter::{DynEmitter, NoOpEmitter, WorkspaceEventEmit};
pub use error::WorkspaceError;
pub use store::{EntryKind, FileEntry, WorkspaceStore};
pub use watcher::WorkspaceWatcher;
