//! 事件发射器抽象
//!
//! 定义工作区事件的发射 trait，使工作区模块不直接依赖连接层。
//! 服务器为其连接注册表实现此 trait，测试使用 `NoOpEmitter`。
//!
//! ## 设计
//! - `WorkspaceEventEmit`：基础 trait（dyn 兼容，不要求 Clone）
//! - `DynEmitter`：`Arc<dyn WorkspaceEventEmit>` 的 newtype，可 Clone

use std::sync::Arc;

/// 基础事件发射 trait（dyn 兼容）
///
/// `event` 是事件类型标签（如 `file_changed`），`payload` 是事件数据。
pub trait WorkspaceEventEmit: Send + Sync + 'static {
    /// 向所有已注册的连接广播事件
    fn emit_event(&self, event: &str, payload: &serde_json::Value) -> Result<(), String>;
}

/// 动态事件发射器包装
///
/// 使用 `Arc<dyn WorkspaceEventEmit>` 包装以便在监听器任务间传递。
#[derive(Clone)]
pub struct DynEmitter(pub Arc<dyn WorkspaceEventEmit>);

impl DynEmitter {
    /// 从实现了 WorkspaceEventEmit 的类型创建
    pub fn new(emitter: impl WorkspaceEventEmit) -> Self {
        Self(Arc::new(emitter))
    }
}

impl<T: WorkspaceEventEmit + ?Sized> WorkspaceEventEmit for Arc<T> {
    fn emit_event(&self, event: &str, payload: &serde_json::Value) -> Result<(), String> {
        self.as_ref().emit_event(event, payload)
    }
}

impl WorkspaceEventEmit for DynEmitter {
    fn emit_event(&self, event: &str, payload: &serde_json::Value) -> Result<(), String> {
        self.0.emit_event(event, payload)
    }
}

/// 空事件发射器（用于测试）
#[derive(Debug, Clone)]
pub struct NoOpEmitter;

impl WorkspaceEventEmit for NoOpEmitter {
    fn emit_event(&self, _event: &str, _payload: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }
}
