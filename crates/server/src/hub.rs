//! 连接注册表
//!
//! 所有活跃 WebSocket 连接的出站通道集合。单播用于请求应答，
//! 广播用于共享状态事件。已关闭的通道在广播时跳过并移除。

use crate::protocol::ServerEvent;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;
use workhub_workspace::emitter::WorkspaceEventEmit;

/// 连接标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// 连接注册表
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个新连接，返回其 id 和出站事件接收端
    pub fn attach(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(id, tx);
        debug!(connection = %id, total = self.connections.len(), "connection attached");
        (id, rx)
    }

    /// 移除连接
    pub fn detach(&self, id: ConnectionId) {
        self.connections.remove(&id);
        debug!(connection = %id, total = self.connections.len(), "connection detached");
    }

    /// 向单个连接发送事件
    ///
    /// 连接已消失时静默丢弃，发送方不需要感知断连竞态。
    pub fn send(&self, id: ConnectionId, event: ServerEvent) {
        if let Some(tx) = self.connections.get(&id) {
            let _ = tx.send(event);
        }
    }

    /// 向所有连接广播事件
    pub fn broadcast(&self, event: &ServerEvent) {
        let mut stale = Vec::new();
        for entry in self.connections.iter() {
            if entry.value().send(event.clone()).is_err() {
                stale.push(*entry.key());
            }
        }
        for id in stale {
            self.connections.remove(&id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl WorkspaceEventEmit for ConnectionRegistry {
    fn emit_event(&self, event: &str, payload: &serde_json::Value) -> Result<(), String> {
        let envelope = json!({"type": event, "payload": payload});
        let event: ServerEvent = serde_json::from_value(envelope)
            .map_err(|e| format!("unencodable workspace event '{event}': {e}"))?;
        self.broadcast(&event);
        Ok(())
    }
}
