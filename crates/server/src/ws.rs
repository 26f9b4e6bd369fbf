//! WebSocket 收发
//!
//! 升级后的每个连接拆成独立的写任务和读循环：写任务把注册表通道
//! 中的事件编码后发往客户端，读循环为每条文本消息起一个分发任务。
//! 连接结束时从注册表摘除，事件不会再投递给它。

use crate::dispatch::handle_message;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// `GET /ws` 升级处理器
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (conn, mut outbound) = state.registry.attach();
    info!(connection = %conn, "websocket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            if ws_tx.send(Message::Text(event.encode())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                // 每条消息独立任务，长执行不会阻塞本连接的读循环
                let state = state.clone();
                tokio::spawn(async move {
                    handle_message(state, conn, &text).await;
                });
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(connection = %conn, "websocket receive error: {e}");
                break;
            }
        }
    }

    state.registry.detach(conn);
    writer.abort();
    info!(connection = %conn, "websocket closed");
}
