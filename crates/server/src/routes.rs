//! HTTP 路由
//!
//! 除 WebSocket 升级外只提供两个无副作用端点：健康检查和工作区
//! 顶层列表。跨域放开，前端可直接访问。

use crate::state::AppState;
use crate::ws::ws_handler;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// 组装完整路由
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workspace", get(workspace_listing))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "workhub",
        "version": workhub_core::version(),
    }))
}

async fn workspace_listing(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let files = state
        .store
        .list("")
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(json!({"files": files, "directory": ""})))
}
