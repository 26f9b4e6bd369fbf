//! workhub 服务入口
//!
//! 读取配置、初始化日志、构建共享状态、挂载文件监听器，然后启动
//! axum 服务。收到 ctrl-c 后优雅关停：先停监听器，再停掉所有工具
//! 进程，保证不留孤儿。

use anyhow::Context;
use tracing::info;
use workhub_core::config::Settings;
use workhub_server::{build_router, AppState};
use workhub_workspace::emitter::DynEmitter;
use workhub_workspace::watcher::WorkspaceWatcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env();
    workhub_core::logging::init(&settings.logging);

    info!(version = workhub_core::version(), "workhub starting");

    let state = AppState::build(settings.clone()).context("failed to build server state")?;
    info!(root = %state.store.root().display(), "workspace ready");

    let watcher = WorkspaceWatcher::spawn(
        state.store.root().to_path_buf(),
        DynEmitter::new(state.registry.clone()),
    )
    .context("failed to start workspace watcher")?;

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, build_router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutting down");
    watcher.stop();
    state.tools.shutdown().await;
    info!("bye");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("ctrl-c received");
}
