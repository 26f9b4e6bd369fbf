//! 共享服务状态
//!
//! 所有连接共享同一份状态：连接注册表、工作区存储、代码沙箱与
//! 工具进程管理器。状态在启动时构建一次，经 `Arc` 注入各处理路径,
//! 没有模块级全局量。

use crate::hub::ConnectionRegistry;
use std::sync::Arc;
use workhub_core::config::Settings;
use workhub_sandbox::Sandbox;
use workhub_tools::ToolProcessManager;
use workhub_workspace::error::WorkspaceError;
use workhub_workspace::store::WorkspaceStore;

/// 服务状态
pub struct AppState {
    pub settings: Settings,
    pub registry: Arc<ConnectionRegistry>,
    pub store: WorkspaceStore,
    pub sandbox: Sandbox,
    pub tools: ToolProcessManager,
}

impl AppState {
    /// 从配置构建全部组件
    ///
    /// 工作区根目录在此处创建；失败则启动失败。
    pub fn build(settings: Settings) -> Result<Arc<Self>, WorkspaceError> {
        let store = WorkspaceStore::new(settings.workspace.root.clone())?;
        let sandbox = Sandbox::new(settings.sandbox.clone());
        let tools = ToolProcessManager::from_settings(&settings.tools);
        Ok(Arc::new(Self {
            settings,
            registry: Arc::new(ConnectionRegistry::new()),
            store,
            sandbox,
            tools,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_creates_workspace_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("ws");
        let mut settings = Settings::default();
        settings.workspace.root = root.clone();

        let state = AppState::build(settings).unwrap();
        assert!(root.is_dir());
        assert_eq!(state.registry.connection_count(), 0);
    }
}
