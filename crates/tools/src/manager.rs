//! 工具进程管理器
//!
//! 所有工具进程的唯一所有者。启动走完就绪探测后才返回，停止是
//! 幂等操作，关停钩子保证不留孤儿进程。

use crate::error::ToolError;
use crate::kinds::ToolKindRegistry;
use crate::process::{ToolProcess, ToolProcessStatus, ToolStatus};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use workhub_core::config::ToolSettings;

/// `stop` 的结果：区分真正停掉、早已停止、不存在三种情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
    NotFound,
}

/// 工具进程管理器
pub struct ToolProcessManager {
    kinds: ToolKindRegistry,
    settings: ToolSettings,
    processes: DashMap<String, Arc<ToolProcess>>,
}

impl ToolProcessManager {
    pub fn new(kinds: ToolKindRegistry, settings: ToolSettings) -> Self {
        Self {
            kinds,
            settings,
            processes: DashMap::new(),
        }
    }

    /// 从配置构建：注册表含默认种类和配置覆盖项
    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(ToolKindRegistry::from_settings(settings), settings.clone())
    }

    /// 已注册的工具种类名
    pub fn kind_names(&self) -> Vec<String> {
        self.kinds.names()
    }

    /// 启动一个工具进程并等待其就绪
    ///
    /// 就绪判定是一次 ping 往返：进程在超时内对
    /// `{"tool":"ping","params":{}}` 回出一行可解析 JSON 即视为
    /// running。探测失败的进程被终止并标记 failed。重复 start 同一
    /// 种类总是产生新的进程 id。
    pub async fn start(&self, kind: &str) -> Result<ToolProcessStatus, ToolError> {
        let spec = self
            .kinds
            .get(kind)
            .ok_or_else(|| ToolError::UnknownKind(kind.to_string()))?;

        let process = ToolProcess::launch(spec)?;
        self.processes.insert(process.id.clone(), process.clone());

        let ping = json!({"tool": "ping", "params": {}});
        match process
            .roundtrip(&ping, self.settings.ready_timeout_ms)
            .await
        {
            Ok(_) => {
                process.set_status(ToolStatus::Running);
                info!(id = %process.id, kind = %process.kind, "tool process ready");
                Ok(process.snapshot())
            }
            Err(e) => {
                warn!(id = %process.id, kind = %process.kind, "tool readiness probe failed: {e}");
                process.kill().await;
                process.set_status(ToolStatus::Failed);
                Err(e)
            }
        }
    }

    /// 停止一个工具进程；幂等
    pub async fn stop(&self, process_id: &str) -> StopOutcome {
        let process = match self.processes.get(process_id) {
            Some(entry) => entry.value().clone(),
            None => return StopOutcome::NotFound,
        };

        match process.status() {
            ToolStatus::Stopped | ToolStatus::Failed => StopOutcome::AlreadyStopped,
            _ => {
                process.set_status(ToolStatus::Stopped);
                process.kill().await;
                StopOutcome::Stopped
            }
        }
    }

    /// 在一个 running 的进程上执行一次工具操作
    ///
    /// 请求写成一行 `{"tool": <operation>, "params": <args>}`，在
    /// 调用超时内等待一行响应。响应带非空 `error` 字段视为操作
    /// 失败；否则返回 `result` 字段（缺省时返回整个响应）。
    pub async fn invoke(
        &self,
        process_id: &str,
        operation: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let process = self
            .processes
            .get(process_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ToolError::NotFound(process_id.to_string()))?;

        if process.status() != ToolStatus::Running {
            return Err(ToolError::NotRunning(process_id.to_string()));
        }

        let request = json!({"tool": operation, "params": args});
        let response = process
            .roundtrip(&request, self.settings.invoke_timeout_ms)
            .await?;

        match response.get("error") {
            Some(err) if !err.is_null() => {
                let message = err
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| err.to_string());
                Err(ToolError::Operation(message))
            }
            _ => Ok(response.get("result").cloned().unwrap_or(response)),
        }
    }

    /// 所有被跟踪进程的状态快照，按启动时间排序
    pub fn list(&self) -> Vec<ToolProcessStatus> {
        let mut snapshots: Vec<ToolProcessStatus> = self
            .processes
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        snapshots
    }

    /// 关停：停止所有尚未结束的进程
    pub async fn shutdown(&self) {
        let processes: Vec<Arc<ToolProcess>> = self
            .processes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for process in processes {
            if matches!(process.status(), ToolStatus::Starting | ToolStatus::Running) {
                info!(id = %process.id, kind = %process.kind, "stopping tool process on shutdown");
                process.set_status(ToolStatus::Stopped);
                process.kill().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::ToolKindSpec;
    use std::time::Duration;

    fn test_settings() -> ToolSettings {
        ToolSettings {
            ready_timeout_ms: 2_000,
            invoke_timeout_ms: 2_000,
            ..ToolSettings::default()
        }
    }

    /// 行协议回显：对每行输入回一行固定 JSON
    fn echo_registry(reply: &str) -> ToolKindRegistry {
        let script = format!("while read line; do echo '{reply}'; done");
        let mut registry = ToolKindRegistry::empty();
        registry.register(ToolKindSpec::new("echo", "sh", &["-c", &script]));
        registry
    }

    #[tokio::test]
    async fn test_start_reaches_running() {
        let manager = ToolProcessManager::new(echo_registry(r#"{"result":"ok"}"#), test_settings());
        let status = manager.start("echo").await.unwrap();
        assert_eq!(status.status, ToolStatus::Running);
        assert_eq!(status.tool_kind, "echo");
        assert!(!status.process_id.is_empty());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_unknown_kind() {
        let manager = ToolProcessManager::new(ToolKindRegistry::empty(), test_settings());
        let err = manager.start("nope").await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownKind(_)));
    }

    #[tokio::test]
    async fn test_start_launch_failure() {
        let mut registry = ToolKindRegistry::empty();
        registry.register(ToolKindSpec::new(
            "ghost",
            "definitely-not-a-real-binary-1b2c",
            &[],
        ));
        let manager = ToolProcessManager::new(registry, test_settings());
        let err = manager.start("ghost").await.unwrap_err();
        assert!(matches!(err, ToolError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_invoke_returns_result() {
        let manager =
            ToolProcessManager::new(echo_registry(r#"{"result":"done"}"#), test_settings());
        let status = manager.start("echo").await.unwrap();
        let result = manager
            .invoke(&status.process_id, "navigate", serde_json::json!({"url": "x"}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!("done"));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_invoke_error_field_is_operation_failure() {
        let manager =
            ToolProcessManager::new(echo_registry(r#"{"error":"boom"}"#), test_settings());
        let status = manager.start("echo").await.unwrap();
        let err = manager
            .invoke(&status.process_id, "navigate", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Operation(ref m) if m == "boom"));
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_invoke_unknown_process() {
        let manager = ToolProcessManager::new(ToolKindRegistry::empty(), test_settings());
        let err = manager
            .invoke("missing", "ping", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let manager = ToolProcessManager::new(echo_registry(r#"{"result":"ok"}"#), test_settings());
        let status = manager.start("echo").await.unwrap();
        assert_eq!(manager.stop(&status.process_id).await, StopOutcome::Stopped);
        assert_eq!(
            manager.stop(&status.process_id).await,
            StopOutcome::AlreadyStopped
        );
        assert_eq!(manager.stop("missing").await, StopOutcome::NotFound);
        let listed = manager.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, ToolStatus::Stopped);
    }

    #[tokio::test]
    async fn test_invoke_after_stop_fails_fast() {
        let manager = ToolProcessManager::new(echo_registry(r#"{"result":"ok"}"#), test_settings());
        let status = manager.start("echo").await.unwrap();
        manager.stop(&status.process_id).await;
        let err = manager
            .invoke(&status.process_id, "ping", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_crash_marks_failed() {
        // 回应一次就绪探测后退出，模拟进程崩溃
        let mut registry = ToolKindRegistry::empty();
        registry.register(ToolKindSpec::new(
            "flaky",
            "sh",
            &["-c", r#"read line; echo '{"result":"ok"}'"#],
        ));
        let manager = ToolProcessManager::new(registry, test_settings());
        let status = manager.start("flaky").await.unwrap();
        assert_eq!(status.status, ToolStatus::Running);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let listed = manager.list();
            if listed[0].status == ToolStatus::Failed {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "crash never detected");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(
            manager.stop(&status.process_id).await,
            StopOutcome::AlreadyStopped
        );
    }

    #[tokio::test]
    async fn test_restart_yields_new_id() {
        let manager = ToolProcessManager::new(echo_registry(r#"{"result":"ok"}"#), test_settings());
        let first = manager.start("echo").await.unwrap();
        manager.stop(&first.process_id).await;
        let second = manager.start("echo").await.unwrap();
        assert_ne!(first.process_id, second.process_id);
        assert_eq!(manager.list().len(), 2);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let manager = ToolProcessManager::new(echo_registry(r#"{"result":"ok"}"#), test_settings());
        manager.start("echo").await.unwrap();
        manager.start("echo").await.unwrap();
        manager.shutdown().await;
        for status in manager.list() {
            assert_eq!(status.status, ToolStatus::Stopped);
        }
    }
}
