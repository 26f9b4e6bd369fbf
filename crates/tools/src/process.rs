//! 单个工具进程
//!
//! 封装一个外部工具服务进程：显式状态机、stdio JSON 行协议的
//! 请求/响应往返、以及后台崩溃监视。进程句柄由本结构独占，
//! 不跨请求复用。

use crate::error::ToolError;
use crate::kinds::ToolKindSpec;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// 工具进程生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Starting,
    Running,
    Stopped,
    Failed,
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolStatus::Starting => "starting",
            ToolStatus::Running => "running",
            ToolStatus::Stopped => "stopped",
            ToolStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 对外可见的进程状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProcessStatus {
    #[serde(rename = "processId")]
    pub process_id: String,
    #[serde(rename = "toolKind")]
    pub tool_kind: String,
    pub status: ToolStatus,
    #[serde(rename = "startedAt")]
    pub started_at: String,
}

/// stdio 往返通道（invoke 按进程串行化，一个请求对应一行响应）
struct ToolIo {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

/// 一个被跟踪的工具进程
pub(crate) struct ToolProcess {
    pub(crate) id: String,
    pub(crate) kind: String,
    started_at: String,
    status: RwLock<ToolStatus>,
    io: Mutex<Option<ToolIo>>,
    child: Arc<Mutex<Option<Child>>>,
}

impl ToolProcess {
    /// 启动进程并进入 `starting` 状态，同时挂起崩溃监视任务
    pub(crate) fn launch(spec: &ToolKindSpec) -> Result<Arc<Self>, ToolError> {
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Launch {
                kind: spec.name.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| ToolError::Protocol(
            "tool stdin unavailable".to_string(),
        ))?;
        let stdout = child.stdout.take().ok_or_else(|| ToolError::Protocol(
            "tool stdout unavailable".to_string(),
        ))?;

        let process = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            kind: spec.name.clone(),
            started_at: Utc::now().to_rfc3339(),
            status: RwLock::new(ToolStatus::Starting),
            io: Mutex::new(Some(ToolIo {
                stdin,
                lines: BufReader::new(stdout).lines(),
            })),
            child: Arc::new(Mutex::new(Some(child))),
        });

        info!(id = %process.id, kind = %process.kind, "tool process launched");
        tokio::spawn(monitor_exit(process.clone()));
        Ok(process)
    }

    pub(crate) fn status(&self) -> ToolStatus {
        *self.status.read()
    }

    pub(crate) fn set_status(&self, status: ToolStatus) {
        let mut guard = self.status.write();
        if *guard != status {
            info!(id = %self.id, kind = %self.kind, from = %*guard, to = %status, "tool status transition");
            *guard = status;
        }
    }

    pub(crate) fn snapshot(&self) -> ToolProcessStatus {
        ToolProcessStatus {
            process_id: self.id.clone(),
            tool_kind: self.kind.clone(),
            status: self.status(),
            started_at: self.started_at.clone(),
        }
    }

    /// 一次请求/响应往返
    ///
    /// 写一行 JSON 请求，在超时内等待一行 JSON 响应。stdio 是单一
    /// 通道，同一进程上的往返经互斥锁串行化。
    pub(crate) async fn roundtrip(
        &self,
        request: &serde_json::Value,
        timeout_ms: u64,
    ) -> Result<serde_json::Value, ToolError> {
        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| ToolError::NotRunning(self.id.clone()))?;

        let mut line = serde_json::to_string(request)
            .map_err(|e| ToolError::Protocol(format!("unserializable request: {e}")))?;
        line.push('\n');
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        let response = tokio::time::timeout(Duration::from_millis(timeout_ms), io.lines.next_line())
            .await
            .map_err(|_| ToolError::InvokeTimeout {
                process_id: self.id.clone(),
                timeout_ms,
            })?;

        match response? {
            Some(line) => serde_json::from_str(&line)
                .map_err(|e| ToolError::Protocol(format!("unparseable tool response: {e}"))),
            None => {
                // stdout 关闭意味着进程已死
                self.set_status(ToolStatus::Failed);
                Err(ToolError::Protocol(
                    "tool process closed its output".to_string(),
                ))
            }
        }
    }

    /// 终止底层进程并释放句柄；重复调用无害
    pub(crate) async fn kill(&self) {
        let mut io = self.io.lock().await;
        *io = None;
        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
            let _ = child.wait().await;
            info!(id = %self.id, kind = %self.kind, "tool process terminated");
        }
    }
}

/// 崩溃监视：轮询子进程退出；意外退出把状态置为 failed
///
/// 句柄被 `kill` 取走（主动 stop）时循环自然结束。
async fn monitor_exit(process: Arc<ToolProcess>) {
    loop {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut guard = process.child.lock().await;
        match guard.as_mut() {
            None => break,
            Some(child) => match child.try_wait() {
                Ok(Some(exit)) => {
                    *guard = None;
                    drop(guard);
                    if process.status() != ToolStatus::Stopped {
                        warn!(
                            id = %process.id,
                            kind = %process.kind,
                            code = ?exit.code(),
                            "tool process exited unexpectedly"
                        );
                        process.set_status(ToolStatus::Failed);
                    }
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(id = %process.id, "tool process wait failed: {e}");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ToolStatus::Starting.to_string(), "starting");
        assert_eq!(ToolStatus::Running.to_string(), "running");
        assert_eq!(ToolStatus::Stopped.to_string(), "stopped");
        assert_eq!(ToolStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ToolStatus::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn test_snapshot_field_names() {
        let snapshot = ToolProcessStatus {
            process_id: "p-1".to_string(),
            tool_kind: "fetch".to_string(),
            status: ToolStatus::Starting,
            started_at: "2026-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["processId"], "p-1");
        assert_eq!(json["toolKind"], "fetch");
        assert_eq!(json["status"], "starting");
    }
}
