//! 沙箱执行器
//!
//! 每次 `execute` 启动一个全新的解释器子进程运行嵌入的执行壳，
//! 用户代码经 stdin 传入，console 输出按行流式转发给调用方持有的
//! 通道，终止行解析为返回值或用户错误。墙钟超时到期后强杀子进程，
//! 释放其持有的全部资源。

use crate::error::SandboxError;
use crate::harness::JS_HARNESS;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use workhub_core::config::SandboxSettings;

/// 调用方持有的 console 输出通道
///
/// 沙箱内程序每次调用打印原语，输出行会立即通过该通道送出，
/// 即使整体执行随后失败或超时。
pub type ConsoleSink = mpsc::UnboundedSender<String>;

/// 一次执行的结果
///
/// 每个执行请求恰好产生一次；正常完成时 `result` 是返回值的文本
/// 表示，抛出或超时时 `error` 被填充而 `result` 为空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub result: Option<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(message.into()),
        }
    }
}

/// 执行壳输出协议中的一行
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum HarnessLine {
    Console { output: String },
    Result { value: Option<String> },
    Error { message: String },
}

/// 代码执行沙箱
///
/// 无共享可变解释器状态，多个连接的执行可完全并行，各自独立计时。
#[derive(Debug, Clone)]
pub struct Sandbox {
    settings: SandboxSettings,
}

impl Sandbox {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    /// 执行一段代码
    ///
    /// 对调用方是同步语义：返回时结果已经确定。仅 `javascript` 受
    /// 支持，其他语言直接返回带错误的结果而不尝试执行。
    ///
    /// `Err` 只在沙箱宿主自身失败时出现（解释器缺失、协议破坏），
    /// 调用方应将其与用户程序失败区分上报。
    pub async fn execute(
        &self,
        source: &str,
        language: &str,
        console: ConsoleSink,
    ) -> Result<ExecutionResult, SandboxError> {
        if !language.eq_ignore_ascii_case("javascript") {
            return Ok(ExecutionResult::failure(format!(
                "unsupported language: {language}"
            )));
        }

        let timeout = Duration::from_millis(self.settings.timeout_ms);
        let harness = JS_HARNESS.replace("__TIMEOUT_MS__", &self.settings.timeout_ms.to_string());

        let mut child = Command::new(&self.settings.interpreter)
            .arg("-e")
            .arg(harness)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SandboxError::InterpreterNotFound(self.settings.interpreter.clone())
                } else {
                    SandboxError::Spawn(e)
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SandboxError::Protocol("interpreter stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SandboxError::Protocol("interpreter stdout unavailable".to_string()))?;

        stdin.write_all(source.as_bytes()).await?;
        drop(stdin);

        let outcome = tokio::time::timeout(timeout, read_outcome(stdout, console)).await;

        match outcome {
            Ok(result) => {
                // 终止行已到手；无论子进程是否还挂着计时器，直接回收
                let _ = child.start_kill();
                let _ = child.wait().await;
                result
            }
            Err(_elapsed) => {
                warn!(
                    timeout_ms = self.settings.timeout_ms,
                    "execution exceeded wall clock limit, killing interpreter"
                );
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(ExecutionResult::failure(format!(
                    "execution timed out after {}ms",
                    self.settings.timeout_ms
                )))
            }
        }
    }
}

/// 读取执行壳输出直到终止行
///
/// console 行在到达时立即转发（流式，不攒批）。stdout 在终止行之前
/// 关闭视为协议破坏，按宿主故障上报。
async fn read_outcome(
    stdout: tokio::process::ChildStdout,
    console: ConsoleSink,
) -> Result<ExecutionResult, SandboxError> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: HarnessLine = serde_json::from_str(&line)
            .map_err(|e| SandboxError::Protocol(format!("unparseable harness line: {e}")))?;
        match parsed {
            HarnessLine::Console { output } => {
                debug!(output = %output, "console line");
                // 接收端可能已断开（连接关闭），此时丢弃不算错误
                let _ = console.send(output);
            }
            HarnessLine::Result { value } => {
                return Ok(ExecutionResult {
                    result: value,
                    error: None,
                })
            }
            HarnessLine::Error { message } => return Ok(ExecutionResult::failure(message)),
        }
    }
    Err(SandboxError::Protocol(
        "interpreter exited without a result".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox_with_timeout(timeout_ms: u64) -> Sandbox {
        Sandbox::new(SandboxSettings {
            interpreter: "node".to_string(),
            timeout_ms,
        })
    }

    fn node_available() -> bool {
        std::process::Command::new("node")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn sink() -> (ConsoleSink, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_unsupported_language_rejected_without_execution() {
        let sandbox = sandbox_with_timeout(5000);
        let (tx, _rx) = sink();
        let result = sandbox.execute("print('hi')", "python", tx).await.unwrap();
        assert_eq!(result.result, None);
        assert_eq!(
            result.error.as_deref(),
            Some("unsupported language: python")
        );
    }

    #[tokio::test]
    async fn test_expression_result_is_textual() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(5000);
        let (tx, _rx) = sink();
        let result = sandbox.execute("1 + 1", "javascript", tx).await.unwrap();
        assert_eq!(result.result.as_deref(), Some("2"));
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_object_result_is_stringified() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(5000);
        let (tx, _rx) = sink();
        let result = sandbox
            .execute("({ a: 1, b: [2, 3] })", "javascript", tx)
            .await
            .unwrap();
        assert_eq!(result.result.as_deref(), Some(r#"{"a":1,"b":[2,3]}"#));
    }

    #[tokio::test]
    async fn test_console_output_streams_then_null_result() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(5000);
        let (tx, mut rx) = sink();
        let result = sandbox
            .execute("console.log(1+1)", "javascript", tx)
            .await
            .unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("2"));
        assert_eq!(result.result, None);
        assert_eq!(result.error, None);
    }

    #[tokio::test]
    async fn test_thrown_error_populates_error_field() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(5000);
        let (tx, _rx) = sink();
        let result = sandbox
            .execute("throw new Error('boom')", "javascript", tx)
            .await
            .unwrap();
        assert_eq!(result.result, None);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out_within_margin() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(500);
        let (tx, _rx) = sink();
        let started = std::time::Instant::now();
        let result = sandbox
            .execute("while (true) {}", "javascript", tx)
            .await
            .unwrap();
        assert!(result.result.is_none());
        assert!(result.error.is_some(), "timeout must populate error");
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "timeout must not hang the request"
        );
    }

    #[tokio::test]
    async fn test_console_output_delivered_even_when_execution_times_out() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(500);
        let (tx, mut rx) = sink();
        let result = sandbox
            .execute("console.log('before hang'); while (true) {}", "javascript", tx)
            .await
            .unwrap();
        assert!(result.error.is_some());
        assert_eq!(rx.recv().await.as_deref(), Some("before hang"));
    }

    #[tokio::test]
    async fn test_concurrent_executions_are_isolated() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let looping = sandbox_with_timeout(2000);
        let prompt = sandbox_with_timeout(2000);
        let (tx1, _rx1) = sink();
        let (tx2, _rx2) = sink();

        let slow = tokio::spawn(async move {
            looping.execute("while (true) {}", "javascript", tx1).await
        });
        let started = std::time::Instant::now();
        let fast = prompt.execute("40 + 2", "javascript", tx2).await.unwrap();

        assert_eq!(fast.result.as_deref(), Some("42"));
        assert!(
            started.elapsed() < Duration::from_millis(1500),
            "prompt execution must not wait for the looping one"
        );
        let slow = slow.await.unwrap().unwrap();
        assert!(slow.error.is_some());
    }

    #[tokio::test]
    async fn test_no_state_leaks_between_executions() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(5000);
        let (tx, _rx) = sink();
        let first = sandbox
            .execute("globalThis.leak = 7; leak", "javascript", tx)
            .await
            .unwrap();
        assert_eq!(first.result.as_deref(), Some("7"));

        let (tx, _rx) = sink();
        let second = sandbox
            .execute("typeof leak", "javascript", tx)
            .await
            .unwrap();
        assert_eq!(second.result.as_deref(), Some("undefined"));
    }

    #[tokio::test]
    async fn test_host_apis_not_exposed() {
        if !node_available() {
            eprintln!("node not available, skipping");
            return;
        }
        let sandbox = sandbox_with_timeout(5000);
        let (tx, _rx) = sink();
        let result = sandbox
            .execute("typeof require + ' ' + typeof process", "javascript", tx)
            .await
            .unwrap();
        assert_eq!(result.result.as_deref(), Some("undefined undefined"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_host_failure() {
        let sandbox = Sandbox::new(SandboxSettings {
            interpreter: "definitely-not-a-real-interpreter".to_string(),
            timeout_ms: 1000,
        });
        let (tx, _rx) = sink();
        let err = sandbox.execute("1", "javascript", tx).await.unwrap_err();
        assert!(matches!(err, SandboxError::InterpreterNotFound(_)));
    }
}
