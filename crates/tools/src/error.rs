//! 工具进程错误类型

use thiserror::Error;

/// 工具进程操作错误
#[derive(Error, Debug)]
pub enum ToolError {
    /// 未注册的工具种类
    #[error("unknown tool kind: {0}")]
    UnknownKind(String),

    /// 启动工具进程失败
    #[error("failed to launch tool '{kind}': {source}")]
    Launch {
        kind: String,
        #[source]
        source: std::io::Error,
    },

    /// 进程 id 未被跟踪
    #[error("tool process not found: {0}")]
    NotFound(String),

    /// 进程不在 running 状态，操作被快速拒绝
    #[error("tool process not running: {0}")]
    NotRunning(String),

    /// invoke 在超时时间内未收到响应
    #[error("tool invocation timed out after {timeout_ms}ms: {process_id}")]
    InvokeTimeout { process_id: String, timeout_ms: u64 },

    /// 工具自身报告的操作失败
    #[error("tool operation failed: {0}")]
    Operation(String),

    /// stdio 协议破坏（输出不可解析、进程关闭了管道）
    #[error("tool protocol failure: {0}")]
    Protocol(String),

    /// 与工具进程通信的 IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for String {
    fn from(err: ToolError) -> Self {
        err.to_string()
    }
}
