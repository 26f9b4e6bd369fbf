//! 沙箱错误类型

use thiserror::Error;

/// 沙箱宿主故障
///
/// 只覆盖"沙箱本身坏了"的情况；用户程序抛出或超时不走这里，
/// 而是落在 `ExecutionResult::error` 中。
#[derive(Error, Debug)]
pub enum SandboxError {
    /// 解释器二进制不存在或不可执行
    #[error("interpreter not available: {0}")]
    InterpreterNotFound(String),

    /// 启动解释器进程失败
    #[error("failed to spawn interpreter: {0}")]
    Spawn(#[source] std::io::Error),

    /// 解释器违反了输出协议（异常退出、输出不可解析）
    #[error("sandbox protocol failure: {0}")]
    Protocol(String),

    /// 与解释器进程通信的 IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SandboxError> for String {
    fn from(err: SandboxError) -> Self {
        err.to_string()
    }
}
