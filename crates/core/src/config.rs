//! 配置模块
//!
//! 所有配置均可通过 `WORKHUB_*` 环境变量覆盖，未设置时使用默认值。
//! 配置在进程启动时读取一次，之后只读共享。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 应用配置根结构
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub workspace: WorkspaceSettings,
    pub sandbox: SandboxSettings,
    pub tools: ToolSettings,
    pub logging: LoggingSettings,
}

/// HTTP/WebSocket 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// 工作区配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// 工作区根目录，所有文件操作被限制在该目录内
    pub root: PathBuf,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        let root = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".workhub")
            .join("workspace");
        Self { root }
    }
}

/// 代码执行沙箱配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// 解释器二进制（默认 node）
    pub interpreter: String,
    /// 单次执行的墙钟超时（毫秒）
    pub timeout_ms: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            interpreter: "node".to_string(),
            timeout_ms: 5000,
        }
    }
}

/// 工具进程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// 就绪探测超时（毫秒）
    pub ready_timeout_ms: u64,
    /// 单次 invoke 的响应超时（毫秒）
    pub invoke_timeout_ms: u64,
    /// 额外的工具种类覆盖（kind -> 启动命令行）
    #[serde(default)]
    pub kind_overrides: HashMap<String, Vec<String>>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            ready_timeout_ms: 10_000,
            invoke_timeout_ms: 30_000,
            kind_overrides: HashMap::new(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// tracing 过滤指令，如 "info" 或 "workhub=debug"
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// 从环境变量构建配置
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Ok(host) = std::env::var("WORKHUB_HOST") {
            settings.server.host = host;
        }
        if let Some(port) = env_parse("WORKHUB_PORT") {
            settings.server.port = port;
        }
        if let Ok(root) = std::env::var("WORKHUB_WORKSPACE_ROOT") {
            settings.workspace.root = PathBuf::from(root);
        }
        if let Ok(interpreter) = std::env::var("WORKHUB_SANDBOX_INTERPRETER") {
            settings.sandbox.interpreter = interpreter;
        }
        if let Some(timeout) = env_parse("WORKHUB_SANDBOX_TIMEOUT_MS") {
            settings.sandbox.timeout_ms = timeout;
        }
        if let Some(timeout) = env_parse("WORKHUB_TOOL_READY_TIMEOUT_MS") {
            settings.tools.ready_timeout_ms = timeout;
        }
        if let Some(timeout) = env_parse("WORKHUB_TOOL_INVOKE_TIMEOUT_MS") {
            settings.tools.invoke_timeout_ms = timeout;
        }
        if let Ok(filter) = std::env::var("WORKHUB_LOG") {
            settings.logging.filter = filter;
        }

        settings
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.sandbox.interpreter, "node");
        assert_eq!(settings.sandbox.timeout_ms, 5000);
        assert_eq!(settings.tools.ready_timeout_ms, 10_000);
        assert_eq!(settings.tools.invoke_timeout_ms, 30_000);
    }

    #[test]
    fn test_settings_serialize_roundtrip() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.server.port, settings.server.port);
        assert_eq!(parsed.workspace.root, settings.workspace.root);
    }
}
