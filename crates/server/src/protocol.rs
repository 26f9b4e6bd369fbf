//! 线协议
//!
//! 两个方向都使用 `{type, payload}` 信封。入站请求是有限集合上的
//! 带标签和类型：未知 `type` 与格式破坏的 payload 是两类不同错误，
//! 均只回给发送方且不断开连接。出站事件同样走信封编码。

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use workhub_tools::ToolProcessStatus;
use workhub_workspace::store::FileEntry;

/// 入站请求解码错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// 信封完好但 type 不在请求集合内
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// 不是 JSON、缺少 type、或 payload 与请求类型不匹配
    #[error("invalid message format")]
    Malformed,
}

/// 客户端请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientRequest {
    ExecuteCode {
        code: String,
        #[serde(default = "default_language")]
        language: String,
    },
    ReadFile {
        #[serde(rename = "filePath")]
        file_path: String,
    },
    WriteFile {
        #[serde(rename = "filePath")]
        file_path: String,
        content: String,
    },
    CreateFile {
        #[serde(rename = "filePath")]
        file_path: String,
        #[serde(default)]
        content: String,
    },
    DeleteFile {
        #[serde(rename = "filePath")]
        file_path: String,
    },
    RenameFile {
        #[serde(rename = "oldPath")]
        old_path: String,
        #[serde(rename = "newPath")]
        new_path: String,
    },
    ListFiles {
        #[serde(default)]
        directory: String,
    },
    StartTool {
        #[serde(rename = "toolKind")]
        tool_kind: String,
    },
    StopTool {
        #[serde(rename = "processId")]
        process_id: String,
    },
    // 空结构体变体而非单元变体：payload 为 {} 或缺省都能解码
    ListTools {},
    InvokeTool {
        #[serde(rename = "processId")]
        process_id: String,
        operation: String,
        #[serde(default)]
        params: serde_json::Value,
    },
}

fn default_language() -> String {
    "javascript".to_string()
}

/// 请求集合中的全部 type 标签
const REQUEST_TYPES: &[&str] = &[
    "execute_code",
    "read_file",
    "write_file",
    "create_file",
    "delete_file",
    "rename_file",
    "list_files",
    "start_tool",
    "stop_tool",
    "list_tools",
    "invoke_tool",
];

/// 入站信封，先于具体请求类型解析以区分两类解码错误
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl ClientRequest {
    /// 请求的 type 标签（日志用）
    pub fn kind(&self) -> &'static str {
        match self {
            ClientRequest::ExecuteCode { .. } => "execute_code",
            ClientRequest::ReadFile { .. } => "read_file",
            ClientRequest::WriteFile { .. } => "write_file",
            ClientRequest::CreateFile { .. } => "create_file",
            ClientRequest::DeleteFile { .. } => "delete_file",
            ClientRequest::RenameFile { .. } => "rename_file",
            ClientRequest::ListFiles { .. } => "list_files",
            ClientRequest::StartTool { .. } => "start_tool",
            ClientRequest::StopTool { .. } => "stop_tool",
            ClientRequest::ListTools {} => "list_tools",
            ClientRequest::InvokeTool { .. } => "invoke_tool",
        }
    }

    /// 解码一条入站文本消息
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|_| DecodeError::Malformed)?;
        let payload = if envelope.payload.is_null() {
            json!({})
        } else {
            envelope.payload
        };
        let tagged = json!({"type": envelope.kind, "payload": payload});
        match serde_json::from_value(tagged) {
            Ok(request) => Ok(request),
            Err(_) if REQUEST_TYPES.contains(&envelope.kind.as_str()) => Err(DecodeError::Malformed),
            Err(_) => Err(DecodeError::UnknownType(envelope.kind)),
        }
    }
}

/// 服务端事件
///
/// 大多数事件只发给请求方；`file_changed` 由文件监听器广播给所有
/// 连接。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    ConsoleOutput {
        output: String,
    },
    ExecutionResult {
        result: Option<String>,
        error: Option<String>,
        language: String,
    },
    ExecutionError {
        error: String,
    },
    FileContent {
        path: String,
        content: String,
    },
    FileWritten {
        path: String,
    },
    FileCreated {
        path: String,
    },
    FileDeleted {
        path: String,
    },
    FileRenamed {
        #[serde(rename = "oldPath")]
        old_path: String,
        #[serde(rename = "newPath")]
        new_path: String,
    },
    FileList {
        files: Vec<FileEntry>,
        directory: String,
    },
    FileChanged {
        path: String,
        content: String,
    },
    ToolStarted {
        #[serde(rename = "processId")]
        process_id: String,
        #[serde(rename = "toolKind")]
        tool_kind: String,
        status: workhub_tools::ToolStatus,
        #[serde(rename = "startedAt")]
        started_at: String,
    },
    ToolStopped {
        #[serde(rename = "processId")]
        process_id: String,
        stopped: bool,
    },
    ToolList {
        processes: Vec<ToolProcessStatus>,
    },
    ToolResult {
        #[serde(rename = "processId")]
        process_id: String,
        result: serde_json::Value,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// 从进程快照构造 `tool_started` 事件
    pub fn tool_started(process: ToolProcessStatus) -> Self {
        ServerEvent::ToolStarted {
            process_id: process.process_id,
            tool_kind: process.tool_kind,
            status: process.status,
            started_at: process.started_at,
        }
    }

    /// 编码为线上的信封文本
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","payload":{"message":"event serialization failed"}}"#.to_string()
        })
    }
}
