//! 请求分发
//!
//! 把解码后的客户端请求路由到对应组件，并把结果事件发回请求方。
//! 所有失败路径都收敛为 `error` 事件，不断开连接也不影响其他连接。

use crate::hub::ConnectionId;
use crate::protocol::{ClientRequest, ServerEvent};
use crate::state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use workhub_tools::StopOutcome;

/// 处理一条入站文本消息
///
/// 解码失败回 `error` 事件给发送方；其余情况路由到具体操作。
/// 调用方为每条消息单独起任务，长执行不会阻塞读循环。
pub async fn handle_message(state: Arc<AppState>, conn: ConnectionId, text: &str) {
    let request = match ClientRequest::decode(text) {
        Ok(request) => request,
        Err(e) => {
            warn!(connection = %conn, "undecodable message: {e}");
            state.registry.send(
                conn,
                ServerEvent::Error {
                    message: e.to_string(),
                },
            );
            return;
        }
    };

    debug!(connection = %conn, request = request.kind(), "dispatch");
    let event = dispatch(&state, conn, request).await;
    state.registry.send(conn, event);
}

async fn dispatch(state: &Arc<AppState>, conn: ConnectionId, request: ClientRequest) -> ServerEvent {
    match request {
        ClientRequest::ExecuteCode { code, language } => {
            execute_code(state, conn, code, language).await
        }

        ClientRequest::ReadFile { file_path } => match state.store.read(&file_path).await {
            Ok(content) => ServerEvent::FileContent {
                path: file_path,
                content,
            },
            Err(e) => error_event(e),
        },

        ClientRequest::WriteFile { file_path, content } => {
            match state.store.write(&file_path, &content).await {
                Ok(()) => ServerEvent::FileWritten { path: file_path },
                Err(e) => error_event(e),
            }
        }

        ClientRequest::CreateFile { file_path, content } => {
            match state.store.create(&file_path, &content).await {
                Ok(()) => ServerEvent::FileCreated { path: file_path },
                Err(e) => error_event(e),
            }
        }

        ClientRequest::DeleteFile { file_path } => match state.store.delete(&file_path).await {
            Ok(()) => ServerEvent::FileDeleted { path: file_path },
            Err(e) => error_event(e),
        },

        ClientRequest::RenameFile { old_path, new_path } => {
            match state.store.rename(&old_path, &new_path).await {
                Ok(()) => ServerEvent::FileRenamed { old_path, new_path },
                Err(e) => error_event(e),
            }
        }

        ClientRequest::ListFiles { directory } => match state.store.list(&directory).await {
            Ok(files) => ServerEvent::FileList { files, directory },
            Err(e) => error_event(e),
        },

        ClientRequest::StartTool { tool_kind } => match state.tools.start(&tool_kind).await {
            Ok(process) => ServerEvent::tool_started(process),
            Err(e) => error_event(e),
        },

        ClientRequest::StopTool { process_id } => match state.tools.stop(&process_id).await {
            StopOutcome::Stopped => ServerEvent::ToolStopped {
                process_id,
                stopped: true,
            },
            StopOutcome::AlreadyStopped => ServerEvent::ToolStopped {
                process_id,
                stopped: false,
            },
            StopOutcome::NotFound => ServerEvent::Error {
                message: format!("tool process not found: {process_id}"),
            },
        },

        ClientRequest::ListTools {} => ServerEvent::ToolList {
            processes: state.tools.list(),
        },

        ClientRequest::InvokeTool {
            process_id,
            operation,
            params,
        } => match state.tools.invoke(&process_id, &operation, params).await {
            Ok(result) => ServerEvent::ToolResult { process_id, result },
            Err(e) => error_event(e),
        },
    }
}

/// 执行一段代码，console 输出在执行期间即时转发给请求方
async fn execute_code(
    state: &Arc<AppState>,
    conn: ConnectionId,
    code: String,
    language: String,
) -> ServerEvent {
    let (console_tx, mut console_rx) = mpsc::unbounded_channel();
    let registry = state.registry.clone();
    let forward = tokio::spawn(async move {
        while let Some(output) = console_rx.recv().await {
            registry.send(conn, ServerEvent::ConsoleOutput { output });
        }
    });

    match state.sandbox.execute(&code, &language, console_tx).await {
        Ok(outcome) => {
            // 发送端已随执行结束关闭；等转发排空保证 console 先于结果
            let _ = forward.await;
            ServerEvent::ExecutionResult {
                result: outcome.result,
                error: outcome.error,
                language,
            }
        }
        Err(e) => {
            forward.abort();
            warn!(connection = %conn, "sandbox host failure: {e}");
            ServerEvent::ExecutionError {
                error: e.to_string(),
            }
        }
    }
}

fn error_event(err: impl Into<String>) -> ServerEvent {
    ServerEvent::Error {
        message: err.into(),
    }
}
