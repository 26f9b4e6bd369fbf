//! WebSocket/HTTP 服务层
//!
//! 工作区服务器的连接枢纽：接收 `{type, payload}` 信封格式的客户端
//! 请求，分发到工作区存储、代码沙箱和工具进程管理器，并把事件推回
//! 连接。文件变更等共享状态事件广播给所有连接。
//!
//! ## 模块结构
//! - `protocol` - 双向线协议（请求/事件信封类型与解码）
//! - `hub` - 连接注册表（attach/send/broadcast/detach）
//! - `state` - 共享服务状态（存储、沙箱、工具管理器）
//! - `dispatch` - 请求分发（每条消息独立任务处理）
//! - `ws` - WebSocket 升级与收发循环
//! - `routes` - HTTP 路由（/health、/workspace、/ws）

pub mod dispatch;
pub mod hub;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod ws;

pub use hub::{ConnectionId, ConnectionRegistry};
pub use protocol::{ClientRequest, DecodeError, ServerEvent};
pub use routes::build_router;
pub use state::AppState;
