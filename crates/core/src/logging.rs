//! 日志初始化
//!
//! 基于 tracing-subscriber 的全局订阅器配置。`WORKHUB_LOG` 环境变量
//! 优先于配置文件中的过滤指令。

use crate::config::LoggingSettings;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// 初始化全局日志订阅器
///
/// 重复调用是安全的（测试中多个用例可能各自调用），只有第一次生效。
pub fn init(settings: &LoggingSettings) {
    let filter = settings.filter.clone();
    INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_env("WORKHUB_LOG")
            .unwrap_or_else(|_| EnvFilter::new(filter));
        let _ = fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init();
        tracing::debug!("logging initialized");
    });
}
