//! 文件系统监听器
//!
//! 监听工作区根目录的整个子树，忽略点前缀的隐藏条目。任何变更事件
//! 都会重新读取对应文件并通过注入的发射器广播 `file_changed` 事件，
//! 携带完整的最新内容（全量推送，不是 diff）。
//!
//! notify 的回调运行在自己的线程上，事件被桥接进单个 tokio 消费任务，
//! 保证同一路径的广播顺序与变更应用顺序一致。

use crate::emitter::{DynEmitter, WorkspaceEventEmit};
use crate::error::WorkspaceError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 工作区文件系统监听器
///
/// 持有底层 watcher 和消费任务；`stop` 或 Drop 时两者一并释放。
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WorkspaceWatcher {
    /// 启动对 `root` 子树的监听，变更经 `emitter` 广播
    pub fn spawn(root: PathBuf, emitter: DynEmitter) -> Result<Self, WorkspaceError> {
        let (tx, rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.send(event);
                }
                Err(e) => warn!("watcher backend error: {e}"),
            })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        let task = tokio::spawn(consume_events(root, rx, emitter));

        Ok(Self {
            _watcher: watcher,
            task,
        })
    }

    /// 停止监听并结束消费任务
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for WorkspaceWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 单消费者事件循环：逐个处理变更，保证同一路径的广播按应用顺序送达
///
/// 一次写入可能触发多个底层事件（create + modify），对同一路径的
/// 连续相同内容只广播一次。
async fn consume_events(root: PathBuf, mut rx: mpsc::UnboundedReceiver<Event>, emitter: DynEmitter) {
    let mut last_broadcast: std::collections::HashMap<String, String> = Default::default();
    while let Some(event) = rx.recv().await {
        if !is_relevant_event(&event.kind) {
            continue;
        }
        for path in &event.paths {
            let Some(rel) = relative_visible_path(&root, path) else {
                continue;
            };
            // 重新读取当前内容；路径已消失或指向目录的事件直接丢弃
            // （删除通过操作应答告知请求方）
            match tokio::fs::metadata(path).await {
                Ok(meta) if meta.is_file() => {}
                _ => {
                    // 路径已消失：清掉去重记录，之后重建同名文件要再广播
                    last_broadcast.remove(&rel);
                    continue;
                }
            }
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    if last_broadcast.get(&rel).is_some_and(|prev| prev == &content) {
                        continue;
                    }
                    debug!(path = %rel, "broadcasting file change");
                    if let Err(e) =
                        emitter.emit_event("file_changed", &json!({ "path": rel, "content": content }))
                    {
                        warn!("file_changed broadcast failed: {e}");
                    }
                    last_broadcast.insert(rel, content);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %rel, "skipping unreadable change: {e}"),
            }
        }
    }
}

/// 删除事件也要进入循环：它不广播，但会清掉对应的去重记录
fn is_relevant_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// 计算根目录下的相对路径；隐藏（点前缀）条目或根外路径返回 None
fn relative_visible_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    for component in rel.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.starts_with('.') {
            return None;
        }
    }
    Some(rel.to_string_lossy().replace('\\', "/"))
}
