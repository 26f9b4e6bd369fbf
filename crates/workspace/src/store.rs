//! 工作区文件存储
//!
//! 所有操作接受工作区相对路径，并在任何文件系统调用之前完成路径
//! 解析与越界检查。同一路径上的并发操作通过路径锁串行化，避免
//! 交错写入；两个并发写以"整个写入"为粒度后写覆盖。

use crate::error::WorkspaceError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// 目录项类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// 目录列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub kind: EntryKind,
    pub path: String,
}

/// 根目录受限的工作区文件存储
///
/// 工作区内文件内容的唯一可信来源。写入在应答之前落盘。
pub struct WorkspaceStore {
    root: PathBuf,
    path_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl WorkspaceStore {
    /// 创建存储并确保根目录存在
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self {
            root,
            path_locks: DashMap::new(),
        })
    }

    /// 工作区根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 读取文件内容
    pub async fn read(&self, path: &str) -> Result<String, WorkspaceError> {
        let (abs, rel) = self.resolve_file(path)?;
        let _guard = self.lock_path(rel).await;
        match tokio::fs::read_to_string(&abs).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkspaceError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 写入文件内容
    ///
    /// 按需创建父目录；已存在时幂等覆盖。
    pub async fn write(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let (abs, rel) = self.resolve_file(path)?;
        let _guard = self.lock_path(rel).await;
        if let Some(parent) = abs.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&abs, content).await?;
        debug!(path, bytes = content.len(), "workspace write");
        Ok(())
    }

    /// 创建文件
    ///
    /// 与 `write` 语义一致（已存在时静默覆盖，后写生效），独立存在
    /// 只为协议对称。
    pub async fn create(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        self.write(path, content).await
    }

    /// 非递归列出一层目录
    ///
    /// `directory` 为空字符串时列出根目录。
    pub async fn list(&self, directory: &str) -> Result<Vec<FileEntry>, WorkspaceError> {
        let (abs, rel) = self.resolve(directory)?;
        match tokio::fs::metadata(&abs).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(WorkspaceError::NotADirectory(directory.to_string()))
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkspaceError::NotFound(directory.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&abs).await?;
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if entry.file_type().await?.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let path = if rel.as_os_str().is_empty() {
                name.clone()
            } else {
                format!("{}/{}", rel.to_string_lossy(), name)
            };
            entries.push(FileEntry { name, kind, path });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// 删除文件或递归删除目录
    ///
    /// 路径不存在是错误，不静默忽略。
    pub async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
        let (abs, rel) = self.resolve_file(path)?;
        let _guard = self.lock_path(rel).await;
        let meta = match tokio::fs::metadata(&abs).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WorkspaceError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&abs).await?;
        } else {
            tokio::fs::remove_file(&abs).await?;
        }
        debug!(path, "workspace delete");
        Ok(())
    }

    /// 重命名/移动文件或目录
    ///
    /// 按需创建目标父目录；源不存在时失败。
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), WorkspaceError> {
        let (old_abs, old_rel) = self.resolve_file(old_path)?;
        let (new_abs, new_rel) = self.resolve_file(new_path)?;

        // 按固定顺序取锁，避免并发 rename 死锁
        let (first, second) = if old_rel <= new_rel {
            (old_rel.clone(), new_rel.clone())
        } else {
            (new_rel.clone(), old_rel.clone())
        };
        let _g1 = self.lock_path(first).await;
        let _g2 = if old_rel != new_rel {
            Some(self.lock_path(second).await)
        } else {
            None
        };

        if tokio::fs::metadata(&old_abs).await.is_err() {
            return Err(WorkspaceError::RenameSourceMissing(old_path.to_string()));
        }
        if let Some(parent) = new_abs.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&old_abs, &new_abs).await?;
        debug!(old_path, new_path, "workspace rename");
        Ok(())
    }

    /// 将相对路径解析为 (绝对路径, 规范化相对路径)
    ///
    /// 拒绝绝对路径和任何越出根目录的 `..` 组合。空路径表示根目录。
    fn resolve(&self, path: &str) -> Result<(PathBuf, PathBuf), WorkspaceError> {
        let mut normalized = PathBuf::new();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(WorkspaceError::PathEscape(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(WorkspaceError::PathEscape(path.to_string()))
                }
            }
        }
        Ok((self.root.join(&normalized), normalized))
    }

    /// 同 `resolve`，但要求路径指向根目录之下的某个具体条目
    fn resolve_file(&self, path: &str) -> Result<(PathBuf, PathBuf), WorkspaceError> {
        let (abs, rel) = self.resolve(path)?;
        if rel.as_os_str().is_empty() {
            return Err(WorkspaceError::PathEscape(path.to_string()));
        }
        Ok((abs, rel))
    }

    async fn lock_path(&self, rel: PathBuf) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .path_locks
            .entry(rel)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
