//! 工作区错误类型

use thiserror::Error;

/// 工作区操作错误
///
/// 涵盖文件存储和监听器中可能出现的所有错误情况。
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// 文件或目录不存在
    #[error("file not found: {0}")]
    NotFound(String),

    /// 路径越出工作区根目录
    #[error("path escapes workspace root: {0}")]
    PathEscape(String),

    /// 期望目录但给定的是文件
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// 重命名源路径不存在
    #[error("rename source missing: {0}")]
    RenameSourceMissing(String),

    /// 监听器错误
    #[error("watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<WorkspaceError> for String {
    fn from(err: WorkspaceError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkspaceError::NotFound("a/b.txt".to_string());
        assert_eq!(err.to_string(), "file not found: a/b.txt");

        let err = WorkspaceError::PathEscape("../../etc/passwd".to_string());
        assert_eq!(
            err.to_string(),
            "path escapes workspace root: ../../etc/passwd"
        );
    }

    #[test]
    fn test_error_to_string() {
        let err = WorkspaceError::RenameSourceMissing("old.txt".to_string());
        let s: String = err.into();
        assert_eq!(s, "rename source missing: old.txt");
    }
}
