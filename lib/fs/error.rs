//! Filesystem-level errors and their errno mapping.

use thiserror::Error;
use tracing::error;

use super::handles::HandleError;
use super::tree::TreeError;

/// Errors surfaced to the kernel.
#[derive(Debug, Error)]
pub enum FsError {
    /// No such node or name.
    #[error("no such file or directory")]
    NotFound,

    /// Directory operation on a non-directory.
    #[error("not a directory")]
    NotADirectory,

    /// File operation on a directory.
    #[error("is a directory")]
    IsADirectory,

    /// Bad write value or offset, or an operation the node kind does not support.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Write access to a read-only node.
    #[error("operation not permitted")]
    PermissionDenied,

    /// Read from a node without read permission.
    #[error("node is not readable")]
    NotReadable,

    /// Unknown file handle.
    #[error("bad file handle {0}")]
    BadHandle(u64),

    /// No free file handle.
    #[error("too many open files")]
    Exhausted,

    /// The backend failed.
    #[error("backend failure: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Internal state is inconsistent.
    #[error("internal inconsistency: {0}")]
    Inconsistency(String),
}

impl FsError {
    /// The errno reported for this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::NotFound => libc::ENOENT,
            Self::NotADirectory => libc::ENOTDIR,
            Self::IsADirectory => libc::EISDIR,
            Self::InvalidArgument(_) => libc::EINVAL,
            Self::PermissionDenied => libc::EPERM,
            Self::NotReadable | Self::BadHandle(_) => libc::EBADF,
            Self::Exhausted => libc::EMFILE,
            Self::Upstream(_) | Self::Inconsistency(_) => libc::EIO,
        }
    }
}

impl From<FsError> for i32 {
    fn from(err: FsError) -> Self {
        err.errno()
    }
}

impl<E> From<TreeError<E>> for FsError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: TreeError<E>) -> Self {
        match err {
            TreeError::NotFound => Self::NotFound,
            TreeError::NotADirectory => Self::NotADirectory,
            TreeError::IsADirectory => Self::IsADirectory,
            TreeError::NotAFile => Self::InvalidArgument("not a regular file"),
            TreeError::NotASymlink => Self::InvalidArgument("not a symbolic link"),
            TreeError::NotATrigger => Self::InvalidArgument("not a trigger"),
            TreeError::InvalidArgument(reason) => Self::InvalidArgument(reason),
            TreeError::Upstream(source) => Self::Upstream(Box::new(source)),
            TreeError::Inconsistency(detail) => {
                error!(%detail, "Node tree is inconsistent.");
                Self::Inconsistency(detail)
            }
        }
    }
}

impl From<HandleError> for FsError {
    fn from(err: HandleError) -> Self {
        match err {
            HandleError::Exhausted { .. } => Self::Exhausted,
            HandleError::NotAllocated(fh) => {
                error!(fh, "Released a file handle that is not allocated.");
                Self::Inconsistency(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), libc::ENOENT);
        assert_eq!(FsError::PermissionDenied.errno(), libc::EPERM);
        assert_eq!(FsError::NotReadable.errno(), libc::EBADF);
        assert_eq!(FsError::Exhausted.errno(), libc::EMFILE);
        assert_eq!(i32::from(FsError::InvalidArgument("x")), libc::EINVAL);
    }

    #[test]
    fn double_release_is_an_inconsistency() {
        let err = FsError::from(HandleError::NotAllocated(3));
        assert!(matches!(err, FsError::Inconsistency(_)));
        assert_eq!(err.errno(), libc::EIO);
    }

    #[test]
    fn upstream_failures_are_io_errors() {
        let err = FsError::from(TreeError::Upstream(std::io::Error::other("down")));
        assert_eq!(err.errno(), libc::EIO);
    }
}
