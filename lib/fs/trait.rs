//! Generic trait for implementing filesystems.
//!
//! A slightly cleaner interface than using fuser directly; the adapter in
//! [`super::fuser`] owns every fuser-specific detail.

use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use super::{DirEntry, FileHandle, FsStats, INodeType, InodeAddr, InodePerms, OpenFlags};

/// Attributes reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileAttr {
    /// Inode number.
    pub ino: InodeAddr,
    /// Size in bytes.
    pub size: u64,
    /// Number of 512-byte blocks.
    pub blocks: u64,
    /// Modification time, also reported as access and change time.
    pub mtime: SystemTime,
    /// Permission bits.
    pub perm: InodePerms,
    /// Link count.
    pub nlink: u32,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
    /// Node type.
    pub kind: INodeType,
}

/// Result of a successful open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenFile {
    /// Handle passed back on read, write and release.
    pub handle: FileHandle,
    /// Bypass the kernel page cache; sizes of generated files are unknown until read.
    pub direct_io: bool,
}

/// Operations served to the kernel.
#[async_trait]
pub trait Fs: Send {
    /// Error type of every operation; converts to an errno.
    type Error: std::error::Error + Into<i32> + Send;

    /// Find `name` inside `parent`.
    async fn lookup(&mut self, parent: InodeAddr, name: &str) -> Result<FileAttr, Self::Error>;

    /// Attributes of `ino` as currently known.
    async fn getattr(&mut self, ino: InodeAddr) -> Result<FileAttr, Self::Error>;

    /// Claim a handle on a directory.
    async fn opendir(&mut self, ino: InodeAddr) -> Result<FileHandle, Self::Error>;

    /// Every entry of a directory, `.` and `..` included.
    async fn readdir(&mut self, ino: InodeAddr) -> Result<Vec<DirEntry>, Self::Error>;

    /// Release a directory handle.
    async fn releasedir(&mut self, fh: FileHandle) -> Result<(), Self::Error>;

    /// Open a file.
    async fn open(&mut self, ino: InodeAddr, flags: OpenFlags) -> Result<OpenFile, Self::Error>;

    /// Read from an open file.
    async fn read(&mut self, fh: FileHandle, offset: u64, size: u32)
    -> Result<Bytes, Self::Error>;

    /// Write to an open file. Returns the number of bytes accepted.
    async fn write(&mut self, fh: FileHandle, offset: u64, data: &[u8])
    -> Result<u32, Self::Error>;

    /// Set the size of `ino`.
    async fn truncate(&mut self, ino: InodeAddr, size: u64) -> Result<FileAttr, Self::Error>;

    /// Release a file handle.
    async fn release(&mut self, fh: FileHandle) -> Result<(), Self::Error>;

    /// Target of a symbolic link.
    async fn readlink(&mut self, ino: InodeAddr) -> Result<String, Self::Error>;

    /// Filesystem statistics.
    async fn statfs(&mut self) -> Result<FsStats, Self::Error>;
}
