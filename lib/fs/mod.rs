//! Virtual filesystem core: the node tree, its cache policy, the handle table and the FUSE glue.

pub mod error;
/// FUSE adapter: maps [`fuser::Filesystem`] callbacks onto an [`r#trait::Fs`].
pub mod fuser;
pub mod handles;
pub mod node;
pub mod policy;
pub mod resolver;
pub mod stat;
pub mod r#trait;
pub mod tree;
pub mod vfs;

use bitflags::bitflags;

/// Type representing an inode identifier. Node ids double as inode numbers.
pub type InodeAddr = u64;

/// Type representing a file handle.
pub type FileHandle = u64;

bitflags! {
    /// Permission bits for an inode, similar to Unix file permissions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InodePerms: u16 {
        /// Other: execute permission.
        const OTHER_EXECUTE = 1 << 0;
        /// Other: write permission.
        const OTHER_WRITE   = 1 << 1;
        /// Other: read permission.
        const OTHER_READ    = 1 << 2;

        /// Group: execute permission.
        const GROUP_EXECUTE = 1 << 3;
        /// Group: write permission.
        const GROUP_WRITE   = 1 << 4;
        /// Group: read permission.
        const GROUP_READ    = 1 << 5;

        /// Owner: execute permission.
        const OWNER_EXECUTE = 1 << 6;
        /// Owner: write permission.
        const OWNER_WRITE   = 1 << 7;
        /// Owner: read permission.
        const OWNER_READ    = 1 << 8;
    }
}

bitflags! {
    /// Flags passed to `open(2)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: i32 {
        /// Open for reading only.
        const RDONLY = libc::O_RDONLY;
        /// Open for writing only.
        const WRONLY = libc::O_WRONLY;
        /// Open for reading and writing.
        const RDWR = libc::O_RDWR;
        /// Append on each write.
        const APPEND = libc::O_APPEND;
        /// Truncate to zero length.
        const TRUNC = libc::O_TRUNC;
        /// Create file if it does not exist.
        const CREAT = libc::O_CREAT;
        /// Error if file already exists (with `CREAT`).
        const EXCL = libc::O_EXCL;
        /// Fail if not a directory.
        const DIRECTORY = libc::O_DIRECTORY;
    }
}

impl OpenFlags {
    /// Flags that ask for write access of any kind.
    pub const WRITE_INTENT: Self = Self::WRONLY.union(Self::RDWR).union(Self::CREAT);

    /// Whether the open asks to modify the file.
    #[must_use]
    pub fn wants_write(self) -> bool {
        self.intersects(Self::WRITE_INTENT)
    }
}

/// The type of a node as seen by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum INodeType {
    /// A regular file, including trigger files.
    File,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
}

/// A directory entry yielded by [`r#trait::Fs::readdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Inode of the entry.
    pub ino: InodeAddr,
    /// Name within the parent directory.
    pub name: String,
    /// Entry type.
    pub kind: INodeType,
}

/// Filesystem statistics returned by [`r#trait::Fs::statfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FsStats {
    /// Filesystem block size (bytes).
    pub block_size: u32,
    /// Total number of data blocks.
    pub total_blocks: u64,
    /// Total number of nodes currently materialized.
    pub total_inodes: u64,
    /// Number of file handles still available.
    pub free_handles: u64,
    /// Maximum filename length (bytes).
    pub max_filename_length: u32,
}
