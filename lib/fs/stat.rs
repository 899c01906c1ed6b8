//! POSIX-like attributes of a node.

use std::time::SystemTime;

use super::{INodeType, InodePerms};

/// Owner of every node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

/// Attributes of a node.
///
/// `blocks` always tracks the last size set through [`Stat::set_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Node type.
    pub itype: INodeType,
    /// Permission bits.
    pub perm: InodePerms,
    /// Owning user.
    pub uid: u32,
    /// Owning group.
    pub gid: u32,
    /// Link count.
    pub nlink: u32,
    size: u64,
    blocks: u64,
    /// Modification time; also reported as access and change time.
    pub mtime: SystemTime,
}

impl Stat {
    /// Size of the blocks counted in [`Stat::blocks`].
    pub const BLOCK_SIZE: u64 = 512;

    fn new(itype: INodeType, perm: InodePerms, owner: Owner, mtime: SystemTime) -> Self {
        Self {
            itype,
            perm,
            uid: owner.uid,
            gid: owner.gid,
            nlink: if itype == INodeType::Directory { 2 } else { 1 },
            size: 0,
            blocks: 0,
            mtime,
        }
    }

    /// A read-only directory, `0o500`.
    #[must_use]
    pub fn directory(owner: Owner, mtime: SystemTime) -> Self {
        Self::new(
            INodeType::Directory,
            InodePerms::OWNER_READ | InodePerms::OWNER_EXECUTE,
            owner,
            mtime,
        )
    }

    /// A read-only regular file, `0o400`.
    #[must_use]
    pub fn file(owner: Owner, mtime: SystemTime) -> Self {
        Self::new(INodeType::File, InodePerms::OWNER_READ, owner, mtime)
    }

    /// A write-only control file, `0o200`.
    #[must_use]
    pub fn trigger(owner: Owner, mtime: SystemTime) -> Self {
        Self::new(INodeType::File, InodePerms::OWNER_WRITE, owner, mtime)
    }

    /// A symbolic link pointing at `target`.
    #[must_use]
    pub fn symlink(owner: Owner, mtime: SystemTime, target: &str) -> Self {
        let mut stat = Self::new(INodeType::Symlink, InodePerms::OWNER_READ, owner, mtime);
        stat.set_size(target.len() as u64);
        stat
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Number of [`Stat::BLOCK_SIZE`] blocks covering [`Stat::size`].
    #[must_use]
    pub fn blocks(&self) -> u64 {
        self.blocks
    }

    /// Set the size and the derived block count.
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
        self.blocks = size.div_ceil(Self::BLOCK_SIZE);
    }

    /// Whether the owner may read.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.perm.contains(InodePerms::OWNER_READ)
    }

    /// Whether the owner may write.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.perm.contains(InodePerms::OWNER_WRITE)
    }
}
