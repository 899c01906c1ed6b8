//! [`Fs`] over a [`NodeTree`]: permission checks, file handles and reaping of detached nodes.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument};

use super::error::FsError;
use super::handles::HandleTable;
use super::node::NodeId;
use super::r#trait::{FileAttr, Fs, OpenFile};
use super::resolver::NodeResolver;
use super::stat::Stat;
use super::tree::NodeTree;
use super::{DirEntry, FileHandle, FsStats, INodeType, InodeAddr, OpenFlags};

/// Longest name accepted in a directory.
const MAX_NAME_LENGTH: u32 = 255;

/// A read-only filesystem whose only writable nodes are triggers.
pub struct VirtualFs<R: NodeResolver> {
    tree: NodeTree<R>,
    handles: HandleTable<NodeId>,
}

impl<R: NodeResolver> VirtualFs<R> {
    /// Serve `tree`, handing out handles from `handles`.
    pub fn new(tree: NodeTree<R>, handles: HandleTable<NodeId>) -> Self {
        Self { tree, handles }
    }

    /// The underlying tree.
    pub fn tree(&self) -> &NodeTree<R> {
        &self.tree
    }

    /// The underlying tree, mutably.
    pub fn tree_mut(&mut self) -> &mut NodeTree<R> {
        &mut self.tree
    }

    /// The handle table.
    pub fn handles(&self) -> &HandleTable<NodeId> {
        &self.handles
    }

    fn attr(&self, ino: InodeAddr) -> Result<FileAttr, FsError> {
        Ok(file_attr(ino, &self.tree.stat(ino)?))
    }

    fn node_of(&self, fh: FileHandle) -> Result<NodeId, FsError> {
        self.handles.resolve(fh).ok_or(FsError::BadHandle(fh))
    }

    /// Drop detached nodes nothing holds open any more.
    fn reap(&mut self) {
        let handles = &self.handles;
        self.tree.reap(|id| handles.is_open(id));
    }
}

fn file_attr(ino: InodeAddr, stat: &Stat) -> FileAttr {
    FileAttr {
        ino,
        size: stat.size(),
        blocks: stat.blocks(),
        mtime: stat.mtime,
        perm: stat.perm,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        kind: stat.itype,
    }
}

#[async_trait]
impl<R: NodeResolver> Fs for VirtualFs<R> {
    type Error = FsError;

    #[instrument(name = "VirtualFs::lookup", skip(self))]
    async fn lookup(&mut self, parent: InodeAddr, name: &str) -> Result<FileAttr, FsError> {
        let ino = self.tree.lookup(parent, name).await?;
        self.reap();
        self.attr(ino)
    }

    async fn getattr(&mut self, ino: InodeAddr) -> Result<FileAttr, FsError> {
        self.attr(ino)
    }

    #[instrument(name = "VirtualFs::opendir", skip(self))]
    async fn opendir(&mut self, ino: InodeAddr) -> Result<FileHandle, FsError> {
        if self.tree.stat(ino)?.itype != INodeType::Directory {
            return Err(FsError::NotADirectory);
        }
        Ok(self.handles.allocate(ino)?)
    }

    #[instrument(name = "VirtualFs::readdir", skip(self))]
    async fn readdir(&mut self, ino: InodeAddr) -> Result<Vec<DirEntry>, FsError> {
        let entries = self.tree.entries(ino).await?;
        self.reap();
        Ok(entries)
    }

    #[instrument(name = "VirtualFs::releasedir", skip(self))]
    async fn releasedir(&mut self, fh: FileHandle) -> Result<(), FsError> {
        self.handles.release(fh)?;
        self.reap();
        Ok(())
    }

    #[instrument(name = "VirtualFs::open", skip(self))]
    async fn open(&mut self, ino: InodeAddr, flags: OpenFlags) -> Result<OpenFile, FsError> {
        let stat = self.tree.stat(ino)?;
        if flags.wants_write() && !stat.is_writable() {
            debug!("Write access requested on a read-only node.");
            return Err(FsError::PermissionDenied);
        }
        if stat.itype == INodeType::Directory {
            return Err(FsError::IsADirectory);
        }

        let handle = self.handles.allocate(ino)?;
        Ok(OpenFile {
            handle,
            direct_io: true,
        })
    }

    #[instrument(name = "VirtualFs::read", skip(self))]
    async fn read(&mut self, fh: FileHandle, offset: u64, size: u32) -> Result<Bytes, FsError> {
        let ino = self.node_of(fh)?;
        if !self.tree.stat(ino)?.is_readable() {
            return Err(FsError::NotReadable);
        }
        let data = self.tree.read(ino, offset, size).await?;
        self.reap();
        Ok(data)
    }

    #[instrument(name = "VirtualFs::write", skip(self, data), fields(len = data.len()))]
    async fn write(&mut self, fh: FileHandle, offset: u64, data: &[u8]) -> Result<u32, FsError> {
        let ino = self.node_of(fh)?;
        if !self.tree.stat(ino)?.is_writable() {
            return Err(FsError::PermissionDenied);
        }
        let written = self.tree.write_trigger(ino, data, offset)?;
        u32::try_from(written).map_err(|_| FsError::InvalidArgument("write too large"))
    }

    #[instrument(name = "VirtualFs::truncate", skip(self))]
    async fn truncate(&mut self, ino: InodeAddr, size: u64) -> Result<FileAttr, FsError> {
        // Shells truncate before writing to a trigger; the size itself never changes.
        if !self.tree.stat(ino)?.is_writable() {
            return Err(FsError::PermissionDenied);
        }
        self.attr(ino)
    }

    #[instrument(name = "VirtualFs::release", skip(self))]
    async fn release(&mut self, fh: FileHandle) -> Result<(), FsError> {
        self.handles.release(fh)?;
        self.reap();
        Ok(())
    }

    async fn readlink(&mut self, ino: InodeAddr) -> Result<String, FsError> {
        Ok(self.tree.readlink(ino)?.to_owned())
    }

    async fn statfs(&mut self) -> Result<FsStats, FsError> {
        let free_handles = self.handles.capacity() - self.handles.in_use();
        Ok(FsStats {
            block_size: u32::try_from(Stat::BLOCK_SIZE).unwrap_or(512),
            total_blocks: 0,
            total_inodes: self.tree.node_count() as u64,
            free_handles: free_handles as u64,
            max_filename_length: MAX_NAME_LENGTH,
        })
    }
}
