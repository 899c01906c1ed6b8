//! The node kinds held by the tree.

use std::collections::BTreeMap;

use bytes::Bytes;
use tokio::time::Instant;

use super::InodeAddr;
use super::stat::Stat;

/// Identifier of a node. Also used as its inode number.
pub type NodeId = InodeAddr;

/// How a directory refresh treats children the backend no longer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Population {
    /// Drop children that were not observed again.
    Replace,
    /// Keep them; listings only ever add entries.
    Accumulate,
}

/// An entry of the tree.
#[derive(Debug)]
pub struct Node<D, F> {
    pub(crate) name: String,
    /// `None` only for the root.
    pub(crate) parent: Option<NodeId>,
    pub(crate) stat: Stat,
    /// `None` means never refreshed, or invalidated.
    pub(crate) last_refresh: Option<Instant>,
    pub(crate) kind: NodeKind<D, F>,
}

impl<D, F> Node<D, F> {
    /// Name within the parent directory.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent directory, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Current attributes.
    #[must_use]
    pub fn stat(&self) -> &Stat {
        &self.stat
    }

    /// The kind-specific state.
    #[must_use]
    pub fn kind(&self) -> &NodeKind<D, F> {
        &self.kind
    }

    pub(crate) fn as_dir(&self) -> Option<&DirNode<D>> {
        match &self.kind {
            NodeKind::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut DirNode<D>> {
        match &mut self.kind {
            NodeKind::Directory(dir) => Some(dir),
            _ => None,
        }
    }
}

/// Closed set of node kinds.
#[derive(Debug)]
pub enum NodeKind<D, F> {
    /// A directory.
    Directory(DirNode<D>),
    /// A regular file with lazily fetched content.
    File(FileNode<F>),
    /// A symbolic link to the contained target.
    Symlink(String),
    /// A write-only control file.
    Trigger(TriggerNode),
}

/// Where a directory's children come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirSource<D> {
    /// Listed through the resolver.
    Remote {
        /// Resolver key.
        key: D,
        /// Treatment of vanished children.
        population: Population,
    },
    /// Filled by the parent's refresh; refreshing it fetches nothing.
    Synthetic,
}

/// A directory and its children, keyed by unique name.
#[derive(Debug)]
pub struct DirNode<D> {
    pub(crate) source: DirSource<D>,
    pub(crate) children: BTreeMap<String, NodeId>,
}

impl<D> DirNode<D> {
    /// Where the children come from.
    #[must_use]
    pub fn source(&self) -> &DirSource<D> {
        &self.source
    }

    /// Child ids by name.
    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, NodeId> {
        &self.children
    }
}

/// A regular file.
#[derive(Debug)]
pub struct FileNode<F> {
    pub(crate) key: F,
    /// Absent until fetched, and always absent when `use_cache` is off.
    pub(crate) content: Option<Bytes>,
    pub(crate) use_cache: bool,
    /// Size and mtime last reported by the parent's listing.
    pub(crate) listed: (u64, Option<std::time::SystemTime>),
}

impl<F> FileNode<F> {
    /// Resolver key.
    #[must_use]
    pub fn key(&self) -> &F {
        &self.key
    }

    /// Whether content is currently held.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.content.is_some()
    }
}

/// A write-only file that invalidates `target` when it receives `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerNode {
    pub(crate) target: NodeId,
}

impl TriggerNode {
    /// The node invalidated by this trigger.
    #[must_use]
    pub fn target(&self) -> NodeId {
        self.target
    }
}
