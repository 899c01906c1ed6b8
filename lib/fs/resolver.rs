//! The seam between the node tree and whatever backs it.

use std::fmt::Debug;
use std::future::Future;
use std::time::SystemTime;

use bytes::Bytes;

use super::node::Population;

/// Content returned by [`NodeResolver::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// The file's bytes.
    pub data: Bytes,
    /// Remote modification time, when the backend knows it.
    pub mtime: Option<SystemTime>,
}

impl Fetched {
    /// Content without a known modification time.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            mtime: None,
        }
    }
}

/// What a directory refresh observed for one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec<D, F> {
    /// Name within the directory.
    pub name: String,
    /// What lives under that name.
    pub kind: EntryKind<D, F>,
}

/// The kind of an observed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind<D, F> {
    /// A directory listed through [`NodeResolver::list`] when stale.
    Directory {
        /// Backend key passed to `list`.
        key: D,
        /// How later refreshes treat entries that disappear.
        population: Population,
    },
    /// An in-memory directory populated right here, never fetched on its own.
    Group(Vec<EntrySpec<D, F>>),
    /// A file fetched lazily through [`NodeResolver::fetch`].
    File {
        /// Backend key passed to `fetch`.
        key: F,
        /// Size reported by the listing; replaced by the real length once fetched.
        size: u64,
        /// Modification time reported by the listing.
        mtime: Option<SystemTime>,
        /// Keep fetched content until the node goes stale.
        use_cache: bool,
    },
    /// A symbolic link.
    Symlink {
        /// Link target.
        target: String,
    },
    /// A write-only file invalidating an ancestor.
    Trigger {
        /// How far up the target is: 1 is the directory holding the trigger.
        levels: u8,
    },
}

impl<D, F> EntrySpec<D, F> {
    /// A directory with replace-on-refresh population.
    pub fn directory(name: impl Into<String>, key: D) -> Self {
        Self::with_kind(
            name,
            EntryKind::Directory {
                key,
                population: Population::Replace,
            },
        )
    }

    /// A directory whose entries are only ever added.
    pub fn accumulating_directory(name: impl Into<String>, key: D) -> Self {
        Self::with_kind(
            name,
            EntryKind::Directory {
                key,
                population: Population::Accumulate,
            },
        )
    }

    /// A synthetic directory holding `entries`.
    pub fn group(name: impl Into<String>, entries: Vec<Self>) -> Self {
        Self::with_kind(name, EntryKind::Group(entries))
    }

    /// A cached file with a listed size and modification time.
    pub fn file(name: impl Into<String>, key: F, size: u64, mtime: Option<SystemTime>) -> Self {
        Self::with_kind(
            name,
            EntryKind::File {
                key,
                size,
                mtime,
                use_cache: true,
            },
        )
    }

    /// A generated file whose size is only known after fetching it.
    pub fn generated(name: impl Into<String>, key: F) -> Self {
        Self::file(name, key, 0, None)
    }

    /// A symbolic link.
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(
            name,
            EntryKind::Symlink {
                target: target.into(),
            },
        )
    }

    /// A trigger invalidating the ancestor `levels` up.
    pub fn trigger(name: impl Into<String>, levels: u8) -> Self {
        Self::with_kind(name, EntryKind::Trigger { levels })
    }

    /// Turn off content caching for a file entry.
    #[must_use]
    pub fn uncached(mut self) -> Self {
        if let EntryKind::File { use_cache, .. } = &mut self.kind {
            *use_cache = false;
        }
        self
    }

    fn with_kind(name: impl Into<String>, kind: EntryKind<D, F>) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A listing produced by [`NodeResolver::list`].
pub type Listing<R> =
    Vec<EntrySpec<<R as NodeResolver>::DirKey, <R as NodeResolver>::FileKey>>;

/// Supplies directory listings and file content to a [`NodeTree`](super::tree::NodeTree).
pub trait NodeResolver: Send + Sync {
    /// Identifies a remote directory.
    type DirKey: Clone + PartialEq + Debug + Send + Sync;
    /// Identifies a remote file.
    type FileKey: Clone + PartialEq + Debug + Send + Sync;
    /// Failure of a listing or fetch.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Enumerate the entries of the directory `key`.
    fn list(
        &self,
        key: &Self::DirKey,
    ) -> impl Future<Output = Result<Listing<Self>, Self::Error>> + Send;

    /// Fetch the full content of the file `key`.
    fn fetch(&self, key: &Self::FileKey) -> impl Future<Output = Result<Fetched, Self::Error>> + Send;
}
