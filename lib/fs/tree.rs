//! The node tree: an arena of nodes refreshed lazily through a [`NodeResolver`].
//!
//! Staleness is evaluated when a node is used, never in the background. Every operation that
//! needs children or content goes through [`NodeTree::ensure_fresh`] first. A failed refresh
//! leaves the node stale, so the next access retries.
//!
//! Directory refreshes reuse children by name: an entry observed again with the same kind and
//! key keeps its node id, freshness and open handles. Children that vanish are unlinked from
//! their parent and kept in a detached list until [`NodeTree::reap`] finds no open handle into
//! them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, instrument, trace, warn};

use super::node::{DirNode, DirSource, FileNode, Node, NodeId, NodeKind, Population, TriggerNode};
use super::policy::CachePolicy;
use super::resolver::{EntryKind, EntrySpec, Fetched, Listing, NodeResolver};
use super::stat::{Owner, Stat};
use super::{DirEntry, INodeType};

/// Errors raised by tree operations.
#[derive(Debug, Error)]
pub enum TreeError<E: std::error::Error + 'static> {
    /// No node with that id or name.
    #[error("no such node")]
    NotFound,

    /// The operation needs a directory.
    #[error("not a directory")]
    NotADirectory,

    /// The operation cannot act on a directory.
    #[error("is a directory")]
    IsADirectory,

    /// The operation needs a regular file.
    #[error("not a regular file")]
    NotAFile,

    /// The operation needs a symbolic link.
    #[error("not a symbolic link")]
    NotASymlink,

    /// The operation needs a trigger.
    #[error("not a trigger")]
    NotATrigger,

    /// A write carried a value or offset the node does not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The resolver failed; the node stays stale.
    #[error("upstream failure: {0}")]
    Upstream(#[source] E),

    /// A broken internal invariant.
    #[error("internal inconsistency: {0}")]
    Inconsistency(String),
}

type TreeNode<R> = Node<<R as NodeResolver>::DirKey, <R as NodeResolver>::FileKey>;
type Spec<R> = EntrySpec<<R as NodeResolver>::DirKey, <R as NodeResolver>::FileKey>;
type TreeResult<T, R> = Result<T, TreeError<<R as NodeResolver>::Error>>;

/// Monotonically increasing node id allocator. Ids are never reused.
struct IdFactory {
    next: NodeId,
}

impl IdFactory {
    fn new(start: NodeId) -> Self {
        Self { next: start }
    }

    fn allocate(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// What a stale node needs in order to become fresh.
enum Refresh<D> {
    List(D, Population),
    DropContent,
    Nothing,
}

/// Outcome of matching an observed entry against an existing child.
enum Reconciled<R: NodeResolver> {
    Kept,
    KeptGroup(Listing<R>),
    Replaced(Spec<R>),
}

/// The virtual directory tree.
pub struct NodeTree<R: NodeResolver> {
    resolver: R,
    policy: CachePolicy,
    owner: Owner,
    started_at: SystemTime,
    nodes: HashMap<NodeId, TreeNode<R>>,
    ids: IdFactory,
    detached: Vec<NodeId>,
}

impl<R: NodeResolver> NodeTree<R> {
    /// Id of the root directory, matching the FUSE root inode.
    pub const ROOT: NodeId = 1;

    /// Create a tree whose root is listed through `root_key`.
    pub fn new(resolver: R, root_key: R::DirKey, policy: CachePolicy, owner: Owner) -> Self {
        let started_at = SystemTime::now();
        let root = Node {
            name: String::new(),
            parent: None,
            stat: Stat::directory(owner, started_at),
            last_refresh: None,
            kind: NodeKind::Directory(DirNode {
                source: DirSource::Remote {
                    key: root_key,
                    population: Population::Replace,
                },
                children: BTreeMap::new(),
            }),
        };

        Self {
            resolver,
            policy,
            owner,
            started_at,
            nodes: HashMap::from([(Self::ROOT, root)]),
            ids: IdFactory::new(Self::ROOT + 1),
            detached: Vec::new(),
        }
    }

    /// The backing resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The active freshness policy.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Replace the TTL. Zero disables caching.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.policy = CachePolicy::new(ttl);
    }

    /// Number of nodes held, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The node `id`.
    pub fn node(&self, id: NodeId) -> TreeResult<&TreeNode<R>, R> {
        self.nodes.get(&id).ok_or(TreeError::NotFound)
    }

    /// Whether `id` is held by the tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether `id` would be refreshed on its next use. Unknown ids are stale.
    pub fn is_stale(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_none_or(|node| self.policy.is_stale(node.last_refresh))
    }

    /// The child `name` of `parent` as currently held, without refreshing anything.
    pub fn peek_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes
            .get(&parent)?
            .as_dir()?
            .children
            .get(name)
            .copied()
    }

    /// Refresh `id` if it is stale, then mark it fresh.
    #[instrument(name = "NodeTree::ensure_fresh", skip(self))]
    pub async fn ensure_fresh(&mut self, id: NodeId) -> TreeResult<(), R> {
        let node = self.node(id)?;
        if !self.policy.is_stale(node.last_refresh) {
            return Ok(());
        }

        self.refresh(id).await?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.last_refresh = Some(Instant::now());
        }
        Ok(())
    }

    async fn refresh(&mut self, id: NodeId) -> TreeResult<(), R> {
        let plan = match &self.node(id)?.kind {
            NodeKind::Directory(dir) => match &dir.source {
                DirSource::Remote { key, population } => Refresh::List(key.clone(), *population),
                DirSource::Synthetic => Refresh::Nothing,
            },
            NodeKind::File(_) => Refresh::DropContent,
            NodeKind::Symlink(_) | NodeKind::Trigger(_) => Refresh::Nothing,
        };

        match plan {
            Refresh::List(key, population) => {
                trace!(?key, "Listing directory.");
                let listing = self
                    .resolver
                    .list(&key)
                    .await
                    .map_err(TreeError::Upstream)?;
                self.populate(id, listing, population);
            }
            Refresh::DropContent => {
                if let Some(NodeKind::File(file)) = self.nodes.get_mut(&id).map(|n| &mut n.kind) {
                    file.content = None;
                }
            }
            Refresh::Nothing => {}
        }
        Ok(())
    }

    fn populate(&mut self, dir: NodeId, listing: Listing<R>, population: Population) {
        let mut seen = HashSet::with_capacity(listing.len());
        for spec in listing {
            if spec.name.is_empty() || spec.name == "." || spec.name == ".." || spec.name.contains('/')
            {
                warn!(name = %spec.name, "Skipping entry with an unusable name.");
                continue;
            }
            if !seen.insert(spec.name.clone()) {
                warn!(name = %spec.name, "Duplicate entry in listing, keeping the first.");
                continue;
            }
            self.upsert_child(dir, spec);
        }

        if population == Population::Replace {
            let mut vanished = Vec::new();
            if let Some(node) = self.nodes.get_mut(&dir).and_then(Node::as_dir_mut) {
                node.children.retain(|name, id| {
                    let keep = seen.contains(name);
                    if !keep {
                        vanished.push(*id);
                    }
                    keep
                });
            }
            for id in vanished {
                self.detach(id);
            }
        }
    }

    fn upsert_child(&mut self, dir: NodeId, spec: Spec<R>) {
        let Some(existing) = self.peek_child(dir, &spec.name) else {
            self.insert(dir, spec);
            return;
        };

        match self.reconcile(existing, spec) {
            Reconciled::Kept => {}
            Reconciled::KeptGroup(entries) => self.populate(existing, entries, Population::Replace),
            Reconciled::Replaced(spec) => {
                trace!(name = %spec.name, "Entry changed kind or key, replacing.");
                if let Some(node) = self.nodes.get_mut(&dir).and_then(Node::as_dir_mut) {
                    node.children.remove(&spec.name);
                }
                self.detach(existing);
                self.insert(dir, spec);
            }
        }
    }

    fn reconcile(&mut self, id: NodeId, spec: Spec<R>) -> Reconciled<R> {
        let started_at = self.started_at;
        let Some(node) = self.nodes.get_mut(&id) else {
            return Reconciled::Replaced(spec);
        };

        match (&mut node.kind, spec.kind) {
            (NodeKind::Directory(dir), EntryKind::Directory { key, population })
                if matches!(&dir.source, DirSource::Remote { key: held, .. } if *held == key) =>
            {
                dir.source = DirSource::Remote { key, population };
                Reconciled::Kept
            }
            (NodeKind::Directory(dir), EntryKind::Group(entries))
                if dir.source == DirSource::Synthetic =>
            {
                Reconciled::KeptGroup(entries)
            }
            (
                NodeKind::File(file),
                EntryKind::File {
                    key,
                    size,
                    mtime,
                    use_cache,
                },
            ) if file.key == key => {
                file.use_cache = use_cache;
                if !use_cache {
                    file.content = None;
                }
                if file.listed != (size, mtime) {
                    file.listed = (size, mtime);
                    file.content = None;
                    node.last_refresh = None;
                    node.stat.set_size(size);
                    node.stat.mtime = mtime.unwrap_or(started_at);
                }
                Reconciled::Kept
            }
            (NodeKind::Symlink(held), EntryKind::Symlink { target }) => {
                if *held != target {
                    node.stat.set_size(target.len() as u64);
                    *held = target;
                }
                Reconciled::Kept
            }
            (NodeKind::Trigger(_), EntryKind::Trigger { .. }) => Reconciled::Kept,
            (_, kind) => Reconciled::Replaced(EntrySpec {
                name: spec.name,
                kind,
            }),
        }
    }

    fn insert(&mut self, parent: NodeId, spec: Spec<R>) -> Option<NodeId> {
        let created = self.started_at;
        let (stat, kind, group) = match spec.kind {
            EntryKind::Directory { key, population } => (
                Stat::directory(self.owner, created),
                NodeKind::Directory(DirNode {
                    source: DirSource::Remote { key, population },
                    children: BTreeMap::new(),
                }),
                None,
            ),
            EntryKind::Group(entries) => (
                Stat::directory(self.owner, created),
                NodeKind::Directory(DirNode {
                    source: DirSource::Synthetic,
                    children: BTreeMap::new(),
                }),
                Some(entries),
            ),
            EntryKind::File {
                key,
                size,
                mtime,
                use_cache,
            } => {
                let mut stat = Stat::file(self.owner, mtime.unwrap_or(created));
                stat.set_size(size);
                let file = FileNode {
                    key,
                    content: None,
                    use_cache,
                    listed: (size, mtime),
                };
                (stat, NodeKind::File(file), None)
            }
            EntryKind::Symlink { target } => (
                Stat::symlink(self.owner, created, &target),
                NodeKind::Symlink(target),
                None,
            ),
            EntryKind::Trigger { levels } => {
                let Some(target) = self.ancestor(parent, levels) else {
                    warn!(name = %spec.name, levels, "Trigger target is above the root, skipping.");
                    return None;
                };
                (
                    Stat::trigger(self.owner, created),
                    NodeKind::Trigger(TriggerNode { target }),
                    None,
                )
            }
        };

        let id = self.ids.allocate();
        self.nodes.insert(
            id,
            Node {
                name: spec.name.clone(),
                parent: Some(parent),
                stat,
                last_refresh: None,
                kind,
            },
        );
        if let Some(dir) = self.nodes.get_mut(&parent).and_then(Node::as_dir_mut) {
            dir.children.insert(spec.name, id);
        }
        if let Some(entries) = group {
            self.populate(id, entries, Population::Replace);
        }
        Some(id)
    }

    /// The directory `levels` up from a node living in `dir`; 1 is `dir` itself.
    fn ancestor(&self, dir: NodeId, levels: u8) -> Option<NodeId> {
        if levels == 0 {
            return None;
        }
        let mut current = dir;
        for _ in 1..levels {
            current = self.nodes.get(&current)?.parent?;
        }
        Some(current)
    }

    fn detach(&mut self, id: NodeId) {
        trace!(id, "Detaching vanished node.");
        self.detached.push(id);
    }

    fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(id);
                if let Some(dir) = node.as_dir() {
                    pending.extend(dir.children.values().copied());
                }
            }
        }
        out
    }

    /// Drop detached subtrees that contain no pinned node. Returns the number of nodes dropped.
    pub fn reap(&mut self, pinned: impl Fn(NodeId) -> bool) -> usize {
        if self.detached.is_empty() {
            return 0;
        }

        let mut dropped = 0;
        for root in std::mem::take(&mut self.detached) {
            let subtree = self.subtree(root);
            if subtree.iter().any(|id| pinned(*id)) {
                self.detached.push(root);
                continue;
            }
            for id in subtree {
                self.nodes.remove(&id);
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!(dropped, "Reaped detached nodes.");
        }
        dropped
    }

    /// Mark `id` and every descendant currently held as never refreshed.
    pub fn invalidate(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            node.last_refresh = None;
            if let Some(dir) = node.as_dir() {
                pending.extend(dir.children.values().copied());
            }
        }
    }

    /// Find the child `name` of `parent`, refreshing `parent` first.
    pub async fn lookup(&mut self, parent: NodeId, name: &str) -> TreeResult<NodeId, R> {
        let node = self.node(parent)?;
        if node.as_dir().is_none() {
            return Err(TreeError::NotADirectory);
        }
        match name {
            "." => return Ok(parent),
            ".." => return Ok(node.parent.unwrap_or(Self::ROOT)),
            _ => {}
        }

        self.ensure_fresh(parent).await?;
        self.peek_child(parent, name).ok_or(TreeError::NotFound)
    }

    /// Resolve a `/`-separated path from the root.
    pub async fn resolve(&mut self, path: &str) -> TreeResult<NodeId, R> {
        let mut current = Self::ROOT;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = self.lookup(current, component).await?;
        }
        Ok(current)
    }

    /// Attributes of `id` as currently held.
    pub fn stat(&self, id: NodeId) -> TreeResult<Stat, R> {
        Ok(self.node(id)?.stat)
    }

    /// Child names of a directory, with `.` and `..` first.
    pub async fn list_names(&mut self, id: NodeId) -> TreeResult<Vec<String>, R> {
        Ok(self
            .entries(id)
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect())
    }

    /// Entries of a directory, with `.` and `..` first.
    pub async fn entries(&mut self, id: NodeId) -> TreeResult<Vec<DirEntry>, R> {
        if self.node(id)?.as_dir().is_none() {
            return Err(TreeError::NotADirectory);
        }
        self.ensure_fresh(id).await?;

        let node = self.node(id)?;
        let dir = node.as_dir().ok_or(TreeError::NotADirectory)?;
        let mut entries = Vec::with_capacity(dir.children.len() + 2);
        entries.push(DirEntry {
            ino: id,
            name: ".".to_owned(),
            kind: INodeType::Directory,
        });
        entries.push(DirEntry {
            ino: node.parent.unwrap_or(id),
            name: "..".to_owned(),
            kind: INodeType::Directory,
        });
        for (name, child) in &dir.children {
            let child_node = self.nodes.get(child).ok_or_else(|| {
                TreeError::Inconsistency(format!("child {name} of node {id} is not in the arena"))
            })?;
            entries.push(DirEntry {
                ino: *child,
                name: name.clone(),
                kind: child_node.stat.itype,
            });
        }
        Ok(entries)
    }

    /// Read up to `size` bytes at `offset`, fetching content when needed.
    ///
    /// Reading past the end returns an empty buffer.
    #[instrument(name = "NodeTree::read", skip(self))]
    pub async fn read(&mut self, id: NodeId, offset: u64, size: u32) -> TreeResult<Bytes, R> {
        match &self.node(id)?.kind {
            NodeKind::File(_) => {}
            NodeKind::Directory(_) => return Err(TreeError::IsADirectory),
            NodeKind::Symlink(_) | NodeKind::Trigger(_) => return Err(TreeError::NotAFile),
        }
        self.ensure_fresh(id).await?;

        let (key, cached) = match &self.node(id)?.kind {
            NodeKind::File(file) => (
                file.key.clone(),
                file.content.clone().filter(|_| file.use_cache),
            ),
            _ => {
                return Err(TreeError::Inconsistency(format!(
                    "node {id} stopped being a file during refresh"
                )));
            }
        };

        let data = match cached {
            Some(data) => data,
            None => self.fetch_content(id, key).await?,
        };
        Ok(byte_range(&data, offset, size))
    }

    async fn fetch_content(&mut self, id: NodeId, key: R::FileKey) -> TreeResult<Bytes, R> {
        trace!(?key, "Fetching content.");
        let fetched = match self.resolver.fetch(&key).await {
            Ok(fetched) => fetched,
            Err(err) => {
                if let Some(node) = self.nodes.get_mut(&id) {
                    node.last_refresh = None;
                }
                return Err(TreeError::Upstream(err));
            }
        };

        let Fetched { data, mtime } = fetched;
        let node = self.nodes.get_mut(&id).ok_or(TreeError::NotFound)?;
        node.stat.set_size(data.len() as u64);
        if let NodeKind::File(file) = &mut node.kind {
            node.stat.mtime = mtime.or(file.listed.1).unwrap_or_else(SystemTime::now);
            if file.use_cache {
                file.content = Some(data.clone());
            }
        }
        Ok(data)
    }

    /// Deliver a write to a trigger. Accepts `0` or `1`, optionally newline-terminated, at
    /// offset 0; `1` invalidates the trigger's target.
    pub fn write_trigger(&mut self, id: NodeId, data: &[u8], offset: u64) -> TreeResult<usize, R> {
        let target = match &self.node(id)?.kind {
            NodeKind::Trigger(trigger) => trigger.target,
            _ => return Err(TreeError::NotATrigger),
        };
        if offset != 0 {
            return Err(TreeError::InvalidArgument("trigger writes must start at offset 0"));
        }
        let fire = parse_trigger(data).ok_or(TreeError::InvalidArgument("trigger accepts 0 or 1"))?;

        if fire {
            if !self.nodes.contains_key(&target) {
                warn!(target, "Trigger target is gone.");
            }
            debug!(trigger = id, target, "Invalidating via trigger.");
            self.invalidate(target);
        }
        Ok(data.len())
    }

    /// Target of a symbolic link.
    pub fn readlink(&self, id: NodeId) -> TreeResult<&str, R> {
        match &self.node(id)?.kind {
            NodeKind::Symlink(target) => Ok(target),
            _ => Err(TreeError::NotASymlink),
        }
    }
}

fn parse_trigger(data: &[u8]) -> Option<bool> {
    match data.strip_suffix(b"\n").unwrap_or(data) {
        b"1" => Some(true),
        b"0" => Some(false),
        _ => None,
    }
}

fn byte_range(data: &Bytes, offset: u64, size: u32) -> Bytes {
    let len = data.len();
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
    let end = start
        .saturating_add(usize::try_from(size).unwrap_or(usize::MAX))
        .min(len);
    data.slice(start..end)
}
