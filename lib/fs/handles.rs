//! Fixed-capacity open-file handle table.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

use thiserror::Error;

use super::FileHandle;

/// Errors raised by [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    /// Every slot is taken.
    #[error("all {capacity} file handles are in use")]
    Exhausted {
        /// Size of the table.
        capacity: usize,
    },

    /// The handle was never allocated, or was already released.
    #[error("file handle {0} is not allocated")]
    NotAllocated(FileHandle),
}

/// Maps file handles to the nodes they were opened on.
///
/// Allocation always returns the smallest free handle. Per-node open counts let the tree keep
/// detached nodes alive while anything still holds them open.
#[derive(Debug)]
pub struct HandleTable<K> {
    slots: Vec<Option<K>>,
    free: BTreeSet<usize>,
    open_refs: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> HandleTable<K> {
    /// Number of slots used when nothing else is configured.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// A table with [`Self::DEFAULT_CAPACITY`] slots.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// A table with `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            free: (0..capacity).collect(),
            open_refs: HashMap::new(),
        }
    }

    /// Claim the smallest free handle for `node`.
    pub fn allocate(&mut self, node: K) -> Result<FileHandle, HandleError> {
        let slot = self.free.pop_first().ok_or(HandleError::Exhausted {
            capacity: self.slots.len(),
        })?;
        self.slots[slot] = Some(node);
        *self.open_refs.entry(node).or_insert(0) += 1;
        Ok(slot as FileHandle)
    }

    /// Release `fh` and return the node it was opened on.
    pub fn release(&mut self, fh: FileHandle) -> Result<K, HandleError> {
        let slot = usize::try_from(fh).map_err(|_| HandleError::NotAllocated(fh))?;
        let node = self
            .slots
            .get_mut(slot)
            .and_then(Option::take)
            .ok_or(HandleError::NotAllocated(fh))?;
        self.free.insert(slot);

        if let Some(count) = self.open_refs.get_mut(&node) {
            *count -= 1;
            if *count == 0 {
                self.open_refs.remove(&node);
            }
        }
        Ok(node)
    }

    /// The node behind `fh`, if allocated.
    #[must_use]
    pub fn resolve(&self, fh: FileHandle) -> Option<K> {
        let slot = usize::try_from(fh).ok()?;
        self.slots.get(slot).copied().flatten()
    }

    /// Number of handles currently open on `node`.
    #[must_use]
    pub fn open_count(&self, node: K) -> usize {
        self.open_refs.get(&node).copied().unwrap_or(0)
    }

    /// Whether any handle is open on `node`.
    #[must_use]
    pub fn is_open(&self, node: K) -> bool {
        self.open_refs.contains_key(&node)
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of allocated handles.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<K: Copy + Eq + Hash> Default for HandleTable<K> {
    fn default() -> Self {
        Self::new()
    }
}
