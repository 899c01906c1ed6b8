#![allow(dead_code, missing_docs, clippy::unwrap_used)]

pub mod obs_mocks;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use obs_fs::fs::policy::CachePolicy;
use obs_fs::fs::resolver::{EntrySpec, Fetched, Listing, NodeResolver};
use obs_fs::fs::stat::Owner;
use obs_fs::fs::tree::NodeTree;

pub const OWNER: Owner = Owner {
    uid: 1000,
    gid: 100,
};

pub type Spec = EntrySpec<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("backend unavailable for {0}")]
    Unavailable(String),
    #[error("no such key {0}")]
    Missing(String),
}

#[derive(Debug, Default)]
pub struct MockState {
    pub dirs: HashMap<String, Vec<Spec>>,
    pub files: HashMap<String, Bytes>,
    pub failing: HashSet<String>,
    pub list_calls: HashMap<String, usize>,
    pub fetch_calls: HashMap<String, usize>,
}

/// An in-memory resolver keyed by plain strings. Clones share state, so a test can keep one
/// clone to reshape the backend while the tree owns another.
#[derive(Debug, Clone, Default)]
pub struct MockResolver {
    pub state: Arc<Mutex<MockState>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dir(&self, key: &str, entries: Vec<Spec>) {
        self.state
            .lock()
            .unwrap()
            .dirs
            .insert(key.to_owned(), entries);
    }

    pub fn set_file(&self, key: &str, data: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(key.to_owned(), data.into());
    }

    pub fn fail(&self, key: &str) {
        self.state.lock().unwrap().failing.insert(key.to_owned());
    }

    pub fn recover(&self, key: &str) {
        self.state.lock().unwrap().failing.remove(key);
    }

    pub fn list_calls(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .list_calls
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls.values().sum()
    }

    pub fn fetch_calls(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .fetch_calls
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

impl NodeResolver for MockResolver {
    type DirKey = String;
    type FileKey = String;
    type Error = MockError;

    async fn list(&self, key: &String) -> Result<Listing<Self>, MockError> {
        let mut state = self.state.lock().unwrap();
        *state.list_calls.entry(key.clone()).or_insert(0) += 1;
        if state.failing.contains(key) {
            return Err(MockError::Unavailable(key.clone()));
        }
        state
            .dirs
            .get(key)
            .cloned()
            .ok_or_else(|| MockError::Missing(key.clone()))
    }

    async fn fetch(&self, key: &String) -> Result<Fetched, MockError> {
        let mut state = self.state.lock().unwrap();
        *state.fetch_calls.entry(key.clone()).or_insert(0) += 1;
        if state.failing.contains(key) {
            return Err(MockError::Unavailable(key.clone()));
        }
        state
            .files
            .get(key)
            .cloned()
            .map(Fetched::new)
            .ok_or_else(|| MockError::Missing(key.clone()))
    }
}

/// A tree over `resolver` whose root is listed with key `/`.
pub fn tree(resolver: MockResolver, ttl: Duration) -> NodeTree<MockResolver> {
    NodeTree::new(resolver, "/".to_owned(), CachePolicy::new(ttl), OWNER)
}

/// The canonical small backend:
///
/// ```text
/// /P/A/foo        10 bytes
/// /P/A/bar        0 bytes
/// /P/.oscfs/refresh   trigger invalidating /P
/// ```
pub fn package_fixture() -> MockResolver {
    let resolver = MockResolver::new();
    resolver.set_dir("/", vec![EntrySpec::directory("P", "P".to_owned())]);
    resolver.set_dir(
        "P",
        vec![
            EntrySpec::group(".oscfs", vec![EntrySpec::trigger("refresh", 2)]),
            EntrySpec::directory("A", "P/A".to_owned()),
        ],
    );
    resolver.set_dir(
        "P/A",
        vec![
            EntrySpec::file("foo", "P/A/foo".to_owned(), 10, None),
            EntrySpec::file("bar", "P/A/bar".to_owned(), 0, None),
        ],
    );
    resolver.set_file("P/A/foo", "0123456789");
    resolver.set_file("P/A/bar", "");
    resolver
}
