#![allow(missing_docs, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use obs_api::ObsError;
use obs_api::models::{Binary, Directory, DirectoryEntry, LinkInfo, ResultList, Revision};
use obs_fs::catalog::ObsSource;

/// In-memory OBS content.
#[derive(Debug, Default)]
pub struct ObsState {
    pub projects: Vec<String>,
    pub packages: HashMap<String, Vec<String>>,
    /// `(project, package, rev)` to listing.
    pub listings: HashMap<(String, String, Option<String>), Directory>,
    /// `project/package/file@rev` to content.
    pub sources: HashMap<String, Bytes>,
    pub project_metas: HashMap<String, Bytes>,
    pub package_metas: HashMap<(String, String), Bytes>,
    pub histories: HashMap<(String, String), Vec<Revision>>,
    pub results: HashMap<(String, String), ResultList>,
    /// `project/repo/arch/package` to artifacts.
    pub binaries: HashMap<String, Vec<Binary>>,
    pub logs: HashMap<String, Bytes>,
    /// Every call, as `operation args`.
    pub calls: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockObs {
    pub state: Arc<Mutex<ObsState>>,
}

fn not_found(what: String) -> ObsError {
    ObsError::NotFound { url: what }
}

fn source_key(project: &str, package: &str, file: &str, rev: Option<&str>) -> String {
    format!("{project}/{package}/{file}@{}", rev.unwrap_or("latest"))
}

impl MockObs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    pub fn add_project(&self, project: &str, packages: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.projects.push(project.to_owned());
        state.packages.insert(
            project.to_owned(),
            packages.iter().map(|p| (*p).to_owned()).collect(),
        );
    }

    /// Adds a package listing with `(name, size, mtime)` files and their contents.
    pub fn add_files(
        &self,
        project: &str,
        package: &str,
        rev: Option<&str>,
        files: &[(&str, &str, u64)],
        link: Option<(&str, &str)>,
    ) {
        let mut state = self.state.lock().unwrap();
        let listing = Directory {
            name: Some(package.to_owned()),
            rev: rev.map(str::to_owned),
            link: link.map(|(project, package)| LinkInfo {
                project: project.to_owned(),
                package: package.to_owned(),
            }),
            entries: files
                .iter()
                .map(|(name, content, mtime)| DirectoryEntry {
                    name: (*name).to_owned(),
                    size: Some(content.len() as u64),
                    mtime: Some(*mtime),
                })
                .collect(),
        };
        state.listings.insert(
            (project.to_owned(), package.to_owned(), rev.map(str::to_owned)),
            listing,
        );
        for (name, content, _) in files {
            state.sources.insert(
                source_key(project, package, name, rev),
                Bytes::copy_from_slice(content.as_bytes()),
            );
        }
    }

    pub fn set_project_meta(&self, project: &str, xml: &str) {
        self.state
            .lock()
            .unwrap()
            .project_metas
            .insert(project.to_owned(), Bytes::copy_from_slice(xml.as_bytes()));
    }

    pub fn set_package_meta(&self, project: &str, package: &str, xml: &str) {
        self.state.lock().unwrap().package_metas.insert(
            (project.to_owned(), package.to_owned()),
            Bytes::copy_from_slice(xml.as_bytes()),
        );
    }

    pub fn set_history(&self, project: &str, package: &str, revisions: Vec<Revision>) {
        self.state
            .lock()
            .unwrap()
            .histories
            .insert((project.to_owned(), package.to_owned()), revisions);
    }

    pub fn set_binaries(&self, build: &str, binaries: Vec<Binary>) {
        self.state
            .lock()
            .unwrap()
            .binaries
            .insert(build.to_owned(), binaries);
    }
}

impl ObsSource for MockObs {
    async fn projects(&self) -> Result<Vec<String>, ObsError> {
        self.record("projects".to_owned());
        Ok(self.state.lock().unwrap().projects.clone())
    }

    async fn packages(&self, project: &str) -> Result<Vec<String>, ObsError> {
        self.record(format!("packages {project}"));
        self.state
            .lock()
            .unwrap()
            .packages
            .get(project)
            .cloned()
            .ok_or_else(|| not_found(project.to_owned()))
    }

    async fn files(
        &self,
        project: &str,
        package: &str,
        rev: Option<&str>,
    ) -> Result<Directory, ObsError> {
        self.record(format!("files {project}/{package}@{}", rev.unwrap_or("latest")));
        self.state
            .lock()
            .unwrap()
            .listings
            .get(&(project.to_owned(), package.to_owned(), rev.map(str::to_owned)))
            .cloned()
            .ok_or_else(|| not_found(format!("{project}/{package}")))
    }

    async fn file(
        &self,
        project: &str,
        package: &str,
        file: &str,
        rev: Option<&str>,
    ) -> Result<Bytes, ObsError> {
        let key = source_key(project, package, file, rev);
        self.record(format!("file {key}"));
        self.state
            .lock()
            .unwrap()
            .sources
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    async fn project_meta(&self, project: &str) -> Result<Bytes, ObsError> {
        self.record(format!("project_meta {project}"));
        self.state
            .lock()
            .unwrap()
            .project_metas
            .get(project)
            .cloned()
            .ok_or_else(|| not_found(project.to_owned()))
    }

    async fn package_meta(&self, project: &str, package: &str) -> Result<Bytes, ObsError> {
        self.record(format!("package_meta {project}/{package}"));
        self.state
            .lock()
            .unwrap()
            .package_metas
            .get(&(project.to_owned(), package.to_owned()))
            .cloned()
            .ok_or_else(|| not_found(format!("{project}/{package}")))
    }

    async fn history(&self, project: &str, package: &str) -> Result<Vec<Revision>, ObsError> {
        self.record(format!("history {project}/{package}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .histories
            .get(&(project.to_owned(), package.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn build_results(&self, project: &str, package: &str) -> Result<ResultList, ObsError> {
        self.record(format!("build_results {project}/{package}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .results
            .get(&(project.to_owned(), package.to_owned()))
            .cloned()
            .unwrap_or_default())
    }

    async fn binaries(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Vec<Binary>, ObsError> {
        let key = format!("{project}/{repository}/{arch}/{package}");
        self.record(format!("binaries {key}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .binaries
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn binary(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
        file: &str,
    ) -> Result<Bytes, ObsError> {
        let key = format!("{project}/{repository}/{arch}/{package}/{file}");
        self.record(format!("binary {key}"));
        Ok(Bytes::from(format!("contents of {file}")))
    }

    async fn build_log(
        &self,
        project: &str,
        repository: &str,
        arch: &str,
        package: &str,
    ) -> Result<Option<Bytes>, ObsError> {
        let key = format!("{project}/{repository}/{arch}/{package}");
        self.record(format!("build_log {key}"));
        Ok(self.state.lock().unwrap().logs.get(&key).cloned())
    }
}
