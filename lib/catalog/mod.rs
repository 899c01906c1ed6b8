//! The OBS directory layout served by the node tree.
//!
//! ```text
//! /<project>/                      packages, plus .oscfs/{meta,info,refresh}
//! /<project>/<package>/            source files, plus .oscfs/
//! /<project>/<package>/.oscfs/     meta, info, commitlog, buildresults, refresh, incident,
//!                                  revisions/<rev>/, builds/<repo>/<arch>/
//! ```

mod render;
mod source;

use std::collections::BTreeMap;

use bytes::Bytes;
use obs_api::ObsError;
use obs_api::models::{PackageMeta, ProjectMeta};
use tracing::{instrument, warn};

use crate::fs::resolver::{EntrySpec, Fetched, Listing, NodeResolver};

pub use source::ObsSource;

/// Name of the synthetic metadata directory inside projects and packages.
pub const META_DIR: &str = ".oscfs";

/// A package within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageRef {
    /// Project name.
    pub project: String,
    /// Package name.
    pub package: String,
}

impl PackageRef {
    /// `package` in `project`.
    pub fn new(project: impl Into<String>, package: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            package: package.into(),
        }
    }
}

/// Identifies a listable remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DirKey {
    /// The project list.
    Root,
    /// Packages of a project.
    Project(String),
    /// Source files of a package.
    Package(PackageRef),
    /// Known revisions of a package.
    Revisions(PackageRef),
    /// Source files of a package at one revision.
    Revision {
        /// The package.
        package: PackageRef,
        /// Revision number.
        rev: u32,
    },
    /// Active repositories of a package's project.
    Builds(PackageRef),
    /// Artifacts and log of one build.
    Binaries {
        /// The package.
        package: PackageRef,
        /// Repository.
        repository: String,
        /// Architecture.
        arch: String,
    },
}

/// Identifies fetchable remote content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileKey {
    /// A source file, at a revision or the latest one.
    Source {
        /// The package.
        package: PackageRef,
        /// File name.
        file: String,
        /// Revision, `None` for the latest.
        rev: Option<u32>,
    },
    /// Raw project meta.
    ProjectMeta(String),
    /// Rendered project summary.
    ProjectInfo(String),
    /// Raw package meta.
    PackageMeta(PackageRef),
    /// Rendered package summary.
    PackageInfo(PackageRef),
    /// Rendered commit history.
    CommitLog(PackageRef),
    /// Rendered build results.
    BuildResults(PackageRef),
    /// A build artifact.
    Binary {
        /// The package.
        package: PackageRef,
        /// Repository.
        repository: String,
        /// Architecture.
        arch: String,
        /// Artifact name.
        file: String,
    },
    /// A build log.
    BuildLog {
        /// The package.
        package: PackageRef,
        /// Repository.
        repository: String,
        /// Architecture.
        arch: String,
    },
}

/// Which projects are listed and how build artifacts are cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogOptions {
    /// List `home:` projects.
    pub include_homes: bool,
    /// List `:Maintenance:` projects.
    pub include_maintenance: bool,
    /// List PTF projects.
    pub include_ptf: bool,
    /// Keep build artifacts in memory once read.
    pub cache_binaries: bool,
}

impl CatalogOptions {
    /// Whether `project` passes the project filters.
    #[must_use]
    pub fn shows_project(&self, project: &str) -> bool {
        if project.starts_with("home:") {
            return self.include_homes;
        }
        if project.contains(":Maintenance:") {
            return self.include_maintenance;
        }
        if project.starts_with("PTF:") || project.contains(":PTF:") {
            return self.include_ptf;
        }
        true
    }
}

type Spec = EntrySpec<DirKey, FileKey>;

/// Resolves the OBS layout against an [`ObsSource`].
pub struct ObsCatalog<S> {
    source: S,
    options: CatalogOptions,
}

impl<S: ObsSource> ObsCatalog<S> {
    /// Serve `source` with `options`.
    pub fn new(source: S, options: CatalogOptions) -> Self {
        Self { source, options }
    }

    /// The backing source.
    pub fn source(&self) -> &S {
        &self.source
    }

    async fn list_projects(&self) -> Result<Vec<Spec>, ObsError> {
        Ok(self
            .source
            .projects()
            .await?
            .into_iter()
            .filter(|project| self.options.shows_project(project))
            .map(|project| EntrySpec::directory(project.clone(), DirKey::Project(project)))
            .collect())
    }

    async fn list_project(&self, project: &str) -> Result<Vec<Spec>, ObsError> {
        let mut entries = vec![EntrySpec::group(
            META_DIR,
            vec![
                EntrySpec::generated("meta", FileKey::ProjectMeta(project.to_owned())),
                EntrySpec::generated("info", FileKey::ProjectInfo(project.to_owned())),
                EntrySpec::trigger("refresh", 2),
            ],
        )];
        entries.extend(self.source.packages(project).await?.into_iter().map(|package| {
            EntrySpec::directory(
                package.clone(),
                DirKey::Package(PackageRef::new(project, package)),
            )
        }));
        Ok(entries)
    }

    async fn list_package(&self, package: &PackageRef) -> Result<Vec<Spec>, ObsError> {
        let listing = self
            .source
            .files(&package.project, &package.package, None)
            .await?;

        let mut meta = vec![
            EntrySpec::generated("meta", FileKey::PackageMeta(package.clone())),
            EntrySpec::generated("info", FileKey::PackageInfo(package.clone())),
            EntrySpec::generated("commitlog", FileKey::CommitLog(package.clone())),
            EntrySpec::generated("buildresults", FileKey::BuildResults(package.clone())),
            EntrySpec::trigger("refresh", 2),
            EntrySpec::accumulating_directory("revisions", DirKey::Revisions(package.clone())),
            EntrySpec::directory("builds", DirKey::Builds(package.clone())),
        ];
        if let Some(incident) = self.incident(package).await {
            meta.push(EntrySpec::symlink("incident", format!("../../../{incident}")));
        }

        let mut entries = vec![EntrySpec::group(META_DIR, meta)];
        for entry in listing.entries {
            let spec = match &listing.link {
                Some(link) if entry.name == "_link" => EntrySpec::symlink(
                    entry.name,
                    format!("../../{}/{}", link.project, link.package),
                ),
                _ => source_file(package, entry.name.clone(), None, &entry),
            };
            entries.push(spec);
        }
        Ok(entries)
    }

    /// The maintenance incident of a package, looked up on a best-effort basis.
    async fn incident(&self, package: &PackageRef) -> Option<String> {
        let raw = match self
            .source
            .package_meta(&package.project, &package.package)
            .await
        {
            Ok(raw) => raw,
            Err(error) => {
                warn!(?package, %error, "Could not read package meta for the incident link.");
                return None;
            }
        };
        match PackageMeta::parse(&raw) {
            Ok(meta) => meta.maintenance_incident(&package.project),
            Err(error) => {
                warn!(?package, %error, "Package meta is malformed.");
                None
            }
        }
    }

    async fn list_revisions(&self, package: &PackageRef) -> Result<Vec<Spec>, ObsError> {
        Ok(self
            .source
            .history(&package.project, &package.package)
            .await?
            .into_iter()
            .map(|revision| {
                EntrySpec::directory(
                    revision.rev.to_string(),
                    DirKey::Revision {
                        package: package.clone(),
                        rev: revision.rev,
                    },
                )
            })
            .collect())
    }

    async fn list_revision(&self, package: &PackageRef, rev: u32) -> Result<Vec<Spec>, ObsError> {
        let rev_name = rev.to_string();
        let listing = self
            .source
            .files(&package.project, &package.package, Some(&rev_name))
            .await?;
        Ok(listing
            .entries
            .iter()
            .map(|entry| source_file(package, entry.name.clone(), Some(rev), entry))
            .collect())
    }

    async fn list_builds(&self, package: &PackageRef) -> Result<Vec<Spec>, ObsError> {
        let raw = self.source.project_meta(&package.project).await?;
        let meta = ProjectMeta::parse(&raw)?;

        let mut repositories: BTreeMap<&str, Vec<Spec>> = BTreeMap::new();
        for (repository, arch) in meta.active_repositories() {
            repositories.entry(repository).or_default().push(EntrySpec::directory(
                arch,
                DirKey::Binaries {
                    package: package.clone(),
                    repository: repository.to_owned(),
                    arch: arch.to_owned(),
                },
            ));
        }
        Ok(repositories
            .into_iter()
            .map(|(repository, archs)| EntrySpec::group(repository, archs))
            .collect())
    }

    async fn list_binaries(
        &self,
        package: &PackageRef,
        repository: &str,
        arch: &str,
    ) -> Result<Vec<Spec>, ObsError> {
        let binaries = self
            .source
            .binaries(&package.project, repository, arch, &package.package)
            .await?;

        let mut entries: Vec<Spec> = binaries
            .iter()
            .map(|binary| {
                let spec = EntrySpec::file(
                    binary.filename.clone(),
                    FileKey::Binary {
                        package: package.clone(),
                        repository: repository.to_owned(),
                        arch: arch.to_owned(),
                        file: binary.filename.clone(),
                    },
                    binary.size,
                    binary.modified(),
                );
                if self.options.cache_binaries {
                    spec
                } else {
                    spec.uncached()
                }
            })
            .collect();
        entries.push(
            EntrySpec::generated(
                "_log",
                FileKey::BuildLog {
                    package: package.clone(),
                    repository: repository.to_owned(),
                    arch: arch.to_owned(),
                },
            )
            .uncached(),
        );
        Ok(entries)
    }
}

fn source_file(
    package: &PackageRef,
    name: String,
    rev: Option<u32>,
    entry: &obs_api::models::DirectoryEntry,
) -> Spec {
    EntrySpec::file(
        name.clone(),
        FileKey::Source {
            package: package.clone(),
            file: name,
            rev,
        },
        entry.size.unwrap_or_default(),
        entry.modified(),
    )
}

impl<S: ObsSource> NodeResolver for ObsCatalog<S> {
    type DirKey = DirKey;
    type FileKey = FileKey;
    type Error = ObsError;

    #[instrument(name = "ObsCatalog::list", skip(self))]
    async fn list(&self, key: &DirKey) -> Result<Listing<Self>, ObsError> {
        match key {
            DirKey::Root => self.list_projects().await,
            DirKey::Project(project) => self.list_project(project).await,
            DirKey::Package(package) => self.list_package(package).await,
            DirKey::Revisions(package) => self.list_revisions(package).await,
            DirKey::Revision { package, rev } => self.list_revision(package, *rev).await,
            DirKey::Builds(package) => self.list_builds(package).await,
            DirKey::Binaries {
                package,
                repository,
                arch,
            } => self.list_binaries(package, repository, arch).await,
        }
    }

    #[instrument(name = "ObsCatalog::fetch", skip(self))]
    async fn fetch(&self, key: &FileKey) -> Result<Fetched, ObsError> {
        let data: Bytes = match key {
            FileKey::Source { package, file, rev } => {
                let rev = rev.map(|r| r.to_string());
                self.source
                    .file(&package.project, &package.package, file, rev.as_deref())
                    .await?
            }
            FileKey::ProjectMeta(project) => self.source.project_meta(project).await?,
            FileKey::ProjectInfo(project) => {
                let meta = ProjectMeta::parse(&self.source.project_meta(project).await?)?;
                render::project_info(&meta).into()
            }
            FileKey::PackageMeta(package) => {
                self.source
                    .package_meta(&package.project, &package.package)
                    .await?
            }
            FileKey::PackageInfo(package) => {
                let raw = self
                    .source
                    .package_meta(&package.project, &package.package)
                    .await?;
                render::package_info(&PackageMeta::parse(&raw)?).into()
            }
            FileKey::CommitLog(package) => {
                let history = self
                    .source
                    .history(&package.project, &package.package)
                    .await?;
                render::commit_log(&history).into()
            }
            FileKey::BuildResults(package) => {
                let results = self
                    .source
                    .build_results(&package.project, &package.package)
                    .await?;
                render::build_results(&results).into()
            }
            FileKey::Binary {
                package,
                repository,
                arch,
                file,
            } => {
                self.source
                    .binary(&package.project, repository, arch, &package.package, file)
                    .await?
            }
            FileKey::BuildLog {
                package,
                repository,
                arch,
            } => self
                .source
                .build_log(&package.project, repository, arch, &package.package)
                .await?
                .unwrap_or_default(),
        };
        Ok(Fetched::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_filters() {
        let defaults = CatalogOptions::default();
        assert!(defaults.shows_project("openSUSE:Factory"));
        assert!(!defaults.shows_project("home:alice"));
        assert!(!defaults.shows_project("SUSE:Maintenance:123"));
        assert!(!defaults.shows_project("PTF:1234"));
        assert!(!defaults.shows_project("SUSE:PTF:1234"));

        let all = CatalogOptions {
            include_homes: true,
            include_maintenance: true,
            include_ptf: true,
            cache_binaries: false,
        };
        assert!(all.shows_project("home:alice"));
        assert!(all.shows_project("SUSE:Maintenance:123"));
        assert!(all.shows_project("PTF:1234"));
    }
}
