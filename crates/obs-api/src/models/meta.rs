//! Project and package `_meta` documents.

use super::{expect_root, required_attr};
use crate::error::ObsError;
use crate::xml::Element;

/// Users and groups by role. Groups are prefixed with `@`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roles {
    /// Role `maintainer`.
    pub maintainers: Vec<String>,
    /// Role `bugowner`.
    pub bugowners: Vec<String>,
    /// Role `reader`.
    pub readers: Vec<String>,
}

impl Roles {
    fn add(&mut self, role: &str, subject: String) {
        match role {
            "maintainer" => self.maintainers.push(subject),
            "bugowner" => self.bugowners.push(subject),
            "reader" => self.readers.push(subject),
            _ => {}
        }
    }
}

/// One `<enable>`/`<disable>` flag of a `<build>` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFlag {
    /// Repository the flag applies to, or all of them.
    pub repository: Option<String>,
    /// Architecture the flag applies to, or all of them.
    pub arch: Option<String>,
}

/// The `<build>` section of a meta document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFlags {
    /// A bare `<disable/>` turned off every build.
    pub all_disabled: bool,
    /// Targeted `<disable>` flags.
    pub disabled: Vec<BuildFlag>,
    /// Targeted `<enable>` flags.
    pub enabled: Vec<BuildFlag>,
}

impl BuildFlags {
    fn parse(element: &Element) -> Self {
        let mut flags = Self::default();
        for child in element.children() {
            let enable = match child.name() {
                "enable" => true,
                "disable" => false,
                _ => continue,
            };
            let flag = BuildFlag {
                repository: child.attr("repository").map(str::to_owned),
                arch: child.attr("arch").map(str::to_owned),
            };
            if flag.repository.is_none() && flag.arch.is_none() {
                flags.all_disabled = !enable;
            } else if enable {
                flags.enabled.push(flag);
            } else {
                flags.disabled.push(flag);
            }
        }
        flags
    }

    /// Whether builds for `repository` are on, ignoring per-arch flags.
    #[must_use]
    pub fn repository_enabled(&self, repository: &str) -> bool {
        let names = |flags: &[BuildFlag]| {
            flags
                .iter()
                .any(|f| f.repository.as_deref() == Some(repository) && f.arch.is_none())
        };
        if names(&self.enabled) {
            true
        } else if names(&self.disabled) {
            false
        } else {
            !self.all_disabled
        }
    }
}

/// A `<path>` a repository builds against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPath {
    /// Project of the base repository.
    pub project: String,
    /// Name of the base repository.
    pub repository: String,
}

/// Where a repository's results are released to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseTarget {
    /// Target project.
    pub project: String,
    /// Target repository.
    pub repository: String,
    /// Released only on explicit request, e.g. image repositories.
    pub manual: bool,
}

/// A `<repository>` of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repository {
    /// Repository name.
    pub name: String,
    /// Base repositories.
    pub paths: Vec<RepositoryPath>,
    /// Built architectures.
    pub archs: Vec<String>,
    /// Release target, if any.
    pub release_target: Option<ReleaseTarget>,
}

impl Repository {
    fn parse(element: &Element) -> Result<Self, ObsError> {
        let mut repo = Self {
            name: required_attr(element, "repository", "name")?.to_owned(),
            ..Self::default()
        };
        for child in element.children() {
            match child.name() {
                "path" => repo.paths.push(RepositoryPath {
                    project: required_attr(child, "path", "project")?.to_owned(),
                    repository: required_attr(child, "path", "repository")?.to_owned(),
                }),
                "arch" => repo.archs.push(child.text().to_owned()),
                "releasetarget" => {
                    repo.release_target = Some(ReleaseTarget {
                        project: required_attr(child, "releasetarget", "project")?.to_owned(),
                        repository: required_attr(child, "releasetarget", "repository")?
                            .to_owned(),
                        manual: child.attr("trigger") == Some("manual"),
                    });
                }
                _ => {}
            }
        }
        Ok(repo)
    }
}

/// A project `_meta` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMeta {
    /// Project name.
    pub name: String,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// People and groups.
    pub roles: Roles,
    /// Development project, if the project is developed elsewhere.
    pub devel_project: Option<String>,
    /// Configured repositories.
    pub repositories: Vec<Repository>,
    /// Build enable/disable flags.
    pub build: BuildFlags,
    /// Whether debuginfo packages are built, if configured.
    pub debuginfo: Option<bool>,
    /// Whether the project is locked.
    pub locked: bool,
}

impl ProjectMeta {
    /// Parse a raw `<project>` document.
    pub fn parse(document: &[u8]) -> Result<Self, ObsError> {
        Self::from_element(&Element::parse(document)?)
    }

    /// Interpret a parsed `<project>` document.
    pub fn from_element(root: &Element) -> Result<Self, ObsError> {
        expect_root(root, "project")?;
        let mut meta = Self {
            name: required_attr(root, "project", "name")?.to_owned(),
            ..Self::default()
        };
        for el in root.children() {
            match el.name() {
                "title" => meta.title = el.text().to_owned(),
                "description" => meta.description = el.text().to_owned(),
                "person" | "group" => add_role(&mut meta.roles, el),
                "devel" => meta.devel_project = el.attr("project").map(str::to_owned),
                "repository" => meta.repositories.push(Repository::parse(el)?),
                "build" => meta.build = BuildFlags::parse(el),
                "debuginfo" => meta.debuginfo = Some(el.child("enable").is_some()),
                "lock" => meta.locked = el.child("enable").is_some(),
                _ => {}
            }
        }
        Ok(meta)
    }

    /// `(repository, arch)` pairs that build automatically.
    ///
    /// Repositories released only on manual trigger are left out.
    #[must_use]
    pub fn active_repositories(&self) -> Vec<(&str, &str)> {
        self.repositories
            .iter()
            .filter(|r| !r.release_target.as_ref().is_some_and(|t| t.manual))
            .flat_map(|r| r.archs.iter().map(move |a| (r.name.as_str(), a.as_str())))
            .collect()
    }
}

/// A package `_meta` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMeta {
    /// Package name.
    pub name: String,
    /// Owning project.
    pub project: String,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// People and groups.
    pub roles: Roles,
    /// Development project.
    pub devel_project: Option<String>,
    /// `<releasename>`, the base name of a maintenance package.
    pub release_name: Option<String>,
    /// Build enable/disable flags.
    pub build: BuildFlags,
}

impl PackageMeta {
    /// Parse a raw `<package>` document.
    pub fn parse(document: &[u8]) -> Result<Self, ObsError> {
        Self::from_element(&Element::parse(document)?)
    }

    /// Interpret a parsed `<package>` document.
    pub fn from_element(root: &Element) -> Result<Self, ObsError> {
        expect_root(root, "package")?;
        let mut meta = Self {
            name: required_attr(root, "package", "name")?.to_owned(),
            project: root.attr("project").unwrap_or_default().to_owned(),
            ..Self::default()
        };
        for el in root.children() {
            match el.name() {
                "title" => meta.title = el.text().to_owned(),
                "description" => meta.description = el.text().to_owned(),
                "person" | "group" => add_role(&mut meta.roles, el),
                "devel" => meta.devel_project = el.attr("project").map(str::to_owned),
                "releasename" => {
                    meta.release_name = Some(el.text().to_owned()).filter(|n| !n.is_empty());
                }
                "build" => meta.build = BuildFlags::parse(el),
                _ => {}
            }
        }
        Ok(meta)
    }

    /// The maintenance incident project this package was built in, if any.
    ///
    /// Maintenance packages in an `...:Update` project are named `<releasename>.<incident>`;
    /// the incident lives in `<prefix>:Maintenance:<incident>`.
    #[must_use]
    pub fn maintenance_incident(&self, project: &str) -> Option<String> {
        let release_name = self.release_name.as_deref()?;
        let (base, number) = self.name.rsplit_once('.')?;
        if base != release_name {
            return None;
        }
        let incident: u64 = number.parse().ok()?;

        if project.rsplit(':').next() != Some("Update") {
            return None;
        }
        let prefix = project.split(':').next()?;
        Some(format!("{prefix}:Maintenance:{incident}"))
    }
}

fn add_role(roles: &mut Roles, element: &Element) {
    let Some(role) = element.attr("role") else {
        return;
    };
    let subject = match element.name() {
        "group" => element.attr("groupid").map(|g| format!("@{g}")),
        _ => element.attr("userid").map(str::to_owned),
    };
    if let Some(subject) = subject {
        roles.add(role, subject);
    }
}
