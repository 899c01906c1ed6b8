//! Human-readable renderings of OBS documents.

use obs_api::models::{PackageMeta, ProjectMeta, ResultList, Revision, Roles};

fn push_roles(lines: &mut Vec<String>, roles: &Roles, with_readers: bool) {
    lines.push(format!("maintainers: {}", roles.maintainers.join(" ")));
    lines.push(format!("bugowners: {}", roles.bugowners.join(" ")));
    if with_readers {
        lines.push(format!("readers: {}", roles.readers.join(" ")));
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// The project `info` file.
#[must_use]
pub fn project_info(meta: &ProjectMeta) -> String {
    let mut lines = vec![
        format!("title: {}", meta.title),
        format!("description: {}", meta.description),
    ];
    push_roles(&mut lines, &meta.roles, true);
    let repositories: Vec<&str> = meta.repositories.iter().map(|r| r.name.as_str()).collect();
    lines.push(format!("repositories: {}", repositories.join(" ")));
    if let Some(devel) = &meta.devel_project {
        lines.push(format!("devel project: {devel}"));
    }
    if meta.locked {
        lines.push("locked: yes".to_owned());
    }
    finish(lines)
}

/// The package `info` file.
#[must_use]
pub fn package_info(meta: &PackageMeta) -> String {
    let mut lines = vec![
        format!("title: {}", meta.title),
        format!("description: {}", meta.description),
    ];
    push_roles(&mut lines, &meta.roles, false);
    lines.push(format!(
        "devel project: {}",
        meta.devel_project.as_deref().unwrap_or_default()
    ));
    lines.push(format!(
        "release name: {}",
        meta.release_name.as_deref().unwrap_or_default()
    ));
    finish(lines)
}

/// The `commitlog` file, newest revision first.
#[must_use]
pub fn commit_log(revisions: &[Revision]) -> String {
    let mut out = String::new();
    for revision in revisions.iter().rev() {
        let user = revision.user.as_deref().unwrap_or("unknown");
        let date = revision
            .date()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown date".to_owned());
        out.push_str(&format!("r{}: {user} on {date}", revision.rev));
        if let Some(request) = &revision.request_id {
            out.push_str(&format!(" via request {request}"));
        }
        out.push('\n');
        if let Some(comment) = &revision.comment {
            out.push_str(comment);
            out.push('\n');
        }
        out.push('\n');
    }
    out
}

/// The `buildresults` table: one `repository arch code` row per result, columns aligned.
///
/// The package's own status code is shown when the result carries exactly one; otherwise the
/// repository code.
#[must_use]
pub fn build_results(list: &ResultList) -> String {
    let rows: Vec<[&str; 3]> = list
        .results
        .iter()
        .map(|result| {
            let code = match result.statuses.as_slice() {
                [only] => only.code.as_str(),
                _ => result.code.as_str(),
            };
            [result.repository.as_str(), result.arch.as_str(), code]
        })
        .collect();

    let width = |column: usize| rows.iter().map(|row| row[column].len()).max().unwrap_or(0);
    let (repo_width, arch_width) = (width(0), width(1));

    let mut out = String::new();
    for [repo, arch, code] in rows {
        out.push_str(&format!("{repo:<repo_width$}  {arch:<arch_width$}  {code}\n"));
    }
    out
}
