use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::git::OnFailure;
use crate::names;
use crate::paths;
use crate::project::{self, Project};

/// Directory names treated as pre-existing Python environments when importing.
const ENV_DIR_NAMES: &[&str] = &["venv", ".venv", "env", ".env", "virtualenv"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub project: String,
    pub name: String,
    pub path: PathBuf,
}

/// Result of an operation that produced a workspace. `files_error` carries a
/// workspace-file generation failure, which does not fail the operation.
#[derive(Debug)]
pub struct Created {
    pub project: Project,
    pub workspace: Workspace,
    pub files_error: Option<String>,
}

#[derive(Debug)]
pub enum ImportOutcome {
    Imported {
        created: Created,
        /// Environment folders that were copied along untouched.
        kept_env_dirs: Vec<String>,
    },
    Cancelled,
}

#[derive(Debug, Default)]
pub struct ImportOptions {
    pub project: Option<String>,
    pub workspace: Option<String>,
}

/// Workspaces of `project`, sorted by name. Only directories that are
/// themselves working copies count.
pub fn list_workspaces(project: &Project) -> Result<Vec<Workspace>> {
    let names = paths::sorted_child_dirs(&project.paths.workspaces, paths::is_working_copy)?;
    Ok(names
        .into_iter()
        .map(|name| Workspace {
            project: project.name.clone(),
            path: project.paths.workspace(&name),
            name,
        })
        .collect())
}

/// Clone the project's origin into a new workspace and put it on a branch of
/// the same name. Branch creation and push may fail without aborting.
pub fn create_workspace(ctx: &Context, project: &Project, name: &str) -> Result<Created> {
    let name = names::sanitize(name)?;
    let ws_path = project.paths.workspace(&name);
    if ws_path.exists() {
        return Err(Error::AlreadyExists { name, path: ws_path });
    }
    paths::ensure(&project.paths.workspaces)?;

    ctx.git
        .clone_into(&project.paths.dir, &project.paths.origin, &ws_path)?;
    let switched = ctx.git.switch_create(&ws_path, &name, OnFailure::Tolerate)?;
    if !switched.success() {
        tracing::info!(branch = %name, "branch not created, keeping the cloned checkout");
    }
    ctx.git.push_upstream(&ws_path, &name, OnFailure::Tolerate)?;

    let files_error = ctx.generate_files(&project.name, &ws_path);
    tracing::info!(project = %project.name, workspace = %name, "workspace created");
    Ok(Created {
        project: project.clone(),
        workspace: Workspace {
            project: project.name.clone(),
            name,
            path: ws_path,
        },
        files_error,
    })
}

/// Environment folders directly inside `source`.
pub fn env_dirs_in(source: &Path) -> Vec<String> {
    ENV_DIR_NAMES
        .iter()
        .filter(|name| {
            let dir = source.join(name);
            dir.join("Scripts").is_dir() || dir.join("bin").is_dir() || dir.join("pyvenv.cfg").is_file()
        })
        .map(|name| name.to_string())
        .collect()
}

/// Turn an arbitrary folder into a new project whose single workspace holds a
/// copy of the folder with fresh, single-commit history.
pub fn import_folder(ctx: &Context, source: &Path, opts: ImportOptions) -> Result<ImportOutcome> {
    if !source.is_dir() {
        return Err(Error::fs(
            "import",
            source,
            std::io::Error::from(std::io::ErrorKind::NotFound),
        ));
    }
    // The copy would otherwise walk into its own output.
    paths::ensure_root_outside(source, ctx.root())?;

    let folder_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let base = names::sanitize(opts.project.as_deref().unwrap_or(&folder_name))?;
    let ws_name = names::sanitize(opts.workspace.as_deref().unwrap_or(names::DEFAULT_WORKSPACE))?;

    let kept_env_dirs = env_dirs_in(source);
    if !kept_env_dirs.is_empty() {
        let question = format!(
            "Found existing environment folder(s): {}. They will be copied and left as they are. Continue?",
            kept_env_dirs.join(", ")
        );
        if !ctx.confirm.confirm(&question) {
            return Ok(ImportOutcome::Cancelled);
        }
    }

    let project_name = names::unique_project_name(ctx.root(), &base, None);
    let project = Project::at(ctx.root(), &project_name);
    project::init_layout(ctx, &project)?;

    let ws_path = project.paths.workspace(&ws_name);
    copy_tree(source, &ws_path)?;

    let git = &ctx.git;
    git.init(&ws_path)?;
    git.remote_add(&ws_path, "origin", &project.paths.origin, OnFailure::Bail)?;
    git.add_all(&ws_path)?;
    git.commit(&ws_path, "Initial import", OnFailure::Tolerate)?;
    git.rename_branch(&ws_path, &ws_name, OnFailure::Tolerate)?;
    git.push_upstream(&ws_path, &ws_name, OnFailure::Tolerate)?;

    let files_error = ctx.generate_files(&project.name, &ws_path);
    tracing::info!(project = %project.name, workspace = %ws_name, source = %source.display(), "folder imported");

    Ok(ImportOutcome::Imported {
        created: Created {
            workspace: Workspace {
                project: project.name.clone(),
                name: ws_name,
                path: ws_path,
            },
            project,
            files_error,
        },
        kept_env_dirs,
    })
}

/// Deep-copy `from` into a new directory `to`, leaving out the top-level
/// `.git` so the copy does not inherit the source's history.
pub(crate) fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    copy_dir(from, to, true)
}

/// Deep-copy `from` into a new directory `to`, git metadata included.
pub(crate) fn copy_tree_with_git(from: &Path, to: &Path) -> Result<()> {
    copy_dir(from, to, false)
}

fn copy_dir(from: &Path, to: &Path, skip_git: bool) -> Result<()> {
    let walker = WalkDir::new(from)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !(skip_git && e.depth() == 1 && e.file_name() == ".git"));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            Error::fs("copy", path, e.into())
        })?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .unwrap_or_else(|_| Path::new(""));
        let dest = to.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if entry.depth() == 0 {
                fs::create_dir(&dest).map_err(|e| Error::fs("create", &dest, e))?;
            } else {
                paths::ensure(&dest)?;
            }
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| Error::fs("copy", entry.path(), e))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| Error::fs("read link", src, e))?;
    std::os::unix::fs::symlink(&target, dest).map_err(|e| Error::fs("create link", dest, e))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    if src.is_dir() {
        return copy_dir(src, dest, false);
    }
    fs::copy(src, dest)
        .map(|_| ())
        .map_err(|e| Error::fs("copy", src, e))
}

/// Snapshot of a workspace for listings.
#[derive(Debug)]
pub struct WorkspaceEntry {
    pub project: String,
    pub name: String,
    pub path: PathBuf,
    pub branch: Option<String>,
    /// Remote `origin` points at the project's bare repository.
    pub tracks_origin: bool,
    /// Uncommitted paths; `None` when git could not tell.
    pub changes: Option<usize>,
    pub last_modified: Option<SystemTime>,
}

pub fn inspect(ctx: &Context, project: &Project, ws: &Workspace) -> WorkspaceEntry {
    let branch = ctx.git.current_branch(&ws.path).unwrap_or_default();
    let tracks_origin = ctx
        .git
        .remote_url(&ws.path, "origin")
        .ok()
        .flatten()
        .is_some_and(|url| paths::same_dir(Path::new(&url), &project.paths.origin));
    let changes = ctx.git.changed_files(&ws.path).ok();
    let last_modified = fs::metadata(&ws.path).and_then(|m| m.modified()).ok();

    WorkspaceEntry {
        project: project.name.clone(),
        name: ws.name.clone(),
        path: ws.path.clone(),
        branch,
        tracks_origin,
        changes,
        last_modified,
    }
}

/// Entries for every workspace of every project under the root.
pub fn list_all_entries(ctx: &Context) -> Result<Vec<WorkspaceEntry>> {
    let mut entries = Vec::new();
    for project in project::list_projects(ctx)? {
        for ws in list_workspaces(&project)? {
            entries.push(inspect(ctx, &project, &ws));
        }
    }
    Ok(entries)
}

/// Resolve an existing workspace by project and workspace name.
pub fn find_workspace(ctx: &Context, project: &str, name: &str) -> Result<Workspace> {
    let name = names::sanitize(name)?;
    let project = project::find_project(ctx, project)?;
    let path = project.paths.workspace(&name);
    if !paths::is_working_copy(&path) {
        return Err(Error::NotARepository { path });
    }
    Ok(Workspace {
        project: project.name,
        name,
        path,
    })
}
