//! Folding an existing working copy into the managed layout.
//!
//! The folder becomes `<root>/<project>/workspaces/<branch>` and a new bare
//! repository at `<root>/<project>/origin.git` is seeded from it. The folder
//! is moved, never copied, so its history, stashes and untracked files come
//! along unchanged.
//!
//! A folder that sits directly under the root is first renamed to a private
//! staging name there, because its own directory is usually exactly where the
//! new project directory has to go.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::git::OnFailure;
use crate::names;
use crate::paths;
use crate::project::{self, Project};
use crate::workspace::{self, Created, Workspace};

/// Upper bound for `git fetch --all` before adopting.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Ask through the context's confirmation collaborator.
    #[default]
    Ask,
    Always,
    Never,
}

#[derive(Debug)]
pub struct Adopted {
    pub created: Created,
    /// Where the folder was parked before the final move, if it was staged.
    pub staged_at: Option<PathBuf>,
    /// The remote-history fetch ran and succeeded.
    pub fetched: bool,
}

pub fn adopt(ctx: &Context, folder: &Path, fetch: FetchPolicy) -> Result<Adopted> {
    // 1. validate
    if !paths::is_working_copy(folder) {
        return Err(Error::NotARepository {
            path: folder.to_path_buf(),
        });
    }
    let source = folder
        .canonicalize()
        .map_err(|e| Error::fs("resolve", folder, e))?;
    let folder_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidName(source.display().to_string()))?;
    // Moving a folder into a directory beneath itself cannot work; refuse
    // before anything is created.
    paths::ensure_root_outside(&source, ctx.root())?;

    paths::ensure(ctx.root())?;
    let under_root = source
        .parent()
        .is_some_and(|parent| paths::same_dir(parent, ctx.root()));

    // 2. project name; a folder directly under the root is about to vacate
    // its own name, so that name counts as free.
    let base = names::sanitize(&folder_name)?;
    let vacating = under_root.then(|| ctx.root().join(&folder_name));
    let project_name = names::unique_project_name(ctx.root(), &base, vacating.as_deref());
    let project = Project::at(ctx.root(), &project_name);

    // 3. workspace name from the checked-out branch
    let branch = ctx.git.current_branch(&source)?;
    let ws_name = names::workspace_from_branch(branch.as_deref());
    tracing::info!(
        source = %source.display(),
        project = %project_name,
        workspace = %ws_name,
        "adopting"
    );

    // 4. optional fetch, best effort
    let fetched = fetch_remote_history(ctx, &source, &folder_name, fetch)?;

    // 5. self-collision staging
    let staged_at = if under_root {
        let staged = ctx
            .root()
            .join(names::unique_staging_name(ctx.root(), &folder_name));
        fs::rename(&source, &staged).map_err(|e| relocation_error(&source, &staged, e))?;
        tracing::info!(from = %source.display(), to = %staged.display(), "staged");
        Some(staged)
    } else {
        None
    };
    let working = staged_at.clone().unwrap_or_else(|| source.clone());

    // 6-7. project directory (created exactly once) and bare origin
    // 8. relocate; past this point nothing is undone automatically
    let ws_path = project.paths.workspace(&ws_name);
    project::init_layout(ctx, &project)
        .and_then(|()| relocate(&working, &ws_path))
        .inspect_err(|e| {
            if let Some(staged) = &staged_at {
                tracing::warn!(
                    staged = %staged.display(),
                    error = %e,
                    "adoption stopped; the repository is still at its staged path"
                );
            }
        })?;
    tracing::info!(to = %ws_path.display(), "relocated");

    // 9. point origin at the new bare repository
    ctx.git.remote_remove(&ws_path, "origin", OnFailure::Tolerate)?;
    ctx.git
        .remote_add(&ws_path, "origin", &project.paths.origin, OnFailure::Tolerate)?;

    // 10. branch named after the workspace, pushed upstream
    ctx.git
        .checkout_force_branch(&ws_path, &ws_name, OnFailure::Tolerate)?;
    ctx.git.push_upstream(&ws_path, &ws_name, OnFailure::Tolerate)?;

    // 11. helper files
    let files_error = ctx.generate_files(&project.name, &ws_path);

    // 12. report
    tracing::info!(project = %project.name, workspace = %ws_name, "adopted");
    Ok(Adopted {
        created: Created {
            workspace: Workspace {
                project: project.name.clone(),
                name: ws_name,
                path: ws_path,
            },
            project,
            files_error,
        },
        staged_at,
        fetched,
    })
}

fn fetch_remote_history(ctx: &Context, repo: &Path, display_name: &str, policy: FetchPolicy) -> Result<bool> {
    if policy == FetchPolicy::Never {
        return Ok(false);
    }
    let remotes = match ctx.git.remotes(repo) {
        Ok(r) => r,
        Err(Error::CommandFailed { stderr, .. }) => {
            tracing::debug!(%stderr, "could not list remotes, skipping fetch");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    if remotes.is_empty() {
        return Ok(false);
    }
    if policy == FetchPolicy::Ask {
        let question = format!("'{display_name}' has a remote. Fetch all remote history before adopting?");
        if !ctx.confirm.confirm(&question) {
            return Ok(false);
        }
    }
    let out = ctx.git.fetch_all(repo, OnFailure::Tolerate, FETCH_TIMEOUT)?;
    if !out.success() {
        tracing::warn!(stderr = %out.stderr.trim(), "fetch failed, adopting without it");
    }
    Ok(out.success())
}

/// Move `from` to `to`. Falls back to copy-then-delete across filesystems.
fn relocate(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(from = %from.display(), to = %to.display(), "rename crosses devices, copying");
            workspace::copy_tree_with_git(from, to)?;
            fs::remove_dir_all(from).map_err(|e| relocation_error(from, to, e))
        }
        Err(e) => Err(relocation_error(from, to, e)),
    }
}

/// A held lock shows up as a permission error on Windows and as "busy" on
/// some network filesystems.
fn relocation_error(from: &Path, to: &Path, source: io::Error) -> Error {
    let locked = matches!(
        source.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
    ) || is_sharing_violation(&source);
    if locked {
        Error::AdoptionLocked {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }
    } else {
        Error::fs("move", from, source)
    }
}

#[cfg(windows)]
fn is_sharing_violation(err: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(err.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_sharing_violation(_err: &io::Error) -> bool {
    false
}
