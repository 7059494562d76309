use std::fs;
use std::path::Path;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::names;
use crate::paths::{self, ProjectPaths};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub paths: ProjectPaths,
}

impl Project {
    pub fn at(root: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            paths: ProjectPaths::new(root, name),
        }
    }
}

/// Projects directly under the root, sorted by name. Creates the root if it
/// does not exist yet.
pub fn list_projects(ctx: &Context) -> Result<Vec<Project>> {
    paths::ensure(ctx.root())?;
    let names = paths::sorted_child_dirs(ctx.root(), paths::is_project_dir)?;
    Ok(names.iter().map(|n| Project::at(ctx.root(), n)).collect())
}

/// Look up an existing project by name.
pub fn find_project(ctx: &Context, name: &str) -> Result<Project> {
    let name = names::sanitize(name)?;
    let project = Project::at(ctx.root(), &name);
    if !paths::is_project_dir(&project.paths.dir) {
        return Err(Error::UnknownProject(name));
    }
    Ok(project)
}

/// Create `<root>/<name>/workspaces` and a bare repository at
/// `<root>/<name>/origin.git`. Nothing is rolled back if `git init` fails.
pub fn create_project(ctx: &Context, name: &str) -> Result<Project> {
    let name = names::sanitize(name)?;
    let project = Project::at(ctx.root(), &name);
    if project.paths.dir.exists() {
        return Err(Error::AlreadyExists {
            name,
            path: project.paths.dir,
        });
    }
    init_layout(ctx, &project)?;
    tracing::info!(project = %project.name, "project created");
    Ok(project)
}

/// Directory structure and bare origin for a project whose directory does
/// not exist yet. The project directory itself is created exactly once.
pub(crate) fn init_layout(ctx: &Context, project: &Project) -> Result<()> {
    paths::ensure(ctx.root())?;
    fs::create_dir(&project.paths.dir).map_err(|e| {
        if e.kind() == std::io::ErrorKind::AlreadyExists {
            Error::AlreadyExists {
                name: project.name.clone(),
                path: project.paths.dir.clone(),
            }
        } else {
            Error::fs("create", &project.paths.dir, e)
        }
    })?;
    paths::ensure(&project.paths.workspaces)?;
    ctx.git.init_bare(&project.paths.dir, &project.paths.origin)?;
    Ok(())
}

/// Working copies sitting directly under the root that are not projects.
/// These are candidates for adoption.
pub fn find_unmanaged(ctx: &Context) -> Result<Vec<std::path::PathBuf>> {
    paths::ensure(ctx.root())?;
    let names = paths::sorted_child_dirs(ctx.root(), |p| {
        !paths::is_project_dir(p) && paths::is_working_copy(p)
    })?;
    Ok(names.iter().map(|n| ctx.root().join(n)).collect())
}
