use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Bare repository directory inside a project. Its presence is what makes a
/// directory a project.
pub const ORIGIN_DIR: &str = "origin.git";
pub const WORKSPACES_DIR: &str = "workspaces";
const GIT_DIR: &str = ".git";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub dir: PathBuf,
    pub origin: PathBuf,
    pub workspaces: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path, project: &str) -> Self {
        let dir = root.join(project);
        Self {
            origin: dir.join(ORIGIN_DIR),
            workspaces: dir.join(WORKSPACES_DIR),
            dir,
        }
    }

    pub fn workspace(&self, workspace: &str) -> PathBuf {
        self.workspaces.join(workspace)
    }
}

/// A directory is a project iff it directly contains the bare origin.
pub fn is_project_dir(dir: &Path) -> bool {
    dir.is_dir() && dir.join(ORIGIN_DIR).is_dir()
}

/// A directory is a working copy iff it has git metadata at its root. `.git`
/// may be a file for linked worktrees and submodules.
pub fn is_working_copy(dir: &Path) -> bool {
    dir.is_dir() && dir.join(GIT_DIR).exists()
}

/// Create `dir` and any missing ancestors. Idempotent.
pub fn ensure(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::fs("create", dir, e))
}

/// Names of the directories directly under `dir` that satisfy `keep`, sorted.
/// A missing `dir` yields nothing.
pub(crate) fn sorted_child_dirs(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::fs("read", dir, e)),
    };

    let mut names = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::fs("read", dir, e))?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        names.push(entry.file_name().to_string_lossy().to_string());
    }
    names.sort();
    Ok(names)
}

/// Resolve symlinks in the longest existing prefix of `path` and append the
/// rest unchanged.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut tail = Vec::new();
    let mut current = path;
    loop {
        if let Ok(resolved) = current.canonicalize() {
            return tail.iter().rev().fold(resolved, |acc, part| acc.join(part));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// Fails when `root` is `folder` itself or lies anywhere beneath it. The root
/// does not have to exist yet.
pub(crate) fn ensure_root_outside(folder: &Path, root: &Path) -> Result<()> {
    let folder = resolve_existing_prefix(folder);
    let root = resolve_existing_prefix(root);
    if root.starts_with(&folder) {
        return Err(Error::RootInsideFolder { folder, root });
    }
    Ok(())
}

/// Compare two paths after resolving symlinks, falling back to the literal
/// paths when either cannot be resolved.
pub(crate) fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_inside_folder_is_rejected_even_before_it_exists() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("code");
        fs::create_dir(&folder).unwrap();

        for root in [folder.clone(), folder.join("projects"), folder.join("a/b/projects")] {
            assert!(
                matches!(ensure_root_outside(&folder, &root), Err(Error::RootInsideFolder { .. })),
                "{}",
                root.display()
            );
        }
    }

    #[test]
    fn sibling_and_nested_folders_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("projects");
        fs::create_dir_all(root.join("demo")).unwrap();
        fs::create_dir(dir.path().join("projects2")).unwrap();

        ensure_root_outside(&dir.path().join("projects2"), &root).unwrap();
        ensure_root_outside(&root.join("demo"), &root).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn root_reached_through_a_symlink_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("code");
        fs::create_dir_all(folder.join("projects")).unwrap();
        std::os::unix::fs::symlink(folder.join("projects"), dir.path().join("root-link")).unwrap();

        let err = ensure_root_outside(&folder, &dir.path().join("root-link")).unwrap_err();
        assert!(matches!(err, Error::RootInsideFolder { .. }));
    }

    #[test]
    fn project_paths_layout() {
        let paths = ProjectPaths::new(Path::new("/srv/projects"), "demo");
        assert_eq!(paths.dir, PathBuf::from("/srv/projects/demo"));
        assert_eq!(paths.origin, PathBuf::from("/srv/projects/demo/origin.git"));
        assert_eq!(paths.workspaces, PathBuf::from("/srv/projects/demo/workspaces"));
        assert_eq!(
            paths.workspace("main"),
            PathBuf::from("/srv/projects/demo/workspaces/main")
        );
    }

    #[test]
    fn project_membership_requires_origin() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("demo");
        fs::create_dir_all(project.join(WORKSPACES_DIR)).unwrap();
        assert!(!is_project_dir(&project));
        fs::create_dir(project.join(ORIGIN_DIR)).unwrap();
        assert!(is_project_dir(&project));
    }

    #[test]
    fn origin_as_file_is_not_a_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(ORIGIN_DIR), "").unwrap();
        assert!(!is_project_dir(dir.path()));
    }

    #[test]
    fn working_copy_accepts_git_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_working_copy(dir.path()));
        fs::write(dir.path().join(".git"), "gitdir: /elsewhere").unwrap();
        assert!(is_working_copy(dir.path()));
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure(&nested).unwrap();
        ensure(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_fails_on_file_in_the_way() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = ensure(&blocker.join("sub")).unwrap_err();
        assert!(matches!(err, Error::Filesystem { .. }));
    }

    #[test]
    fn sorted_child_dirs_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("file.txt"), "").unwrap();
        let names = sorted_child_dirs(dir.path(), |p| p.is_dir()).unwrap();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn sorted_child_dirs_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let names = sorted_child_dirs(&dir.path().join("nope"), |_| true).unwrap();
        assert!(names.is_empty());
    }
}
