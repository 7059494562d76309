use std::path::Path;

use crate::error::{Error, Result};

/// Suffix appended to a project name that is already taken.
pub const COLLISION_SUFFIX: &str = "_local";
/// Prefix of the temporary name an adopted repository is staged under.
pub const STAGING_PREFIX: &str = "__adopt_tmp__";
/// Workspace name used when the branch cannot be determined.
pub const DEFAULT_WORKSPACE: &str = "main";

/// Normalise a user-supplied project or workspace name: trim it and turn
/// spaces into underscores. Rejects names that cannot be a single directory.
pub fn sanitize(raw: &str) -> Result<String> {
    let name = raw.trim().replace(' ', "_");
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(Error::InvalidName(raw.to_string()));
    }
    Ok(name)
}

/// Flatten a branch name into a directory-safe workspace name.
pub fn workspace_from_branch(branch: Option<&str>) -> String {
    let flat = branch.unwrap_or("").trim().replace(['/', '\\'], "_");
    if flat.is_empty() {
        DEFAULT_WORKSPACE.to_string()
    } else {
        flat
    }
}

/// Pick a project name under `root` that no directory occupies yet:
/// `base`, then `base_local`, `base_local2`, `base_local3`, ...
///
/// `vacating` names a directory that is about to be moved away; the name it
/// occupies counts as free.
pub fn unique_project_name(root: &Path, base: &str, vacating: Option<&Path>) -> String {
    let taken = |name: &str| {
        let candidate = root.join(name);
        if let Some(v) = vacating
            && candidate == v
        {
            return false;
        }
        candidate.exists()
    };

    if !taken(base) {
        return base.to_string();
    }
    let stem = format!("{base}{COLLISION_SUFFIX}");
    if !taken(&stem) {
        return stem;
    }
    let mut counter = 2u32;
    loop {
        let name = format!("{stem}{counter}");
        if !taken(&name) {
            return name;
        }
        counter += 1;
    }
}

/// Pick the temporary name an adopted folder is renamed to inside `root`:
/// `__adopt_tmp__<name>`, then `__adopt_tmp__<name>_2`, ...
pub fn unique_staging_name(root: &Path, name: &str) -> String {
    let base = format!("{STAGING_PREFIX}{name}");
    if !root.join(&base).exists() {
        return base;
    }
    let mut counter = 2u32;
    loop {
        let candidate = format!("{base}_{counter}");
        if !root.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sanitize_replaces_spaces_and_trims() {
        assert_eq!(sanitize("  my project ").unwrap(), "my_project");
    }

    #[test]
    fn sanitize_rejects_unusable_names() {
        for bad in ["", "   ", ".", "..", "a/b", "a\\b"] {
            assert!(matches!(sanitize(bad), Err(Error::InvalidName(_))), "{bad:?}");
        }
    }

    #[test]
    fn workspace_from_branch_flattens_slashes() {
        assert_eq!(workspace_from_branch(Some("feature/x")), "feature_x");
        assert_eq!(workspace_from_branch(Some("a/b/c")), "a_b_c");
        assert_eq!(workspace_from_branch(Some("main")), "main");
    }

    #[test]
    fn workspace_from_branch_defaults() {
        assert_eq!(workspace_from_branch(None), DEFAULT_WORKSPACE);
        assert_eq!(workspace_from_branch(Some("  ")), DEFAULT_WORKSPACE);
    }

    #[test]
    fn unique_project_name_free_base() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_project_name(dir.path(), "p", None), "p");
    }

    #[test]
    fn unique_project_name_counts_up() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("p")).unwrap();
        assert_eq!(unique_project_name(dir.path(), "p", None), "p_local");

        fs::create_dir(dir.path().join("p_local")).unwrap();
        assert_eq!(unique_project_name(dir.path(), "p", None), "p_local2");

        fs::create_dir(dir.path().join("p_local2")).unwrap();
        assert_eq!(unique_project_name(dir.path(), "p", None), "p_local3");
    }

    #[test]
    fn unique_project_name_ignores_vacating_dir() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("demo");
        fs::create_dir(&source).unwrap();
        assert_eq!(unique_project_name(dir.path(), "demo", Some(&source)), "demo");
        assert_eq!(unique_project_name(dir.path(), "demo", None), "demo_local");
    }

    #[test]
    fn unique_staging_name_counts_up() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_staging_name(dir.path(), "demo"), "__adopt_tmp__demo");
        fs::create_dir(dir.path().join("__adopt_tmp__demo")).unwrap();
        assert_eq!(unique_staging_name(dir.path(), "demo"), "__adopt_tmp__demo_2");
        fs::create_dir(dir.path().join("__adopt_tmp__demo_2")).unwrap();
        assert_eq!(unique_staging_name(dir.path(), "demo"), "__adopt_tmp__demo_3");
    }
}
