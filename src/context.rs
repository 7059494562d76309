use std::path::{Path, PathBuf};

use crate::git::GitRunner;
use crate::prompt::Confirm;
use crate::session::WorkspaceFiles;

/// Everything a store or the adoption engine needs, passed explicitly.
/// Built once from the loaded config.
pub struct Context<'a> {
    pub root: PathBuf,
    pub git: GitRunner,
    pub files: &'a dyn WorkspaceFiles,
    pub confirm: &'a dyn Confirm,
}

impl<'a> Context<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        git: GitRunner,
        files: &'a dyn WorkspaceFiles,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            root: root.into(),
            git,
            files,
            confirm,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run workspace-file generation. Failures are logged and handed back as
    /// text for the caller to show; they never fail the parent operation.
    pub fn generate_files(&self, project: &str, workspace: &Path) -> Option<String> {
        match self.files.generate(project, workspace) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(project, workspace = %workspace.display(), error = %e, "workspace files");
                Some(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Records every generation request instead of writing files.
    #[derive(Default)]
    pub struct RecordingFiles {
        pub calls: RefCell<Vec<(String, PathBuf)>>,
        pub fail: bool,
    }

    impl WorkspaceFiles for RecordingFiles {
        fn generate(&self, project: &str, workspace: &Path) -> anyhow::Result<()> {
            self.calls
                .borrow_mut()
                .push((project.to_string(), workspace.to_path_buf()));
            if self.fail {
                anyhow::bail!("disk full");
            }
            Ok(())
        }
    }
}
