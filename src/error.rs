use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the project, workspace and adoption operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{program} not found - is it installed?")]
    ToolNotFound { program: String },

    #[error("{command} failed: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("'{name}' already exists at {}", path.display())]
    AlreadyExists { name: String, path: PathBuf },

    #[error("not a git working copy: {}", path.display())]
    NotARepository { path: PathBuf },

    #[error(
        "could not move {} to {}: {source}\n\
         close any editor or terminal that has files open inside it and try again; \
         the repository was left at {}",
        from.display(),
        to.display(),
        from.display()
    )]
    AdoptionLocked {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "{} contains the managed root {}; pick a folder outside the root",
        folder.display(),
        root.display()
    )]
    RootInsideFolder { folder: PathBuf, root: PathBuf },

    #[error("invalid name '{0}'")]
    InvalidName(String),

    #[error("no project named '{0}'")]
    UnknownProject(String),
}

impl Error {
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_message_names_the_leftover_path() {
        let err = Error::AdoptionLocked {
            from: PathBuf::from("/root/__adopt_tmp__demo"),
            to: PathBuf::from("/root/demo/workspaces/main"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        let msg = err.to_string();
        assert!(msg.contains("close any editor"));
        assert!(msg.ends_with("/root/__adopt_tmp__demo"));
    }

    #[test]
    fn command_failed_carries_stderr() {
        let err = Error::CommandFailed {
            command: "git push".into(),
            code: Some(1),
            stderr: "rejected".into(),
        };
        assert_eq!(err.to_string(), "git push failed: rejected");
    }
}
