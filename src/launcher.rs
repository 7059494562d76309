use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[cfg(windows)]
const EXTENSION: &str = "bat";
#[cfg(not(windows))]
const EXTENSION: &str = "sh";

/// One-click scripts that open a workspace in the configured editor, kept in
/// a single directory and named `<project>__<workspace>.<ext>`.
pub struct Launchers {
    dir: PathBuf,
}

pub fn launcher_name(project: &str, workspace: &str) -> String {
    format!("{project}__{workspace}.{EXTENSION}")
}

fn require_editor(editor: Option<&Path>) -> Result<&Path> {
    match editor {
        Some(path) if !path.as_os_str().is_empty() => Ok(path),
        _ => bail!("no editor configured - set one with `lgm editor <path>`"),
    }
}

#[cfg(not(windows))]
fn quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

#[cfg(not(windows))]
fn script(editor: &Path, workspace: &Path) -> String {
    format!(
        "#!/bin/sh\nnohup {} {} >/dev/null 2>&1 &\n",
        quote(editor),
        quote(workspace)
    )
}

#[cfg(windows)]
fn script(editor: &Path, workspace: &Path) -> String {
    format!(
        "@echo off\r\nstart \"\" \"{}\" \"{}\"\r\nexit\r\n",
        editor.display(),
        workspace.display()
    )
}

impl Launchers {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write (or overwrite) the launcher for a workspace.
    pub fn generate(
        &self,
        editor: Option<&Path>,
        project: &str,
        workspace: &str,
        workspace_path: &Path,
    ) -> Result<PathBuf> {
        let editor = require_editor(editor)?;
        if !workspace_path.is_dir() {
            bail!("workspace not found: {}", workspace_path.display());
        }
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.dir.join(launcher_name(project, workspace));
        fs::write(&path, script(editor, workspace_path))
            .with_context(|| format!("failed to write {}", path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }
        tracing::info!(launcher = %path.display(), "launcher written");
        Ok(path)
    }

    /// Launcher file names, sorted. A missing directory has none.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e.eq_ignore_ascii_case(EXTENSION)) {
                if let Some(name) = path.file_name() {
                    names.push(name.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Start a launcher without waiting for it.
    pub fn run(&self, name: &str) -> Result<()> {
        if !self.list()?.iter().any(|n| n == name) {
            bail!("no launcher named '{name}'");
        }
        let path = self.dir.join(name);
        spawn_detached(launcher_command(&path))
            .with_context(|| format!("failed to run {}", path.display()))
    }
}

#[cfg(not(windows))]
fn launcher_command(path: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg(path);
    cmd
}

#[cfg(windows)]
fn launcher_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(path);
    cmd
}

fn spawn_detached(mut cmd: Command) -> std::io::Result<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Open a workspace in the editor directly.
pub fn open_in_editor(editor: Option<&Path>, workspace_path: &Path) -> Result<()> {
    let editor = require_editor(editor)?;
    if !workspace_path.is_dir() {
        bail!("workspace not found: {}", workspace_path.display());
    }
    let mut cmd = Command::new(editor);
    cmd.arg(workspace_path);
    spawn_detached(cmd).with_context(|| format!("failed to start {}", editor.display()))
}
