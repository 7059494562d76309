use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_KEY: &str = "python.defaultInterpreterPath";

/// Writes the helper files every managed workspace carries. Runs after each
/// create, import and adopt; its failure never undoes the workspace.
pub trait WorkspaceFiles {
    fn generate(&self, project: &str, workspace: &Path) -> Result<()>;
}

/// Session script, notebook helper and editor settings pointing at the shared
/// isolated environment.
pub struct SessionFiles {
    pub venv: PathBuf,
}

#[cfg(windows)]
const SESSION_SCRIPT: &str = "start_session.bat";
#[cfg(not(windows))]
const SESSION_SCRIPT: &str = "start_session.sh";

impl SessionFiles {
    pub fn new(venv: impl Into<PathBuf>) -> Self {
        Self { venv: venv.into() }
    }

    #[cfg(windows)]
    fn python(&self) -> PathBuf {
        self.venv.join("Scripts").join("python.exe")
    }

    #[cfg(not(windows))]
    fn python(&self) -> PathBuf {
        self.venv.join("bin").join("python")
    }

    #[cfg(windows)]
    fn session_script(&self, project: &str, ws: &Path, ws_name: &str) -> String {
        let activate = self.venv.join("Scripts").join("activate.bat");
        format!(
            r#"@echo off
cd /d "{ws}"

echo.
echo ================================================================
echo  PROJECT:   {project}
echo  WORKSPACE: {ws_name}
echo ================================================================
echo.

if exist "{activate}" (
    call "{activate}"
    echo  [VENV] Activated: {venv}
) else (
    echo  [!] Global venv not found: {venv}
)

echo.
echo  GIT BRANCH:
git branch
echo.
echo  GIT STATUS:
git status
echo.
echo  Session ready!
"#,
            ws = ws.display(),
            activate = activate.display(),
            venv = self.venv.display(),
        )
    }

    #[cfg(not(windows))]
    fn session_script(&self, project: &str, ws: &Path, ws_name: &str) -> String {
        let activate = self.venv.join("bin").join("activate");
        format!(
            r#"#!/usr/bin/env bash
# Source this file to start working in the workspace:
#   . ./{SESSION_SCRIPT}
cd "{ws}" || return 1 2>/dev/null || exit 1

echo
echo "================================================================"
echo " PROJECT:   {project}"
echo " WORKSPACE: {ws_name}"
echo "================================================================"
echo

if [ -f "{activate}" ]; then
    . "{activate}"
    echo " [VENV] Activated: {venv}"
else
    echo " [!] Global venv not found: {venv}"
fi

echo
echo " GIT BRANCH:"
git branch
echo
echo " GIT STATUS:"
git status
echo
echo " Session ready!"
"#,
            ws = ws.display(),
            activate = activate.display(),
            venv = self.venv.display(),
        )
    }

    fn notebook_helper(&self) -> String {
        format!(
            r#""""
Notebook helper. Run setup_venv() in your first cell:

    from notebook_helper import setup_venv
    setup_venv()
"""
import os
import sys
from pathlib import Path

VENV_PATH = Path(r"{venv}")
VENV_PYTHON = Path(r"{python}")
VENV_BIN = VENV_PYTHON.parent


def _site_packages():
    candidates = [VENV_PATH / "Lib" / "site-packages"]
    candidates += sorted(VENV_PATH.glob("lib/python*/site-packages"))
    for candidate in candidates:
        if candidate.exists():
            return candidate
    return None


def setup_venv():
    """Add the shared venv to sys.path for this notebook session."""
    if not VENV_PATH.exists():
        print(f"[!] Venv not found: {{VENV_PATH}}")
        return False

    site_packages = _site_packages()
    if site_packages is None:
        print(f"[!] site-packages not found under {{VENV_PATH}}")
        return False

    sp = str(site_packages)
    if sp not in sys.path:
        sys.path.insert(0, sp)

    os.environ["VIRTUAL_ENV"] = str(VENV_PATH)
    current_path = os.environ.get("PATH", "")
    if str(VENV_BIN) not in current_path:
        os.environ["PATH"] = str(VENV_BIN) + os.pathsep + current_path

    print(f"[OK] Venv active: {{VENV_PATH.name}}")
    return True


def pip_install(*packages):
    """Install packages into the shared venv."""
    import subprocess
    cmd = [str(VENV_PYTHON), "-m", "pip", "install"] + list(packages)
    print(f"Running: {{' '.join(cmd)}}")
    return subprocess.call(cmd)
"#,
            venv = self.venv.display(),
            python = self.python().display(),
        )
    }
}

/// Set the interpreter key in `existing` settings, keeping every other key.
/// Anything that is not a JSON object is replaced.
fn merge_settings(existing: Option<&str>, python: &Path) -> serde_json::Value {
    let mut settings = existing
        .and_then(|s| serde_json::from_str::<serde_json::Value>(s).ok())
        .filter(|v| v.is_object())
        .unwrap_or_else(|| serde_json::json!({}));

    if let Some(obj) = settings.as_object_mut() {
        obj.insert(
            SETTINGS_KEY.to_string(),
            serde_json::Value::String(python.to_string_lossy().to_string()),
        );
    }
    settings
}

impl WorkspaceFiles for SessionFiles {
    fn generate(&self, project: &str, workspace: &Path) -> Result<()> {
        let ws_abs = workspace
            .canonicalize()
            .with_context(|| format!("workspace not found: {}", workspace.display()))?;
        let ws_name = ws_abs
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let script = ws_abs.join(SESSION_SCRIPT);
        fs::write(&script, self.session_script(project, &ws_abs, &ws_name))
            .with_context(|| format!("could not write {}", script.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;
        }

        let helper = ws_abs.join("notebook_helper.py");
        fs::write(&helper, self.notebook_helper())
            .with_context(|| format!("could not write {}", helper.display()))?;

        let vscode = ws_abs.join(".vscode");
        fs::create_dir_all(&vscode)?;
        let settings_path = vscode.join("settings.json");
        let existing = fs::read_to_string(&settings_path).ok();
        let settings = merge_settings(existing.as_deref(), &self.python());
        fs::write(&settings_path, serde_json::to_string_pretty(&settings)?)
            .with_context(|| format!("could not write {}", settings_path.display()))?;

        tracing::debug!(project, workspace = %ws_abs.display(), "workspace files written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_settings(ws: &Path) -> serde_json::Value {
        let raw = fs::read_to_string(ws.join(".vscode/settings.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[test]
    fn merge_into_empty() {
        let v = merge_settings(None, Path::new("/venv/bin/python"));
        assert_eq!(v, serde_json::json!({ SETTINGS_KEY: "/venv/bin/python" }));
    }

    #[test]
    fn merge_preserves_other_keys() {
        let existing = r#"{"editor.tabSize": 2, "python.defaultInterpreterPath": "/old"}"#;
        let v = merge_settings(Some(existing), Path::new("/new"));
        assert_eq!(v["editor.tabSize"], 2);
        assert_eq!(v[SETTINGS_KEY], "/new");
    }

    #[test]
    fn merge_replaces_garbage_and_non_objects() {
        for existing in ["{not json", "[1, 2]", "\"text\""] {
            let v = merge_settings(Some(existing), Path::new("/p"));
            assert_eq!(v, serde_json::json!({ SETTINGS_KEY: "/p" }), "{existing}");
        }
    }

    #[test]
    fn generate_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("main");
        fs::create_dir(&ws).unwrap();
        let files = SessionFiles::new(dir.path().join("venv"));

        files.generate("demo", &ws).unwrap();

        let script = fs::read_to_string(ws.join(SESSION_SCRIPT)).unwrap();
        assert!(script.contains("demo"));
        assert!(script.contains("main"));
        assert!(ws.join("notebook_helper.py").is_file());
        let settings = read_settings(&ws);
        assert!(settings[SETTINGS_KEY].as_str().unwrap().contains("venv"));
    }

    #[test]
    fn generate_is_repeatable_and_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let ws = dir.path().join("main");
        fs::create_dir_all(ws.join(".vscode")).unwrap();
        fs::write(ws.join(".vscode/settings.json"), r#"{"files.autoSave": "on"}"#).unwrap();
        let files = SessionFiles::new(dir.path().join("venv"));

        files.generate("demo", &ws).unwrap();
        let first = fs::read_to_string(ws.join(SESSION_SCRIPT)).unwrap();
        files.generate("demo", &ws).unwrap();
        let second = fs::read_to_string(ws.join(SESSION_SCRIPT)).unwrap();

        assert_eq!(first, second);
        let settings = read_settings(&ws);
        assert_eq!(settings["files.autoSave"], "on");
        assert!(settings.get(SETTINGS_KEY).is_some());
    }

    #[test]
    fn generate_fails_for_missing_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let files = SessionFiles::new(dir.path().join("venv"));
        assert!(files.generate("demo", &dir.path().join("missing")).is_err());
    }
}
