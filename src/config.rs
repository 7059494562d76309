use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";

/// Persistent settings, stored as `config.json` in the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub base_dir: PathBuf,
    pub editor_path: Option<PathBuf>,
    pub global_venv_path: PathBuf,
    pub launchers_dir: PathBuf,
}

impl Config {
    pub fn defaults(data_dir: &Path) -> Self {
        Self {
            base_dir: data_dir.join("projects"),
            editor_path: None,
            global_venv_path: data_dir.join("global_venv"),
            launchers_dir: data_dir.join("_launchers"),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Where config, launchers and the shared environment live. `PORTABLE=1`
/// keeps everything next to the executable.
pub fn data_dir() -> Result<PathBuf> {
    if std::env::var("PORTABLE").is_ok_and(|v| is_truthy(&v)) {
        let exe = std::env::current_exe().context("could not locate the executable")?;
        return exe
            .parent()
            .map(Path::to_path_buf)
            .context("executable has no parent directory");
    }
    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join("lgm"));
    }
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(home.join(".lgm"))
}

pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Read the config, writing defaults when the file is missing or
    /// unreadable. Keys absent from the file (or null) take their defaults.
    pub fn load(&self) -> Result<Config> {
        let defaults = Config::defaults(&self.dir);
        let path = self.path();
        if !path.exists() {
            self.save(&defaults)?;
            return Ok(defaults);
        }

        let content =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        match merge_with_defaults(&content, &defaults) {
            Some(config) => Ok(config),
            None => {
                tracing::warn!(path = %path.display(), "config is not valid, rewriting with defaults");
                self.save(&defaults)?;
                Ok(defaults)
            }
        }
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let json = serde_json::to_string_pretty(config)?;
        let path = self.path();
        fs::write(&path, json + "\n").with_context(|| format!("failed to write {}", path.display()))
    }
}

fn merge_with_defaults(content: &str, defaults: &Config) -> Option<Config> {
    let stored: serde_json::Value = serde_json::from_str(content).ok()?;
    let stored = stored.as_object()?;
    let mut merged = serde_json::to_value(defaults).ok()?;
    let fields = merged.as_object_mut()?;
    for (key, value) in stored {
        if !value.is_null() && fields.contains_key(key) {
            fields.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(merged).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("data"));
        let config = store.load().unwrap();

        assert_eq!(config.base_dir, dir.path().join("data/projects"));
        assert_eq!(config.editor_path, None);
        assert_eq!(config.launchers_dir, dir.path().join("data/_launchers"));
        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.contains("\"editor_path\": null"));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        fs::write(
            store.path(),
            r#"{"base_dir": "/srv/repos", "launchers_dir": null, "extra": 1}"#,
        )
        .unwrap();

        let config = store.load().unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/srv/repos"));
        assert_eq!(config.launchers_dir, dir.path().join("_launchers"));
        assert_eq!(config.global_venv_path, dir.path().join("global_venv"));
    }

    #[test]
    fn corrupt_file_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        fs::write(store.path(), "{not json").unwrap();

        let config = store.load().unwrap();
        assert_eq!(config, Config::defaults(dir.path()));
        let reread: Config = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn non_object_and_wrong_types_count_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        fs::write(store.path(), "[1, 2]").unwrap();
        assert_eq!(store.load().unwrap(), Config::defaults(dir.path()));

        fs::write(store.path(), r#"{"base_dir": 42}"#).unwrap();
        assert_eq!(store.load().unwrap(), Config::defaults(dir.path()));
    }

    #[test]
    fn save_then_load_keeps_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        let mut config = store.load().unwrap();
        config.editor_path = Some(PathBuf::from("/usr/bin/code"));
        config.base_dir = dir.path().join("elsewhere");
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap(), config);
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" YES "));
        assert!(is_truthy("true"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn portable_uses_executable_dir() {
        temp_env::with_var("PORTABLE", Some("1"), || {
            let exe = std::env::current_exe().unwrap();
            assert_eq!(data_dir().unwrap(), exe.parent().unwrap());
        });
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn data_dir_follows_xdg_data_home() {
        let dir = tempfile::tempdir().unwrap();
        let xdg = dir.path().to_str().unwrap();
        temp_env::with_vars(
            [("PORTABLE", None), ("XDG_DATA_HOME", Some(xdg))],
            || {
                assert_eq!(data_dir().unwrap(), dir.path().join("lgm"));
            },
        );
    }
}
