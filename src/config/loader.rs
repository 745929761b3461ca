use super::{Config, STATE_DIR};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.toml";

/// Workspace root: explicit flag, then `QCOMPAT_WORKSPACE`, then the editor's
/// `WORKSPACE_FOLDER`, then the current directory. Always absolute.
pub fn resolve_workspace(flag: Option<&Path>) -> Result<PathBuf> {
    let chosen = flag.map(Path::to_path_buf).or_else(|| {
        ["QCOMPAT_WORKSPACE", "WORKSPACE_FOLDER"].iter().find_map(|key| {
            std::env::var(key)
                .ok()
                .filter(|value| !value.is_empty())
                .map(|value| PathBuf::from(shellexpand::tilde(&value).into_owned()))
        })
    });
    match chosen {
        Some(dir) => std::path::absolute(&dir)
            .with_context(|| format!("Could not resolve workspace {}", dir.display())),
        None => std::env::current_dir().context("Could not determine current directory"),
    }
}

impl Config {
    /// Load `<workspace>/.qcompat/config.toml`, falling back to defaults when
    /// it does not exist. Nothing is written; `setup` persists the file.
    pub fn load(workspace: &Path) -> Result<Self> {
        let config_path = workspace.join(STATE_DIR).join(CONFIG_FILE);

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::Load(e.to_string()))
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Self::default()
        };

        config.workspace_dir = workspace.to_path_buf();
        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create .qcompat directory")?;
        }
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.clipboard.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "clipboard.interval_ms must be greater than zero".into(),
            ));
        }
        if self.notify.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "notify.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.notify.stale_after_ms <= 0 {
            return Err(ConfigError::Validation(
                "notify.stale_after_ms must be positive".into(),
            ));
        }
        if self.watch.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "watch.sweep_interval_secs must be greater than zero".into(),
            ));
        }
        if self.scan.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "scan.extensions must list at least one extension".into(),
            ));
        }
        Ok(())
    }

    /// Resolve a possibly relative, possibly `~`-prefixed path against the
    /// workspace.
    pub fn workspace_path(&self, raw: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if expanded.is_absolute() {
            expanded
        } else {
            self.workspace_dir.join(expanded)
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.workspace_dir.join(STATE_DIR)
    }

    pub fn slot_path(&self) -> PathBuf {
        self.workspace_path(&self.notify.slot_file)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.workspace_path(&self.render.output_dir)
    }

    pub fn history_path(&self) -> Result<PathBuf> {
        if let Some(raw) = &self.history.path {
            return Ok(self.workspace_path(raw));
        }
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(STATE_DIR).join("history.json"))
    }

    /// Interpreter candidates in resolution order: the configured path (with
    /// `~` expanded) first, then the configured names.
    pub fn interpreter_candidates(&self) -> Vec<String> {
        let mut candidates = Vec::with_capacity(self.interpreter.candidates.len() + 1);
        if let Some(path) = &self.interpreter.path
            && !path.trim().is_empty()
        {
            candidates.push(shellexpand::tilde(path.trim()).into_owned());
        }
        for name in &self.interpreter.candidates {
            if !candidates.contains(name) {
                candidates.push(name.clone());
            }
        }
        candidates
    }
}
