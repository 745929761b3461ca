use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Workspace root - resolved at load time, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from the workspace, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub interpreter: InterpreterConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub clipboard: ClipboardConfig,

    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

// ── Interpreter ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Explicit interpreter path; `~` is expanded. Tried before `candidates`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,
}

fn default_candidates() -> Vec<String> {
    vec!["python3".into(), "python".into()]
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_install_timeout_secs() -> u64 {
    600
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            path: None,
            candidates: default_candidates(),
            probe_timeout_secs: default_probe_timeout_secs(),
            install_timeout_secs: default_install_timeout_secs(),
        }
    }
}

// ── Scan ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names skipped in addition to hidden ones.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// Files larger than this are never read.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_extensions() -> Vec<String> {
    vec!["py".into()]
}

fn default_exclude_dirs() -> Vec<String> {
    vec![
        "venv".into(),
        "node_modules".into(),
        "__pycache__".into(),
    ]
}

fn default_max_file_bytes() -> u64 {
    2 * 1024 * 1024
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

// ── File watch ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiescence window: a path is processed once no event arrived for it
    /// within this many milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ── Clipboard ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardConfig {
    #[serde(default = "default_clipboard_interval_ms")]
    pub interval_ms: u64,
}

fn default_clipboard_interval_ms() -> u64 {
    1000
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_clipboard_interval_ms(),
        }
    }
}

// ── Render ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Relative paths are resolved against the workspace.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_render_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_output_dir() -> String {
    "circuits".into()
}

fn default_render_timeout_secs() -> u64 {
    120
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            timeout_secs: default_render_timeout_secs(),
        }
    }
}

// ── Notifications ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: i64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Slot file for detached watchers, relative to the workspace.
    #[serde(default = "default_slot_file")]
    pub slot_file: String,
}

fn default_stale_after_ms() -> i64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_slot_file() -> String {
    ".qcompat/notification.json".into()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            stale_after_ms: default_stale_after_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            slot_file: default_slot_file(),
        }
    }
}

// ── History ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Defaults to `~/.qcompat/history.json`.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    500
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            max_entries: default_max_entries(),
        }
    }
}
