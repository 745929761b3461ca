mod env_overrides;
mod loader;
mod schema;
#[cfg(test)]
mod test_env;

pub use loader::resolve_workspace;
pub use schema::{
    ClipboardConfig, Config, HistoryConfig, InterpreterConfig, NotifyConfig, RenderConfig,
    ScanConfig, WatchConfig,
};

/// Directory (relative to the workspace) holding per-workspace state.
pub const STATE_DIR: &str = ".qcompat";
