use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `qcompat`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; command handlers continue to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum CompatError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── External processes ──────────────────────────────────────────────
    #[error("process: {0}")]
    Process(#[from] ProcessError),

    // ── Dependency probe ────────────────────────────────────────────────
    #[error("probe: {0}")]
    Probe(#[from] ProbeError),

    // ── Watchers ────────────────────────────────────────────────────────
    #[error("watch: {0}")]
    Watch(#[from] WatchError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Process errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all. Callers resolving an
    /// interpreter move on to the next candidate on this variant only.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s and was killed")]
    TimedOut { program: String, secs: u64 },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("io while talking to {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

// ─── Probe errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("interpreter {interpreter} produced no probe report (exit {exit_code:?}): {stderr}")]
    NoReport {
        interpreter: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("malformed probe report: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

// ─── Watch errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("file watcher failed: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to launch {mode} watcher: {source}")]
    Launch {
        mode: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for library-level results.
pub type Result<T> = std::result::Result<T, CompatError>;
