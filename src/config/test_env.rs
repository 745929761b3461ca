//! Environment control for config tests. Every test that touches a variable
//! the config layer reads goes through [`ScopedEnv`], which holds one
//! process-wide lock for its lifetime.

use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Variables read by `resolve_workspace` and
/// `Config::apply_env_overrides`.
const CONFIG_VARS: &[&str] = &[
    "QCOMPAT_PYTHON",
    "QCOMPAT_OUTPUT_DIR",
    "QCOMPAT_CLIPBOARD_INTERVAL_MS",
    "QCOMPAT_WORKSPACE",
    "WORKSPACE_FOLDER",
];

/// Config variables cleared for the duration of a test, then restored.
pub(crate) struct ScopedEnv {
    saved: Vec<(&'static str, Option<String>)>,
    _lock: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    pub(crate) fn clean() -> Self {
        let lock = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let saved = CONFIG_VARS
            .iter()
            .map(|&key| (key, std::env::var(key).ok()))
            .collect();
        for key in CONFIG_VARS {
            // SAFETY: ENV_LOCK is held, so no other test mutates the
            // environment concurrently.
            unsafe { std::env::remove_var(key) };
        }
        Self { saved, _lock: lock }
    }

    pub(crate) fn set(&mut self, key: &'static str, value: &str) -> &mut Self {
        assert!(CONFIG_VARS.contains(&key), "{key} is not restored by ScopedEnv");
        // SAFETY: as in `clean`.
        unsafe { std::env::set_var(key, value) };
        self
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in &self.saved {
            // SAFETY: the lock field is dropped after this body runs.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }
}
