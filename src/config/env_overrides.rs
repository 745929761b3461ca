use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(python) = std::env::var("QCOMPAT_PYTHON")
            && !python.is_empty()
        {
            self.interpreter.path = Some(python);
        }

        if let Ok(dir) = std::env::var("QCOMPAT_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.render.output_dir = dir;
        }

        if let Ok(ms) = std::env::var("QCOMPAT_CLIPBOARD_INTERVAL_MS")
            && let Ok(ms) = ms.parse::<u64>()
            && ms > 0
        {
            self.clipboard.interval_ms = ms;
        }
    }
}
