#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Probe report with every render requirement importable except `missing`.
pub fn probe_json(missing: &[&str]) -> String {
    let modules = ["qiskit", "qiskit_aer", "matplotlib", "pylatexenc"]
        .iter()
        .map(|m| {
            if missing.contains(m) {
                format!(r#""{m}": {{"ok": false, "error": "ModuleNotFoundError: No module named '{m}'"}}"#)
            } else {
                format!(r#""{m}": {{"ok": true, "version": "1.0"}}"#)
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(r#"{{"executable": "/fake/bin/python", "version": "3.11.9", "modules": {{{modules}}}}}"#)
}

/// An executable shell script named `name` in `dir` that prints `stdout`
/// and logs each invocation to `<dir>/<name>.calls`.
pub fn script(dir: &Path, name: &str, stdout: &str) -> PathBuf {
    let path = dir.join(name);
    let body = format!(
        "#!/bin/sh\necho called >> \"{calls}\"\ncat <<'QCOMPAT_EOF'\n{stdout}\nQCOMPAT_EOF\n",
        calls = dir.join(format!("{name}.calls")).display()
    );
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn calls(dir: &Path, name: &str) -> usize {
    std::fs::read_to_string(dir.join(format!("{name}.calls")))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}
