use super::manual::apply_to_file;
use super::{FixOptions, FixOutcome};
use crate::config::ScanConfig;
use crate::rewrite::rules::RuleId;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct ScanReport {
    pub scanned: usize,
    pub fixed: Vec<(PathBuf, Vec<RuleId>)>,
    pub failed: Vec<(PathBuf, String)>,
    pub dry_run: bool,
}

impl ScanReport {
    pub fn summary(&self) -> String {
        let n = self.fixed.len();
        let files = if n == 1 { "file" } else { "files" };
        if self.dry_run {
            format!("Would fix {n} {files}")
        } else {
            format!("Fixed {n} {files}")
        }
    }
}

/// True when a directory entry named `name` must not be descended into.
fn skip_dir(name: &str, config: &ScanConfig) -> bool {
    name.starts_with('.') || config.exclude_dirs.iter().any(|d| d == name)
}

pub fn has_scanned_extension(path: &Path, config: &ScanConfig) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|x| x == ext))
}

/// True when `path` (somewhere below `root`) would be visited by a scan.
pub fn is_candidate(root: &Path, path: &Path, config: &ScanConfig) -> bool {
    if !has_scanned_extension(path, config) {
        return false;
    }
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    let mut components: Vec<_> = relative.components().collect();
    components.pop();
    !components
        .iter()
        .any(|c| c.as_os_str().to_str().is_none_or(|name| skip_dir(name, config)))
}

/// Every matching file below `root`, in a stable order.
pub fn collect_files(root: &Path, config: &ScanConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), "skipping unreadable directory: {e}");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                let name = entry.file_name();
                if name.to_str().is_some_and(|n| !skip_dir(n, config)) {
                    stack.push(path);
                }
            } else if file_type.is_file()
                && has_scanned_extension(&path, config)
                && entry
                    .metadata()
                    .is_ok_and(|m| m.len() <= config.max_file_bytes)
            {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

/// Apply the engine to every matching file once. Per-file failures are
/// collected, never fatal.
pub fn scan_workspace(root: &Path, config: &ScanConfig, options: &FixOptions) -> ScanReport {
    let mut report = ScanReport {
        dry_run: options.dry_run,
        ..ScanReport::default()
    };
    for path in collect_files(root, config) {
        report.scanned += 1;
        match apply_to_file(&path, options) {
            Ok(fix) => {
                if let FixOutcome::Fixed { rules, .. } = fix.outcome {
                    report.fixed.push((path, rules));
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "scan failed for file: {e:#}");
                report.failed.push((path, format!("{e:#}")));
            }
        }
    }
    tracing::info!(
        scanned = report.scanned,
        fixed = report.fixed.len(),
        failed = report.failed.len(),
        "workspace scan finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LEGACY: &str = "from qiskit import Aer\n";

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn skips_hidden_and_excluded_directories() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "a.py", LEGACY);
        write(root, "pkg/b.py", LEGACY);
        write(root, "pkg/notes.txt", LEGACY);
        write(root, ".git/hooks/c.py", LEGACY);
        write(root, "venv/lib/d.py", LEGACY);
        write(root, "node_modules/e.py", LEGACY);

        let files = collect_files(root, &ScanConfig::default());
        assert_eq!(files, vec![root.join("a.py"), root.join("pkg").join("b.py")]);
    }

    #[test]
    fn scan_fixes_and_counts() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let a = write(root, "a.py", LEGACY);
        write(root, "b.py", "from qiskit_aer import Aer\n");
        write(root, "c.py", "print('hi')\n");

        let report = scan_workspace(root, &ScanConfig::default(), &FixOptions::default());
        assert_eq!(report.scanned, 3);
        assert_eq!(report.fixed.len(), 1);
        assert_eq!(report.summary(), "Fixed 1 file");
        assert_eq!(std::fs::read_to_string(a).unwrap(), "from qiskit_aer import Aer\n");

        let again = scan_workspace(root, &ScanConfig::default(), &FixOptions::default());
        assert_eq!(again.summary(), "Fixed 0 files");
    }

    #[test]
    fn dry_run_scan_reports_without_writing() {
        let tmp = TempDir::new().unwrap();
        let a = write(tmp.path(), "a.py", LEGACY);
        let options = FixOptions {
            dry_run: true,
            ..FixOptions::default()
        };
        let report = scan_workspace(tmp.path(), &ScanConfig::default(), &options);
        assert_eq!(report.summary(), "Would fix 1 file");
        assert_eq!(std::fs::read_to_string(a).unwrap(), LEGACY);
    }

    #[test]
    fn candidate_check_mirrors_the_walk() {
        let root = Path::new("/ws");
        let config = ScanConfig::default();
        assert!(is_candidate(root, Path::new("/ws/src/a.py"), &config));
        assert!(!is_candidate(root, Path::new("/ws/.venv/a.py"), &config));
        assert!(!is_candidate(root, Path::new("/ws/__pycache__/a.py"), &config));
        assert!(!is_candidate(root, Path::new("/ws/src/a.txt"), &config));
        assert!(!is_candidate(root, Path::new("/elsewhere/a.py"), &config));
    }
}
