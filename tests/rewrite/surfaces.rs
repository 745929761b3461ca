use qcompat::config::ScanConfig;
use qcompat::relay::{NotificationSink, Relay};
use qcompat::surface::clipboard::{ClipboardAccess, ClipboardContent, ClipboardWatcher};
use qcompat::surface::{FixOptions, FixOutcome, manual, scan};
use qcompat::error::WatchError;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

#[test]
fn manual_fix_reports_three_outcomes() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "legacy.py", "from qiskit import Aer\n");
    write(tmp.path(), "modern.py", "from qiskit_aer import Aer\n");
    write(tmp.path(), "other.py", "print('hello')\n");
    let options = FixOptions::default();

    let legacy = manual::fix_file(&tmp.path().join("legacy.py"), &options).unwrap();
    assert!(legacy.is_fixed());
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("legacy.py")).unwrap(),
        "from qiskit_aer import Aer\n"
    );
    assert_eq!(
        manual::fix_file(&tmp.path().join("modern.py"), &options).unwrap(),
        FixOutcome::AlreadyCompatible
    );
    assert_eq!(
        manual::fix_file(&tmp.path().join("other.py"), &options).unwrap(),
        FixOutcome::NoRelevantCode
    );
}

#[test]
fn scan_counts_fixed_files_and_skips_excluded_dirs() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.py", "from qiskit import Aer\n");
    write(tmp.path(), "pkg/b.py", "from qiskit import execute\nexecute(qc, sim)\n");
    write(tmp.path(), "pkg/c.py", "from qiskit import QuantumCircuit\n");
    write(tmp.path(), "venv/lib/d.py", "from qiskit import Aer\n");
    write(tmp.path(), "notes.txt", "from qiskit import Aer\n");

    let report = scan::scan_workspace(tmp.path(), &ScanConfig::default(), &FixOptions::default());
    assert_eq!(report.summary(), "Fixed 2 files");
    assert_eq!(report.scanned, 3);
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("venv/lib/d.py")).unwrap(),
        "from qiskit import Aer\n"
    );

    let again = scan::scan_workspace(tmp.path(), &ScanConfig::default(), &FixOptions::default());
    assert_eq!(again.summary(), "Fixed 0 files");
}

#[test]
fn dry_run_scan_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.py", "from qiskit import Aer\n");
    let options = FixOptions {
        dry_run: true,
        ..FixOptions::default()
    };
    let report = scan::scan_workspace(tmp.path(), &ScanConfig::default(), &options);
    assert_eq!(report.summary(), "Would fix 1 file");
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("a.py")).unwrap(),
        "from qiskit import Aer\n"
    );
}

/// A clipboard that holds an image until the test puts text on it.
struct ScriptedClipboard {
    reads: Vec<ClipboardContent>,
    written: Vec<String>,
}

impl ClipboardAccess for ScriptedClipboard {
    fn read(&mut self) -> Result<ClipboardContent, WatchError> {
        if let Some(last) = self.written.last() {
            return Ok(ClipboardContent::Text(last.clone()));
        }
        Ok(if self.reads.len() > 1 {
            self.reads.remove(0)
        } else {
            self.reads[0].clone()
        })
    }

    fn write(&mut self, text: &str) -> Result<(), WatchError> {
        self.written.push(text.to_string());
        Ok(())
    }
}

#[test]
fn clipboard_skips_images_then_fixes_text_once() {
    let clipboard = ScriptedClipboard {
        reads: vec![
            ClipboardContent::NotText,
            ClipboardContent::NotText,
            ClipboardContent::Text("from qiskit import execute\nexecute(qc, b, shots=3)\n".into()),
        ],
        written: Vec::new(),
    };
    let relay = Relay::new();
    let mut watcher = ClipboardWatcher::new(clipboard, Arc::new(relay.clone()) as Arc<dyn NotificationSink>);
    watcher.prime();

    assert!(!watcher.tick().unwrap());
    assert!(watcher.tick().unwrap());
    assert!(!watcher.tick().unwrap());
    let note = relay.latest().unwrap();
    assert!(note.message.starts_with("Fixed Qiskit code in clipboard"));
}
