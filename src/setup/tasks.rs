//! Editor task definitions in `.vscode/tasks.json`.

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

pub const TASKS_FILE: &str = ".vscode/tasks.json";

fn shared_presentation() -> Value {
    json!({ "reveal": "always", "panel": "shared", "showReuseMessage": false })
}

fn build_group() -> Value {
    json!({ "kind": "build", "isDefault": false })
}

fn task(label: &str, program: &str, args: &[&str]) -> Value {
    json!({
        "label": label,
        "type": "shell",
        "command": program,
        "args": args,
        "presentation": shared_presentation(),
        "problemMatcher": [],
        "group": build_group(),
    })
}

/// Our tasks, invoking `program` (this executable).
pub fn qcompat_tasks(program: &str) -> Vec<Value> {
    let watcher = json!({
        "label": "Start Qiskit Compatibility Watcher",
        "type": "shell",
        "command": program,
        "args": ["serve"],
        "isBackground": true,
        "presentation": {
            "reveal": "never",
            "panel": "dedicated",
            "showReuseMessage": false,
            "close": true
        },
        "problemMatcher": [],
        "runOptions": { "runOn": "folderOpen" },
        "group": { "kind": "build", "isDefault": true },
    });

    let mut clipboard = task("Start Qiskit Clipboard Monitor", program, &["serve", "--no-files", "--clipboard"]);
    clipboard["isBackground"] = json!(true);
    clipboard["presentation"]["panel"] = json!("dedicated");

    vec![
        watcher,
        task("Run Qiskit Watcher Once", program, &["scan"]),
        task("Fix Current Qiskit File", program, &["fix", "${file}"]),
        clipboard,
        task("Render Qiskit Circuit", program, &["render", "${file}"]),
        task("Setup Qiskit Tools", program, &["setup"]),
    ]
}

/// Merge `ours` into an existing tasks document: tasks whose label matches
/// one of ours are replaced, everything else is kept in place.
pub fn merge_tasks(existing: Option<Value>, ours: Vec<Value>) -> Result<Value> {
    let mut document = match existing {
        Some(Value::Object(map)) => Value::Object(map),
        Some(_) => bail!("tasks file is not a JSON object"),
        None => json!({ "version": "2.0.0" }),
    };

    let labels: Vec<&str> = ours.iter().filter_map(|t| t["label"].as_str()).collect();
    let mut tasks: Vec<Value> = match document.get("tasks") {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|t| t.get("label").and_then(Value::as_str).is_none_or(|l| !labels.contains(&l)))
            .cloned()
            .collect(),
        Some(_) => bail!("`tasks` is not an array"),
        None => Vec::new(),
    };
    tasks.extend(ours);
    document["tasks"] = Value::Array(tasks);
    Ok(document)
}

/// Write the merged tasks file under `workspace`. A file that cannot be
/// parsed (comments are common in hand-edited task files) is left untouched.
pub fn install_tasks(workspace: &Path, program: &str) -> Result<std::path::PathBuf> {
    let path = workspace.join(TASKS_FILE);
    let existing = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed: Value = serde_json::from_str(&raw).with_context(|| {
            format!("{} is not plain JSON; add the qcompat tasks by hand", path.display())
        })?;
        Some(parsed)
    } else {
        None
    };

    let merged = merge_tasks(existing, qcompat_tasks(program))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create .vscode directory")?;
    }
    fs::write(&path, serde_json::to_string_pretty(&merged)? + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
