use crate::config::Config;
use crate::history::History;
use crate::probe::{Probe, ProbeOutcome, RENDER_REQUIREMENTS, install_hint};
use crate::relay::{Notification, now_ms};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub async fn run(config: &Config, cancel: &CancellationToken) -> Result<()> {
    println!("🩺 qcompat Doctor");
    println!("  Workspace: {}", config.workspace_dir.display());

    println!("  Python:");
    for line in candidate_lines(&config.interpreter_candidates()) {
        println!("    {line}");
    }
    let outcome = match Probe::from_config(config).probe(cancel).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            println!("    ❌ probe failed: {e}");
            None
        }
    };
    if let Some(outcome) = &outcome {
        for line in interpreter_lines(outcome) {
            println!("    {line}");
        }
    }

    println!("  Workspace state:");
    for line in workspace_lines(config) {
        println!("    {line}");
    }

    println!("  Notifications:");
    for line in notification_lines(&config.slot_path(), now_ms(), config.notify.stale_after_ms) {
        println!("    {line}");
    }

    if config.history.enabled {
        println!("  History:");
        for line in history_lines(config) {
            println!("    {line}");
        }
    }

    Ok(())
}

/// Where each candidate resolves on `PATH`, in resolution order.
fn candidate_lines(candidates: &[String]) -> Vec<String> {
    candidates
        .iter()
        .map(|candidate| match which::which(candidate) {
            Ok(path) => format!("ℹ️ {candidate} → {}", path.display()),
            Err(_) => format!("ℹ️ {candidate} not found"),
        })
        .collect()
}

fn interpreter_lines(outcome: &ProbeOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        ProbeOutcome::InterpreterNotFound { tried } => {
            lines.push(format!("❌ no interpreter found (tried {})", tried.join(", ")));
            lines.push("💡 install Python 3 or set interpreter.path in .qcompat/config.toml".into());
        }
        ProbeOutcome::Satisfied(report) | ProbeOutcome::Missing { report, .. } => {
            lines.push(format!(
                "✅ {} → Python {} ({})",
                report.interpreter.program, report.interpreter.version, report.interpreter.executable
            ));
            for (req, status) in &report.modules {
                if status.ok {
                    lines.push(format!(
                        "✅ {} {}",
                        req.module,
                        status.version.as_deref().unwrap_or("(version unknown)")
                    ));
                } else {
                    lines.push(format!(
                        "❌ {} missing ({})",
                        req.module,
                        status.error.as_deref().unwrap_or("import failed")
                    ));
                }
            }
            let missing = report.missing();
            if !missing.is_empty() {
                lines.push(format!(
                    "💡 {}",
                    install_hint(&report.interpreter.program, &missing)
                ));
            }
        }
    }
    lines
}

fn workspace_lines(config: &Config) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if config.config_path.exists() {
        lines.push(format!("✅ config: {}", config.config_path.display()));
    } else {
        lines.push(format!(
            "ℹ️ no config file at {} (defaults in use, non-fatal)",
            config.config_path.display()
        ));
    }

    let output = config.output_dir();
    if output.is_dir() {
        let images = std::fs::read_dir(&output)
            .map(|entries| {
                entries
                    .filter_map(std::result::Result::ok)
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".png"))
                    .count()
            })
            .unwrap_or(0);
        lines.push(format!("✅ render output: {} ({images} image(s))", output.display()));
    } else {
        lines.push(format!("ℹ️ render output {} not created yet", output.display()));
    }

    let requirements = RENDER_REQUIREMENTS
        .iter()
        .map(|r| r.module)
        .collect::<Vec<_>>()
        .join(", ");
    lines.push(format!("ℹ️ render needs: {requirements}"));
    lines
}

fn notification_lines(slot: &Path, now_ms: i64, stale_after_ms: i64) -> Vec<String> {
    let Ok(raw) = std::fs::read_to_string(slot) else {
        return vec![format!("ℹ️ no notification record at {}", slot.display())];
    };
    let notification: Notification = match serde_json::from_str(&raw) {
        Ok(n) => n,
        Err(e) => return vec![format!("❌ malformed notification record {}: {e}", slot.display())],
    };

    let age = now_ms - notification.timestamp_ms;
    let freshness = if notification.is_stale(now_ms, stale_after_ms) {
        format!("stale ({}s ago)", age / 1000)
    } else {
        format!("fresh ({age}ms ago)")
    };
    vec![format!("✅ last: \"{}\" {freshness}", notification.message)]
}

fn history_lines(config: &Config) -> Vec<String> {
    let Ok(path) = config.history_path() else {
        return vec!["❌ history path unavailable (no home directory)".into()];
    };
    let history = History::new(path, config.history.max_entries);
    let records = history.load();
    let latest: Option<DateTime<Utc>> = records.values().flatten().map(|r| r.at).max();
    match latest {
        Some(at) => vec![format!(
            "✅ {} file(s) fixed, most recently {}",
            records.len(),
            at.format("%Y-%m-%d %H:%M:%S UTC")
        )],
        None => vec![format!("ℹ️ nothing recorded yet ({})", history.path().display())],
    }
}
