//! `qcompat setup`: dependencies, config file, editor tasks, example file.

pub mod tasks;

use crate::config::Config;
use crate::probe::{Probe, ProbeOutcome, Requirement, SETUP_REQUIREMENTS, install_hint};
use crate::ui::style as ui;
use anyhow::{Context, Result, bail};
use dialoguer::Confirm;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const EXAMPLE_FILE: &str = "example_circuit.py";
const EXAMPLE_SOURCE: &str = include_str!("templates/example_circuit.py");

#[derive(Debug, Clone, Copy, Default)]
pub struct SetupOptions {
    /// Install without asking.
    pub yes: bool,
    pub skip_install: bool,
    pub no_tasks: bool,
    pub example: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    Present,
    Installed,
    /// Left missing: install skipped or declined.
    Missing,
}

#[derive(Debug)]
pub struct SetupReport {
    pub interpreter: String,
    pub dependencies: DependencyState,
    pub config_written: bool,
    pub tasks_file: Option<PathBuf>,
    pub example_file: Option<PathBuf>,
}

fn print_step(current: u8, total: u8, title: &str) {
    println!();
    println!("  {} {}", ui::accent(format!("[{current}/{total}]")), ui::header(title));
}

pub async fn run(config: &Config, options: SetupOptions, cancel: &CancellationToken) -> Result<SetupReport> {
    println!("{}", ui::rule());
    println!("{}", ui::header("qcompat setup"));
    println!("{}", ui::rule());

    print_step(1, 3, "Python dependencies");
    let probe = Probe::from_config(config);
    let (interpreter, dependencies) = ensure_dependencies(&probe, options, cancel).await?;

    print_step(2, 3, "Configuration");
    let config_written = if config.config_path.exists() {
        println!("  {} {}", ui::dim("kept"), ui::value(config.config_path.display()));
        false
    } else {
        config.save()?;
        println!("  {} wrote {}", ui::success("✓"), ui::value(config.config_path.display()));
        true
    };

    print_step(3, 3, "Editor tasks");
    let tasks_file = if options.no_tasks {
        println!("  {}", ui::dim("skipped (--no-tasks)"));
        None
    } else {
        let program = std::env::current_exe()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "qcompat".to_string());
        match tasks::install_tasks(&config.workspace_dir, &program) {
            Ok(path) => {
                println!("  {} wrote {}", ui::success("✓"), ui::value(path.display()));
                Some(path)
            }
            Err(e) => {
                tracing::warn!("tasks file not updated: {e:#}");
                println!("  {} {e:#}", ui::yellow("!"));
                None
            }
        }
    };

    let example_file = if options.example {
        let path = write_example(&config.workspace_dir)?;
        match &path {
            Some(p) => println!("\n  {} created {}", ui::success("✓"), ui::value(p.display())),
            None => println!("\n  {} {EXAMPLE_FILE} already exists", ui::dim("kept")),
        }
        path
    } else {
        None
    };

    println!();
    println!("{}", ui::rule());
    println!("{}", ui::success("Setup complete."));
    println!("  qcompat fix <file>     fix one file");
    println!("  qcompat scan           fix every file in the workspace once");
    println!("  qcompat serve          watch files and show notifications");
    println!("  qcompat render <file>  draw the circuit a file defines");

    Ok(SetupReport {
        interpreter,
        dependencies,
        config_written,
        tasks_file,
        example_file,
    })
}

async fn ensure_dependencies(
    probe: &Probe,
    options: SetupOptions,
    cancel: &CancellationToken,
) -> Result<(String, DependencyState)> {
    let outcome = probe.probe_for(SETUP_REQUIREMENTS, cancel).await?;
    let (report, missing) = match outcome {
        ProbeOutcome::Satisfied(report) => {
            println!(
                "  {} Python {} at {}",
                ui::success("✓"),
                report.interpreter.version,
                ui::value(&report.interpreter.executable)
            );
            for (req, status) in &report.modules {
                println!(
                    "  {} {} {}",
                    ui::success("✓"),
                    req.module,
                    ui::dim(status.version.as_deref().unwrap_or(""))
                );
            }
            return Ok((report.interpreter.program, DependencyState::Present));
        }
        ProbeOutcome::Missing { report, missing } => (report, missing),
        ProbeOutcome::InterpreterNotFound { tried } => {
            bail!(
                "No Python interpreter found (tried {}). Install Python 3 or set interpreter.path in {}",
                tried.join(", "),
                crate::config::STATE_DIR
            );
        }
    };

    let program = report.interpreter.program.clone();
    println!(
        "  {} Python {} at {}",
        ui::success("✓"),
        report.interpreter.version,
        ui::value(&report.interpreter.executable)
    );
    for req in &missing {
        println!("  {} {} is missing", ui::failure("✗"), req.module);
    }

    let hint = install_hint(&program, &missing);
    if options.skip_install {
        println!("  {} install later with: {}", ui::yellow("!"), ui::value(&hint));
        return Ok((program, DependencyState::Missing));
    }
    if !options.yes && !confirm_install(&hint)? {
        println!("  {} install later with: {}", ui::yellow("!"), ui::value(&hint));
        return Ok((program, DependencyState::Missing));
    }

    install(probe, &program, &missing, cancel).await?;
    match probe.probe_for(SETUP_REQUIREMENTS, cancel).await? {
        ProbeOutcome::Satisfied(_) => {
            println!("  {} dependencies installed", ui::success("✓"));
            Ok((program, DependencyState::Installed))
        }
        other => bail!("Dependencies still incomplete after install: {other}"),
    }
}

fn confirm_install(hint: &str) -> Result<bool> {
    if !console::user_attended() {
        return Ok(false);
    }
    Confirm::new()
        .with_prompt(format!("  Run `{hint}` now?"))
        .default(true)
        .interact()
        .context("Failed to read confirmation")
}

async fn install(probe: &Probe, program: &str, missing: &[Requirement], cancel: &CancellationToken) -> Result<()> {
    println!("  {} installing {} package(s)...", ui::accent("›"), missing.len());
    let output = probe.install(program, missing, cancel).await?;
    if !output.success {
        let tail: Vec<&str> = output.stderr.lines().rev().take(15).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        bail!(
            "pip exited with {:?}:\n{}",
            output.exit_code,
            tail.join("\n")
        );
    }
    Ok(())
}

/// Write the example file unless one is already there. Returns the path when
/// a file was created.
pub fn write_example(workspace: &Path) -> Result<Option<PathBuf>> {
    let path = workspace.join(EXAMPLE_FILE);
    if path.exists() {
        return Ok(None);
    }
    fs::write(&path, EXAMPLE_SOURCE).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::{rewrite_text, rules::RuleId};
    use tempfile::TempDir;

    #[test]
    fn example_is_written_once() {
        let tmp = TempDir::new().unwrap();
        let first = write_example(tmp.path()).unwrap();
        assert!(first.is_some());
        fs::write(tmp.path().join(EXAMPLE_FILE), "# edited\n").unwrap();
        assert!(write_example(tmp.path()).unwrap().is_none());
        assert_eq!(fs::read_to_string(tmp.path().join(EXAMPLE_FILE)).unwrap(), "# edited\n");
    }

    #[test]
    fn example_exercises_the_rewrite_rules() {
        let result = rewrite_text(EXAMPLE_SOURCE);
        assert!(result.changed);
        assert!(result.applied_rules.contains(&RuleId::BackendImport));
        assert!(result.applied_rules.contains(&RuleId::ExecuteCall));
        assert!(result.new_text.contains("from qiskit_aer import Aer"));
    }

    #[tokio::test]
    async fn missing_interpreter_fails_setup() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.workspace_dir = tmp.path().to_path_buf();
        config.config_path = tmp.path().join(".qcompat/config.toml");
        config.interpreter.candidates = vec!["qcompat-no-such-python".into()];

        let options = SetupOptions {
            skip_install: true,
            no_tasks: true,
            ..SetupOptions::default()
        };
        let err = run(&config, options, &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("No Python interpreter found"));
        assert!(!config.config_path.exists());
    }
}
