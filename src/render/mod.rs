//! Circuit rendering through an external Python interpreter.
//!
//! A render walks `Idle -> Probing -> Executing -> Rendering -> Done | Failed`.
//! [`Renderer::render`] never returns an error: every failure becomes a
//! [`RenderOutcome::Failed`] with a diagnostic the user can act on.

pub mod harness;
pub mod prescan;

use crate::config::Config;
use crate::error::ProcessError;
use crate::probe::{Probe, ProbeOutcome, RENDER_REQUIREMENTS, install_hint};
use crate::process::{self, CommandSpec};
use harness::{HARNESS, HarnessReport};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RenderState {
    Idle,
    Probing,
    Executing,
    Rendering,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum FailureKind {
    InterpreterNotFound,
    MissingDependency,
    /// The user's own code raised; the diagnostic carries its traceback.
    UserCode,
    NoCircuit,
    Draw,
    Cancelled,
    /// The interpreter misbehaved: timeout, crash, unreadable report.
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub kind: FailureKind,
    pub diagnostic: String,
}

impl RenderFailure {
    fn new(kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self {
            kind,
            diagnostic: diagnostic.into(),
        }
    }
}

impl fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self.kind {
            FailureKind::InterpreterNotFound => "Python interpreter not found",
            FailureKind::MissingDependency => "Missing Python packages",
            FailureKind::UserCode => "Your code raised an error",
            FailureKind::NoCircuit => "No circuit found",
            FailureKind::Draw => "Could not draw the circuit",
            FailureKind::Cancelled => "Render cancelled",
            FailureKind::Process => "Render process failed",
        };
        write!(f, "{title}\n{}", self.diagnostic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Done {
        image_path: PathBuf,
        circuit_name: String,
    },
    Failed(RenderFailure),
}

impl RenderOutcome {
    fn failed(kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Self::Failed(RenderFailure::new(kind, diagnostic))
    }

    pub fn image_path(&self) -> Option<&Path> {
        match self {
            Self::Done { image_path, .. } => Some(image_path),
            Self::Failed(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Done { .. } => None,
            Self::Failed(failure) => Some(failure.kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub source_text: String,
    pub output_dir: PathBuf,
    pub working_dir: Option<PathBuf>,
    /// Draw this variable instead of the first circuit found.
    pub circuit: Option<String>,
}

impl RenderRequest {
    pub fn new(source_text: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_text: source_text.into(),
            output_dir: output_dir.into(),
            working_dir: None,
            circuit: None,
        }
    }
}

/// Picks one of several declared circuits. `None` means the user backed out.
pub trait CircuitSelector: Send + Sync {
    fn select(&self, names: &[String]) -> Option<String>;
}

pub struct Renderer {
    probe: Probe,
    timeout: Duration,
    selector: Option<Arc<dyn CircuitSelector>>,
}

impl Renderer {
    pub fn new(probe: Probe, timeout: Duration) -> Self {
        Self {
            probe,
            timeout,
            selector: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Probe::from_config(config),
            Duration::from_secs(config.render.timeout_secs),
        )
    }

    #[must_use]
    pub fn with_selector(mut self, selector: Arc<dyn CircuitSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub async fn render(&self, request: &RenderRequest, cancel: &CancellationToken) -> RenderOutcome {
        let outcome = self.run_states(request, cancel).await;
        match &outcome {
            RenderOutcome::Done { image_path, circuit_name } => {
                transition(RenderState::Done);
                tracing::info!(image = %image_path.display(), circuit = %circuit_name, "render finished");
            }
            RenderOutcome::Failed(failure) => {
                transition(RenderState::Failed);
                tracing::warn!(kind = %failure.kind, "render failed");
            }
        }
        outcome
    }

    async fn run_states(&self, request: &RenderRequest, cancel: &CancellationToken) -> RenderOutcome {
        transition(RenderState::Idle);

        let circuit = match &request.circuit {
            Some(name) => Some(name.clone()),
            None => match self.choose_circuit(&request.source_text).await {
                Ok(choice) => choice,
                Err(outcome) => return outcome,
            },
        };

        transition(RenderState::Probing);
        let interpreter = match self.probe.probe(cancel).await {
            Ok(ProbeOutcome::Satisfied(report)) => report.interpreter.program,
            Ok(outcome @ ProbeOutcome::Missing { .. }) => {
                return RenderOutcome::failed(FailureKind::MissingDependency, outcome.to_string());
            }
            Ok(outcome @ ProbeOutcome::InterpreterNotFound { .. }) => {
                return RenderOutcome::failed(
                    FailureKind::InterpreterNotFound,
                    format!("{outcome}. Install Python 3 or set interpreter.path in the config."),
                );
            }
            Err(crate::error::ProbeError::Process(e)) => return process_failure(&e),
            Err(e) => return RenderOutcome::failed(FailureKind::Process, e.to_string()),
        };

        // The child runs in `working_dir`, so it must get an absolute path.
        let output_dir = match std::path::absolute(&request.output_dir) {
            Ok(dir) => dir,
            Err(e) => {
                return RenderOutcome::failed(
                    FailureKind::Process,
                    format!("cannot resolve {}: {e}", request.output_dir.display()),
                );
            }
        };
        if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
            return RenderOutcome::failed(
                FailureKind::Process,
                format!("cannot create {}: {e}", output_dir.display()),
            );
        }
        let image_path = output_dir.join(image_file_name(chrono::Utc::now().timestamp_millis()));

        transition(RenderState::Executing);
        let mut spec = CommandSpec::new(&interpreter)
            .arg("-c")
            .arg(HARNESS)
            .arg(image_path.to_string_lossy())
            .stdin_text(request.source_text.clone())
            .env("MPLBACKEND", "Agg")
            .timeout(self.timeout);
        if let Some(name) = circuit {
            spec = spec.arg(name);
        }
        if let Some(dir) = &request.working_dir {
            spec = spec.current_dir(dir);
        }
        let output = match process::run(&spec, cancel).await {
            Ok(output) => output,
            Err(e) => return process_failure(&e),
        };

        transition(RenderState::Rendering);
        let report = match harness::parse_report(&output.stdout) {
            Some(Ok(report)) => report,
            Some(Err(e)) => {
                return RenderOutcome::failed(FailureKind::Process, format!("unreadable render report: {e}"));
            }
            None => {
                return RenderOutcome::failed(
                    FailureKind::Process,
                    format!(
                        "{interpreter} exited with {:?} before reporting a result\n{}",
                        output.exit_code,
                        output.stderr.trim()
                    ),
                );
            }
        };

        match report {
            HarnessReport::Done { image, circuit } => {
                let image = PathBuf::from(image);
                match tokio::fs::metadata(&image).await {
                    Ok(meta) if meta.len() > 0 => RenderOutcome::Done {
                        image_path: image,
                        circuit_name: circuit,
                    },
                    _ => RenderOutcome::failed(
                        FailureKind::Draw,
                        format!("{} is missing or empty after drawing", image.display()),
                    ),
                }
            }
            HarnessReport::UserError { detail } => {
                let printed = harness::user_output(&output.stdout);
                let diagnostic = if printed.trim().is_empty() {
                    detail
                } else {
                    format!("{detail}\nOutput before the error:\n{printed}")
                };
                RenderOutcome::failed(FailureKind::UserCode, diagnostic)
            }
            HarnessReport::NoCircuit { requested, names } => {
                RenderOutcome::failed(FailureKind::NoCircuit, no_circuit_diagnostic(requested.as_deref(), &names))
            }
            HarnessReport::DrawError { detail } => RenderOutcome::failed(FailureKind::Draw, detail),
            HarnessReport::MissingDependency { detail } => RenderOutcome::failed(
                FailureKind::MissingDependency,
                format!(
                    "{detail}\nInstall with: {}",
                    install_hint(&interpreter, RENDER_REQUIREMENTS)
                ),
            ),
        }
    }

    /// Ask the selector only when the source declares more than one circuit.
    async fn choose_circuit(&self, source: &str) -> Result<Option<String>, RenderOutcome> {
        let declared = prescan::circuit_declarations(source);
        let Some(selector) = self.selector.clone() else {
            return Ok(None);
        };
        if declared.len() < 2 {
            return Ok(None);
        }
        tracing::debug!(circuits = ?declared, "several circuits declared, asking");
        let choice = tokio::task::spawn_blocking(move || selector.select(&declared))
            .await
            .ok()
            .flatten();
        match choice {
            Some(name) => Ok(Some(name)),
            None => Err(RenderOutcome::failed(FailureKind::Cancelled, "no circuit was selected")),
        }
    }
}

fn transition(state: RenderState) {
    tracing::debug!(%state, "render state");
}

fn process_failure(error: &ProcessError) -> RenderOutcome {
    match error {
        ProcessError::Cancelled { .. } => RenderOutcome::failed(FailureKind::Cancelled, error.to_string()),
        _ => RenderOutcome::failed(FailureKind::Process, error.to_string()),
    }
}

/// `circuit_<epoch-ms>.png`
pub fn image_file_name(epoch_ms: i64) -> String {
    format!("circuit_{epoch_ms}.png")
}

fn no_circuit_diagnostic(requested: Option<&str>, names: &[(String, String)]) -> String {
    let mut out = match requested {
        Some(name) => format!("No QuantumCircuit named `{name}` was defined."),
        None => "No QuantumCircuit object was found after running the code.".to_string(),
    };
    if names.is_empty() {
        out.push_str("\nThe code defined no top-level names.");
    } else {
        out.push_str("\nTop-level names:");
        for (name, type_name) in names {
            out.push_str(&format!("\n  {name}: {type_name}"));
        }
    }
    out
}
