//! Dependency probe.
//!
//! One throwaway interpreter invocation imports every required module and
//! prints a JSON report, so a single run lists everything that is missing.

use crate::config::Config;
use crate::error::{ProbeError, ProcessError};
use crate::process::{self, CommandSpec, Launch};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A Python module the render pipeline needs, and the pip requirement that
/// provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    pub module: &'static str,
    pub pip: &'static str,
}

const QISKIT: Requirement = Requirement {
    module: "qiskit",
    pip: "qiskit>=1.0.0",
};
const QISKIT_AER: Requirement = Requirement {
    module: "qiskit_aer",
    pip: "qiskit-aer>=0.12.0",
};
const MATPLOTLIB: Requirement = Requirement {
    module: "matplotlib",
    pip: "matplotlib>=3.7.0",
};
/// The circuit drawer's `mpl` output refuses to run without it.
const PYLATEXENC: Requirement = Requirement {
    module: "pylatexenc",
    pip: "pylatexenc>=2.10",
};

/// What a render needs. The dedicated simulator package is optional there:
/// the harness falls back to the older locations of `Aer`.
pub const RENDER_REQUIREMENTS: &[Requirement] = &[QISKIT, MATPLOTLIB, PYLATEXENC];

/// What `setup` installs.
pub const SETUP_REQUIREMENTS: &[Requirement] = &[QISKIT, QISKIT_AER, MATPLOTLIB, PYLATEXENC];

const PROBE_SCRIPT: &str = r#"
import importlib, json, sys
mods = {}
for name in sys.argv[1:]:
    try:
        m = importlib.import_module(name)
        mods[name] = {"ok": True, "version": getattr(m, "__version__", None), "error": None}
    except Exception as exc:
        mods[name] = {"ok": False, "version": None, "error": "%s: %s" % (type(exc).__name__, exc)}
print(json.dumps({"executable": sys.executable, "version": sys.version.split()[0], "modules": mods}))
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleStatus {
    pub ok: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawReport {
    executable: String,
    version: String,
    modules: BTreeMap<String, ModuleStatus>,
}

/// The interpreter that answered the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    /// Candidate as configured (`python3`, `/opt/py/bin/python`).
    pub program: String,
    /// `sys.executable` as reported by the interpreter itself.
    pub executable: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub interpreter: Interpreter,
    /// In requirement order.
    pub modules: Vec<(Requirement, ModuleStatus)>,
}

impl ProbeReport {
    pub fn missing(&self) -> Vec<Requirement> {
        self.modules
            .iter()
            .filter(|(_, status)| !status.ok)
            .map(|(req, _)| *req)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Satisfied(ProbeReport),
    Missing {
        report: ProbeReport,
        missing: Vec<Requirement>,
    },
    InterpreterNotFound {
        tried: Vec<String>,
    },
}

impl ProbeOutcome {
    pub fn interpreter(&self) -> Option<&Interpreter> {
        match self {
            Self::Satisfied(report) | Self::Missing { report, .. } => Some(&report.interpreter),
            Self::InterpreterNotFound { .. } => None,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied(report) => write!(
                f,
                "all dependencies present (Python {} at {})",
                report.interpreter.version, report.interpreter.executable
            ),
            Self::Missing { report, missing } => write!(
                f,
                "missing {}; install with: {}",
                missing
                    .iter()
                    .map(|r| r.module)
                    .collect::<Vec<_>>()
                    .join(", "),
                install_hint(&report.interpreter.program, missing)
            ),
            Self::InterpreterNotFound { tried } => {
                write!(f, "no Python interpreter found (tried {})", tried.join(", "))
            }
        }
    }
}

pub struct Probe {
    candidates: Vec<String>,
    timeout: Duration,
    install_timeout: Duration,
}

impl Probe {
    pub fn new(candidates: Vec<String>, timeout: Duration) -> Self {
        Self {
            candidates,
            timeout,
            install_timeout: Duration::from_secs(600),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            candidates: config.interpreter_candidates(),
            timeout: Duration::from_secs(config.interpreter.probe_timeout_secs),
            install_timeout: Duration::from_secs(config.interpreter.install_timeout_secs),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub async fn probe(&self, cancel: &CancellationToken) -> Result<ProbeOutcome, ProbeError> {
        self.probe_for(RENDER_REQUIREMENTS, cancel).await
    }

    pub async fn probe_for(
        &self,
        requirements: &[Requirement],
        cancel: &CancellationToken,
    ) -> Result<ProbeOutcome, ProbeError> {
        let launch = process::run_first_available(&self.candidates, cancel, |program| {
            CommandSpec::new(program)
                .arg("-c")
                .arg(PROBE_SCRIPT)
                .args(requirements.iter().map(|r| r.module))
                .env("MPLBACKEND", "Agg")
                .timeout(self.timeout)
        })
        .await?;

        let (program, output) = match launch {
            Launch::Ran { program, output } => (program, output),
            Launch::NoneStarted { tried } => {
                tracing::warn!(tried = ?tried, "no interpreter could be started");
                return Ok(ProbeOutcome::InterpreterNotFound { tried });
            }
        };

        let Some(line) = output
            .stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
        else {
            return Err(ProbeError::NoReport {
                interpreter: program,
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        };
        let raw: RawReport = serde_json::from_str(line.trim())?;

        let modules = requirements
            .iter()
            .map(|req| {
                let status = raw.modules.get(req.module).cloned().unwrap_or_else(|| ModuleStatus {
                    ok: false,
                    version: None,
                    error: Some("not reported".into()),
                });
                (*req, status)
            })
            .collect();
        let report = ProbeReport {
            interpreter: Interpreter {
                program,
                executable: raw.executable,
                version: raw.version,
            },
            modules,
        };

        let missing = report.missing();
        tracing::info!(
            interpreter = %report.interpreter.program,
            missing = missing.len(),
            "dependency probe finished"
        );
        if missing.is_empty() {
            Ok(ProbeOutcome::Satisfied(report))
        } else {
            Ok(ProbeOutcome::Missing { report, missing })
        }
    }

    /// Run `<interpreter> -m pip install ...`, streaming nothing; the caller
    /// reports the captured output.
    pub async fn install(
        &self,
        interpreter: &str,
        requirements: &[Requirement],
        cancel: &CancellationToken,
    ) -> Result<process::ProcessOutput, ProcessError> {
        let spec = install_command(interpreter, requirements).timeout(self.install_timeout);
        tracing::info!(command = %spec.display(), "installing dependencies");
        process::run(&spec, cancel).await
    }
}

pub fn install_command(interpreter: &str, requirements: &[Requirement]) -> CommandSpec {
    CommandSpec::new(interpreter)
        .args(["-m", "pip", "install"])
        .args(requirements.iter().map(|r| r.pip))
}

/// Copy-pasteable install command, with version specifiers quoted.
pub fn install_hint(interpreter: &str, requirements: &[Requirement]) -> String {
    let packages = requirements
        .iter()
        .map(|r| format!("'{}'", r.pip))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{interpreter} -m pip install {packages}")
}
