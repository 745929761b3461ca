//! The Python side of a render and the report it prints.
//!
//! Invocation: `<python> -c HARNESS <output.png> [circuit-name]`, user source
//! on stdin. The last [`REPORT_MARKER`] on stdout carries a JSON
//! [`HarnessReport`] up to the end of its line; anything else on stdout is
//! the user's own output. The harness starts the report on a fresh line, but
//! output left unterminated by the user can still share a line with it.

use serde::Deserialize;

pub const REPORT_MARKER: &str = "QCOMPAT_RENDER:";

pub const HARNESS: &str = r#"
import json, os, sys, traceback
os.environ.setdefault("MPLBACKEND", "Agg")
MARK = "QCOMPAT_RENDER:"

def report(payload, code):
    sys.stdout.flush()
    sys.stdout.write("\n" + MARK + json.dumps(payload) + "\n")
    sys.stdout.flush()
    os._exit(code)

out_path = sys.argv[1]
wanted = sys.argv[2] if len(sys.argv) > 2 and sys.argv[2] else None
source = sys.stdin.read()

ns = {"__name__": "__main__", "__builtins__": __builtins__}
try:
    from qiskit import QuantumCircuit, QuantumRegister, ClassicalRegister, transpile
except Exception:
    report({"status": "missing_dependency", "detail": traceback.format_exc()}, 3)
ns.update(QuantumCircuit=QuantumCircuit, QuantumRegister=QuantumRegister,
          ClassicalRegister=ClassicalRegister, transpile=transpile)
for module in ("qiskit_aer", "qiskit.providers.aer", "qiskit"):
    try:
        ns["Aer"] = getattr(__import__(module, fromlist=["Aer"]), "Aer")
        break
    except Exception:
        continue
preset = set(ns)

try:
    exec(compile(source, "<circuit>", "exec"), ns)
except SystemExit:
    pass
except BaseException:
    report({"status": "user_error", "detail": traceback.format_exc()}, 1)

user_names = [n for n in ns if n not in preset and not n.startswith("__")]
found = [(n, ns[n]) for n in user_names if type(ns[n]) is QuantumCircuit]
if not found:
    for n in user_names:
        try:
            inner = getattr(ns[n], "circuit", None)
        except Exception:
            inner = None
        if isinstance(inner, QuantumCircuit):
            found.append((n, inner))

if wanted is not None:
    found = [(n, c) for n, c in found if n == wanted]

if not found:
    report({"status": "no_circuit", "requested": wanted,
            "names": [[n, type(ns[n]).__name__] for n in user_names]}, 4)

name, circuit = found[0]
try:
    import matplotlib
    matplotlib.use("Agg")
    figure = circuit.draw(output="mpl")
    figure.savefig(out_path, bbox_inches="tight")
except Exception:
    report({"status": "draw_error", "detail": traceback.format_exc()}, 2)

report({"status": "done", "image": os.path.abspath(out_path), "circuit": name}, 0)
"#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HarnessReport {
    Done {
        image: String,
        circuit: String,
    },
    UserError {
        detail: String,
    },
    NoCircuit {
        #[serde(default)]
        requested: Option<String>,
        names: Vec<(String, String)>,
    },
    DrawError {
        detail: String,
    },
    MissingDependency {
        detail: String,
    },
}

/// The harness report in `stdout`, if the harness got far enough to print one.
pub fn parse_report(stdout: &str) -> Option<Result<HarnessReport, serde_json::Error>> {
    let payload = stdout.lines().rev().find_map(|line| {
        line.rfind(REPORT_MARKER)
            .map(|at| &line[at + REPORT_MARKER.len()..])
    })?;
    Some(serde_json::from_str(payload.trim_end()))
}

/// Stdout with the report removed: what the user's code printed.
pub fn user_output(stdout: &str) -> String {
    stdout
        .lines()
        .map(|line| line.find(REPORT_MARKER).map_or(line, |at| &line[..at]))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
