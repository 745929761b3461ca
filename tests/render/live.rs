//! Renders through a real interpreter. Each test returns early when no
//! Python with the render packages is available.

use qcompat::probe::{Probe, ProbeOutcome};
use qcompat::render::{FailureKind, RenderOutcome, RenderRequest, Renderer};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn candidates() -> Vec<String> {
    vec!["python3".into(), "python".into()]
}

async fn render_ready() -> bool {
    let probe = Probe::new(candidates(), Duration::from_secs(60));
    matches!(
        probe.probe(&CancellationToken::new()).await,
        Ok(ProbeOutcome::Satisfied(_))
    )
}

fn renderer() -> Renderer {
    Renderer::new(
        Probe::new(candidates(), Duration::from_secs(60)),
        Duration::from_secs(180),
    )
}

#[tokio::test]
async fn bell_circuit_renders_to_a_png() {
    if !render_ready().await {
        eprintln!("skipping: no Python with qiskit and matplotlib");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let source = "from qiskit import QuantumCircuit\nqc = QuantumCircuit(2)\nqc.h(0)\nqc.cx(0,1)";
    let request = RenderRequest::new(source, tmp.path().join("circuits"));

    let outcome = renderer().render(&request, &CancellationToken::new()).await;
    let RenderOutcome::Done { image_path, circuit_name } = outcome else {
        panic!("render failed: {outcome:?}");
    };
    assert_eq!(circuit_name, "qc");
    assert!(image_path.is_absolute());
    assert!(std::fs::metadata(&image_path).unwrap().len() > 0);
}

#[tokio::test]
async fn source_without_a_circuit_lists_its_names() {
    if !render_ready().await {
        eprintln!("skipping: no Python with qiskit and matplotlib");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let request = RenderRequest::new("shots = 1024\nlabel = 'bell'\n", tmp.path().join("circuits"));

    let RenderOutcome::Failed(failure) = renderer().render(&request, &CancellationToken::new()).await else {
        panic!("expected a failure");
    };
    assert_eq!(failure.kind, FailureKind::NoCircuit);
    assert!(failure.diagnostic.contains("shots: int"));
    assert!(failure.diagnostic.contains("label: str"));
}

#[tokio::test]
async fn user_exceptions_come_back_with_a_traceback() {
    if !render_ready().await {
        eprintln!("skipping: no Python with qiskit and matplotlib");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let request = RenderRequest::new("qc = QuantumCircuit(2)\nraise ValueError('bad angle')\n", tmp.path().join("circuits"));

    let RenderOutcome::Failed(failure) = renderer().render(&request, &CancellationToken::new()).await else {
        panic!("expected a failure");
    };
    assert_eq!(failure.kind, FailureKind::UserCode);
    assert!(failure.diagnostic.contains("Traceback"));
    assert!(failure.diagnostic.contains("ValueError: bad angle"));
}
