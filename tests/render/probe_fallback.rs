use super::fake_python::{calls, probe_json, script};
use qcompat::probe::{Probe, ProbeOutcome, SETUP_REQUIREMENTS};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn unresolvable_primary_falls_back_to_alternate() {
    let tmp = TempDir::new().unwrap();
    let alternate = script(tmp.path(), "python", &probe_json(&[]));
    let probe = Probe::new(
        vec![
            tmp.path().join("python3").to_string_lossy().into_owned(),
            alternate.to_string_lossy().into_owned(),
        ],
        Duration::from_secs(10),
    );

    let outcome = probe.probe(&CancellationToken::new()).await.unwrap();
    let ProbeOutcome::Satisfied(report) = outcome else {
        panic!("unexpected outcome: {outcome}");
    };
    assert_eq!(report.interpreter.program, alternate.to_string_lossy());
    assert_eq!(report.interpreter.version, "3.11.9");
    assert_eq!(calls(tmp.path(), "python"), 1);
}

#[tokio::test]
async fn started_interpreter_with_missing_modules_is_final() {
    let tmp = TempDir::new().unwrap();
    let primary = script(tmp.path(), "python3", &probe_json(&["matplotlib", "qiskit_aer"]));
    let alternate = script(tmp.path(), "python", &probe_json(&[]));
    let probe = Probe::new(
        vec![
            primary.to_string_lossy().into_owned(),
            alternate.to_string_lossy().into_owned(),
        ],
        Duration::from_secs(10),
    );

    let outcome = probe
        .probe_for(SETUP_REQUIREMENTS, &CancellationToken::new())
        .await
        .unwrap();
    let ProbeOutcome::Missing { missing, .. } = &outcome else {
        panic!("unexpected outcome: {outcome}");
    };
    let names: Vec<_> = missing.iter().map(|r| r.module).collect();
    assert_eq!(names, ["qiskit_aer", "matplotlib"]);
    assert!(outcome.to_string().contains("-m pip install 'qiskit-aer>=0.12.0' 'matplotlib>=3.7.0'"));
    assert_eq!(calls(tmp.path(), "python"), 0);
}

#[tokio::test]
async fn no_candidate_starts() {
    let tmp = TempDir::new().unwrap();
    let probe = Probe::new(
        vec![
            tmp.path().join("python3").to_string_lossy().into_owned(),
            tmp.path().join("python").to_string_lossy().into_owned(),
        ],
        Duration::from_secs(10),
    );
    let outcome = probe.probe(&CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, ProbeOutcome::InterpreterNotFound { ref tried } if tried.len() == 2));
    assert!(outcome.interpreter().is_none());
}
