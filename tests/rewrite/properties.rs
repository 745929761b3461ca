use qcompat::rewrite::rewrite_text;
use qcompat::rewrite::rules::RuleId;

const LEGACY: &[&str] = &[
    "from qiskit import Aer\nsim = Aer.get_backend('qasm_simulator')\n",
    "from qiskit import QuantumCircuit, Aer, transpile\nqc = QuantumCircuit(1)\n",
    "from qiskit import Aer, QuantumCircuit\n",
    "from qiskit import QuantumCircuit, Aer\n",
    "from qiskit import BasicAer\nb = BasicAer.get_backend('qasm_simulator')\n",
    "from qiskit import QuantumCircuit, execute\nfrom qiskit_aer import Aer\nqc = QuantumCircuit(2)\nsim = Aer.get_backend('aer_simulator')\njob = execute(qc, sim, shots=500)\n",
    "from qiskit import QuantumCircuit, Aer, execute\nqc = QuantumCircuit(2)\nresult = execute(qc, Aer.get_backend('qasm_simulator'), shots=1000).result()\n",
    "import os\nfrom qiskit import (\n    QuantumCircuit,\n    Aer,\n)\n\nqc = QuantumCircuit(1)\n",
    "try:\n    from qiskit_aer import Aer\nexcept ImportError:\n    from qiskit import Aer\nsim = Aer.get_backend('aer_simulator')\n",
    "try:\n    from qiskit.providers.basic_provider import BasicProvider\nexcept ImportError:\n    from qiskit import BasicAer\n",
    "if legacy:\n    from qiskit import execute\njob = execute(qc, sim)\n",
];

/// Every line ending in `:` is followed by a more deeply indented line.
fn blocks_have_bodies(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let indent = |l: &str| l.len() - l.trim_start().len();
    lines.iter().enumerate().all(|(i, line)| {
        !line.trim_end().ends_with(':')
            || lines.get(i + 1).is_some_and(|next| indent(next) > indent(line))
    })
}

const CLEAN: &[&str] = &[
    "",
    "x = 1\n",
    "from qiskit import QuantumCircuit, transpile\nfrom qiskit_aer import Aer\n",
    "# from qiskit import Aer\nprint('from qiskit import Aer')\n",
    "s = \"\"\"\nexecute(qc, backend, shots=5)\n\"\"\"\n",
    "job.execute(qc, backend)\n",
    "from qiskit.providers.basic_provider import BasicProvider\n",
];

#[test]
fn rewriting_is_idempotent() {
    for text in LEGACY.iter().chain(CLEAN) {
        let once = rewrite_text(text);
        let twice = rewrite_text(&once.new_text);
        assert!(!twice.changed, "second pass changed:\n{}\n---\n{}", once.new_text, twice.new_text);
        assert_eq!(twice.new_text, once.new_text);
    }
}

#[test]
fn clean_text_is_returned_untouched() {
    for text in CLEAN {
        let result = rewrite_text(text);
        assert!(!result.changed, "changed clean text: {text:?}");
        assert_eq!(result.new_text, *text);
        assert!(result.applied_rules.is_empty());
    }
}

#[test]
fn every_legacy_sample_changes() {
    for text in LEGACY {
        assert!(rewrite_text(text).changed, "left legacy text alone: {text:?}");
    }
}

#[test]
fn mid_list_backend_is_imported_once_from_its_package() {
    let result = rewrite_text("from qiskit import QuantumCircuit, Aer, transpile\n");
    assert_eq!(result.new_text.matches("from qiskit_aer import Aer").count(), 1);
    assert!(result.new_text.contains("from qiskit import QuantumCircuit, transpile"));
    assert!(!result.new_text.contains(", Aer"));
    assert!(result.applied_rules.contains(&RuleId::BackendImport));
}

#[test]
fn execute_keeps_keyword_arguments() {
    let text = "from qiskit import execute\nexecute(qc, backend, shots=500)\n";
    let result = rewrite_text(text);
    assert!(result.new_text.contains("backend.run(transpile(qc, backend), shots=500)"));
    assert!(result.new_text.contains("from qiskit import transpile"));
    assert!(!result.new_text.contains("import execute"));
}

#[test]
fn nested_execute_with_backend_expression_is_rewritten() {
    let result = rewrite_text(LEGACY[6]);
    assert!(result.new_text.contains("from qiskit_aer import Aer"));
    assert!(result.new_text.contains(
        "Aer.get_backend('qasm_simulator').run(transpile(qc, Aer.get_backend('qasm_simulator')), shots=1000).result()"
    ));
}

#[test]
fn fallback_imports_keep_their_blocks_valid() {
    for text in LEGACY {
        let result = rewrite_text(text);
        assert!(blocks_have_bodies(&result.new_text), "emptied a block:\n{}", result.new_text);
    }

    let result = rewrite_text(LEGACY[8]);
    assert_eq!(
        result.new_text,
        "try:\n    from qiskit_aer import Aer\nexcept ImportError:\n    from qiskit_aer import Aer\nsim = Aer.get_backend('aer_simulator')\n"
    );
    assert!(rewrite_text(LEGACY[10]).new_text.contains("if legacy:\n    pass\n"));
}
