//! Finds circuit declarations before any code runs.

use crate::rewrite::scanner::{Source, TokenKind};

const CIRCUIT_CLASS: &str = "QuantumCircuit";

/// Names bound at module level by `name = QuantumCircuit(...)` (or a dotted
/// `qiskit.QuantumCircuit(...)`), in declaration order, without duplicates.
pub fn circuit_declarations(text: &str) -> Vec<String> {
    let source = Source::scan(text);
    let mut names: Vec<String> = Vec::new();

    for statement in source.statements() {
        if statement.indent != 0 {
            continue;
        }
        let tokens = source.statement_tokens(statement);
        let [target, eq, rest @ ..] = tokens else {
            continue;
        };
        if target.kind != TokenKind::Name || !source.is_op(eq, "=") {
            continue;
        }

        // Skip an optional dotted prefix: `qiskit.circuit.QuantumCircuit(`.
        let mut i = 0;
        while i + 1 < rest.len() && source.is_op(&rest[i + 1], ".") {
            i += 2;
        }
        let is_call = rest.get(i).is_some_and(|t| source.is_name(t, CIRCUIT_CLASS))
            && rest.get(i + 1).is_some_and(|t| source.is_op(t, "("));
        if !is_call {
            continue;
        }

        let name = source.token_text(target).to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
