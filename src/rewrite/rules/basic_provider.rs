//! `BasicAer` was removed; its replacement is `BasicProvider`, whose
//! simulator is named `basic_simulator` instead of `qasm_simulator`.

use super::{Edit, PatternRule, RuleContext, RuleId, RuleOutput};
use crate::rewrite::imports::{ImportSpec, excise_ranges, from_imports, is_import_statement};
use crate::rewrite::scanner::{Source, TokenKind};
use std::ops::Range;

const LEGACY_SYMBOL: &str = "BasicAer";
const PROVIDER_MODULE: &str = "qiskit.providers.basic_provider";
const PROVIDER_SYMBOL: &str = "BasicProvider";
const LEGACY_SIMULATOR: &str = "qasm_simulator";
const REPLACEMENT_CALL: &str = "BasicProvider().get_backend(\"basic_simulator\")";

pub struct BasicProviderRule;

impl PatternRule for BasicProviderRule {
    fn id(&self) -> RuleId {
        RuleId::BasicProvider
    }

    fn detect(&self, ctx: &RuleContext<'_, '_>) -> bool {
        from_imports(ctx.source).iter().any(|i| {
            i.module == "qiskit"
                && i.position_of(LEGACY_SYMBOL)
                    .is_some_and(|idx| i.names[idx].alias.is_none())
        })
    }

    fn rewrite(&self, ctx: &RuleContext<'_, '_>) -> RuleOutput {
        let source = ctx.source;
        let mut output = RuleOutput::default();

        // Every use must be a call we know how to translate; anything else
        // (attribute access, passing the class around) is left alone.
        let Some(calls) = rewritable_calls(source) else {
            return output;
        };

        let imports = from_imports(source);
        let provider = ImportSpec::new(PROVIDER_MODULE, PROVIDER_SYMBOL);
        let provider_present = provider.is_satisfied_by(&imports);

        for import in imports.iter().filter(|i| i.module == "qiskit") {
            let Some(index) = import.position_of(LEGACY_SYMBOL) else {
                continue;
            };
            if import.names.len() == 1 && !import.star {
                if provider_present && source.is_removable(&import.statement) {
                    output
                        .edits
                        .push(Edit::delete(source.statement_lines(&import.statement)));
                } else {
                    output.edits.push(Edit::replace(
                        import.statement.span.clone(),
                        provider.to_string(),
                    ));
                    output.inserted_imports.push(provider.clone());
                }
            } else {
                output.edits.extend(
                    excise_ranges(source, import, index)
                        .into_iter()
                        .map(Edit::delete),
                );
                if !provider_present {
                    output.required_imports.push(provider.clone());
                }
            }
        }

        output
            .edits
            .extend(calls.into_iter().map(|span| Edit::replace(span, REPLACEMENT_CALL)));
        output
    }
}

/// Spans of every `BasicAer.get_backend('qasm_simulator')` call, or `None`
/// when `BasicAer` is used in any other way outside import statements.
fn rewritable_calls(source: &Source<'_>) -> Option<Vec<Range<usize>>> {
    let code = source.code();
    let mut calls = Vec::new();

    for statement in source.statements() {
        if is_import_statement(source, statement) {
            continue;
        }
        for i in statement.tokens.clone() {
            if !source.is_name(&code[i], LEGACY_SYMBOL) {
                continue;
            }
            if i > 0 && source.is_op(&code[i - 1], ".") {
                // `something.BasicAer` is a different binding.
                continue;
            }
            let window = code.get(i..i + 6)?;
            let matches = source.is_op(&window[1], ".")
                && source.is_name(&window[2], "get_backend")
                && source.is_op(&window[3], "(")
                && window[4].kind == TokenKind::Str
                && string_value(source.token_text(&window[4])) == Some(LEGACY_SIMULATOR)
                && source.is_op(&window[5], ")");
            if !matches {
                return None;
            }
            calls.push(window[0].span.start..window[5].span.end);
        }
    }
    Some(calls)
}

/// Content of a plain (unprefixed, single-line) string literal.
fn string_value(literal: &str) -> Option<&str> {
    let quote = literal.chars().next()?;
    if !matches!(quote, '"' | '\'') || literal.len() < 2 || !literal.ends_with(quote) {
        return None;
    }
    Some(&literal[1..literal.len() - 1])
}
