//! `execute(qc, backend, **opts)` → `backend.run(transpile(qc, backend), **opts)`.

use super::{Edit, PatternRule, RuleContext, RuleId, RuleOutput};
use crate::rewrite::imports::{
    FromImport, ImportSpec, excise_ranges, from_imports, is_import_statement,
};
use crate::rewrite::scanner::{Source, Token, TokenKind};
use std::ops::Range;

const LEGACY_CALL: &str = "execute";
const CIRCUIT_KEYWORDS: &[&str] = &["experiments", "circuits"];
const BACKEND_KEYWORD: &str = "backend";

pub struct ExecuteCallRule;

impl PatternRule for ExecuteCallRule {
    fn id(&self) -> RuleId {
        RuleId::ExecuteCall
    }

    fn detect(&self, ctx: &RuleContext<'_, '_>) -> bool {
        let source = ctx.source;
        if shadowed_locally(source) {
            return false;
        }
        !call_sites(source).is_empty() || legacy_import(source).is_some()
    }

    fn rewrite(&self, ctx: &RuleContext<'_, '_>) -> RuleOutput {
        let source = ctx.source;
        let mut output = RuleOutput::default();
        if shadowed_locally(source) {
            return output;
        }

        let sites = call_sites(source);
        let mut rewritten = 0;
        for site in &sites {
            let nested = sites
                .iter()
                .any(|other| other.name_at != site.name_at && site.span.contains(&other.span.start));
            let enclosed = sites
                .iter()
                .any(|other| other.name_at != site.name_at && other.span.contains(&site.span.start));
            if nested || enclosed {
                continue;
            }
            if let Some(replacement) = rewrite_call(source, site) {
                output.edits.push(Edit::replace(site.span.clone(), replacement));
                rewritten += 1;
            }
        }

        if rewritten > 0 {
            output
                .required_imports
                .push(ImportSpec::new("qiskit", "transpile"));
        }

        // The legacy import goes only once nothing references `execute` any
        // more; otherwise removing it would break the calls we declined.
        let remaining_uses = bare_uses(source) - rewritten;
        if remaining_uses == 0
            && let Some((import, index)) = legacy_import(source)
        {
            if import.names.len() == 1 && !import.star {
                if source.is_removable(&import.statement) {
                    output
                        .edits
                        .push(Edit::delete(source.statement_lines(&import.statement)));
                } else if source.is_sole_statement_in_block(&import.statement) {
                    // The block needs a body once the import is gone.
                    output
                        .edits
                        .push(Edit::replace(import.statement.span.clone(), "pass"));
                }
            } else {
                output.edits.extend(
                    excise_ranges(source, &import, index)
                        .into_iter()
                        .map(Edit::delete),
                );
            }
        }

        output
    }
}

struct CallSite {
    /// Code-token index of the `execute` name.
    name_at: usize,
    open: usize,
    close: usize,
    span: Range<usize>,
}

/// A user-defined `execute` (a module-level `def`, or an import from
/// somewhere other than the SDK) means calls are not ours to touch.
fn shadowed_locally(source: &Source<'_>) -> bool {
    let defined = source.statements().iter().any(|s| {
        let mut tokens = source.statement_tokens(s);
        if tokens.first().is_some_and(|t| source.is_name(t, "async")) {
            tokens = &tokens[1..];
        }
        s.indent == 0
            && tokens.len() >= 2
            && source.is_name(&tokens[0], "def")
            && source.is_name(&tokens[1], LEGACY_CALL)
    });
    let foreign_import = from_imports(source).iter().any(|i| {
        i.module != "qiskit" && i.names.iter().any(|n| n.binding() == LEGACY_CALL)
    });
    defined || foreign_import
}

fn legacy_import(source: &Source<'_>) -> Option<(FromImport, usize)> {
    from_imports(source).into_iter().find_map(|import| {
        if import.module != "qiskit" {
            return None;
        }
        let index = import
            .names
            .iter()
            .position(|n| n.name == LEGACY_CALL && n.alias.is_none())?;
        Some((import, index))
    })
}

fn is_bare_reference(source: &Source<'_>, code: &[Token], i: usize) -> bool {
    source.is_name(&code[i], LEGACY_CALL)
        && !(i > 0 && (source.is_op(&code[i - 1], ".") || source.is_name(&code[i - 1], "def")))
}

/// Count of bare `execute` references outside import statements.
fn bare_uses(source: &Source<'_>) -> usize {
    let code = source.code();
    source
        .statements()
        .iter()
        .filter(|s| !is_import_statement(source, s))
        .flat_map(|s| s.tokens.clone())
        .filter(|&i| is_bare_reference(source, code, i))
        .count()
}

fn call_sites(source: &Source<'_>) -> Vec<CallSite> {
    let code = source.code();
    let mut sites = Vec::new();
    for statement in source.statements() {
        if is_import_statement(source, statement) {
            continue;
        }
        for i in statement.tokens.clone() {
            if !is_bare_reference(source, code, i) {
                continue;
            }
            let open = i + 1;
            if !code.get(open).is_some_and(|t| source.is_op(t, "(")) {
                continue;
            }
            let Some(close) = source.matching_close(open) else {
                continue;
            };
            sites.push(CallSite {
                name_at: i,
                open,
                close,
                span: code[i].span.start..code[close].span.end,
            });
        }
    }
    sites
}

struct Argument {
    span: Range<usize>,
    keyword: Option<String>,
    starred: bool,
}

fn split_arguments(source: &Source<'_>, site: &CallSite) -> Vec<Argument> {
    let code = source.code();
    let mut args = Vec::new();
    let mut depth = 0_usize;
    let mut start = site.open + 1;

    let finish = |from: usize, to: usize, args: &mut Vec<Argument>| {
        if from >= to {
            return;
        }
        let tokens = &code[from..to];
        let keyword = (tokens.len() > 2
            && tokens[0].kind == TokenKind::Name
            && source.is_op(&tokens[1], "="))
        .then(|| source.token_text(&tokens[0]).to_string());
        let starred = source.is_op(&tokens[0], "*") || source.is_op(&tokens[0], "**");
        args.push(Argument {
            span: tokens[0].span.start..tokens[tokens.len() - 1].span.end,
            keyword,
            starred,
        });
    };

    for i in site.open + 1..site.close {
        let tok = &code[i];
        if tok.kind != TokenKind::Op {
            continue;
        }
        match source.token_text(tok) {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => depth = depth.saturating_sub(1),
            "," if depth == 0 => {
                finish(start, i, &mut args);
                start = i + 1;
            }
            _ => {}
        }
    }
    finish(start, site.close, &mut args);
    args
}

/// Build the two-step replacement, or `None` when the call's shape is
/// ambiguous (missing circuit/backend, star-args in front of them).
fn rewrite_call(source: &Source<'_>, site: &CallSite) -> Option<String> {
    let args = split_arguments(source, site);

    let mut circuit = None;
    let mut backend = None;
    let mut positional = 0;
    let mut rest = Vec::new();

    for (idx, arg) in args.iter().enumerate() {
        if arg.starred && (circuit.is_none() || backend.is_none()) {
            return None;
        }
        match arg.keyword.as_deref() {
            None if !arg.starred && positional < 2 => {
                if positional == 0 {
                    circuit = Some(idx);
                } else {
                    backend = Some(idx);
                }
                positional += 1;
            }
            Some(k) if CIRCUIT_KEYWORDS.contains(&k) && circuit.is_none() => circuit = Some(idx),
            Some(BACKEND_KEYWORD) if backend.is_none() => backend = Some(idx),
            _ => rest.push(idx),
        }
    }

    let circuit = value_text(source, &args[circuit?]);
    let backend_arg = &args[backend?];
    let backend = value_text(source, backend_arg);
    let backend = if is_simple_primary(source, backend_arg) {
        backend.to_string()
    } else {
        format!("({backend})")
    };

    let kept: Vec<Range<usize>> = if rest.is_empty() {
        Vec::new()
    } else if rest.windows(2).all(|w| w[1] == w[0] + 1) {
        // Contiguous trailing arguments keep their original layout.
        vec![args[rest[0]].span.start..args[rest[rest.len() - 1]].span.end]
    } else {
        rest.iter().map(|&i| args[i].span.clone()).collect()
    };

    // Comments only survive inside the copied trailing arguments.
    let dropped_comment = source.tokens().iter().any(|t| {
        t.kind == TokenKind::Comment
            && site.span.contains(&t.span.start)
            && !kept
                .iter()
                .any(|k| t.span.start >= k.start && t.span.end <= k.end)
    });
    if dropped_comment {
        return None;
    }

    let rest_text: String = kept
        .iter()
        .map(|span| format!(", {}", source.slice(span.clone())))
        .collect();

    Some(format!(
        "{backend}.run(transpile({circuit}, {backend}){rest_text})"
    ))
}

/// The expression part of an argument (`x` in `backend=x`).
fn value_text<'a>(source: &Source<'a>, arg: &Argument) -> &'a str {
    let text = source.slice(arg.span.clone());
    if arg.keyword.is_some() {
        text.split_once('=').map_or(text, |(_, v)| v.trim_start())
    } else {
        text
    }
}

/// A name, attribute chain, call or subscript can take `.run` directly;
/// anything with a top-level operator needs parentheses.
fn is_simple_primary(source: &Source<'_>, arg: &Argument) -> bool {
    let code = source.code();
    let tokens: Vec<&Token> = code
        .iter()
        .filter(|t| t.span.start >= arg.span.start && t.span.end <= arg.span.end)
        .collect();
    let tokens = if arg.keyword.is_some() {
        tokens.get(2..).unwrap_or_default().to_vec()
    } else {
        tokens
    };

    let mut depth = 0_usize;
    for tok in tokens {
        match tok.kind {
            TokenKind::Op => match source.token_text(tok) {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                "." => {}
                _ if depth == 0 => return false,
                _ => {}
            },
            TokenKind::Name if depth == 0 => {
                let word = source.token_text(tok);
                if matches!(word, "if" | "else" | "lambda" | "and" | "or" | "not" | "await") {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}
