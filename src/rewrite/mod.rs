//! Pattern-level rewrite engine.
//!
//! The engine runs an ordered [`RuleSet`] over a buffer. Every rule sees a
//! fresh scan of the text produced by the rules before it, so later rules
//! can rely on the imports earlier ones added. The whole pipeline is a pure
//! function of `(text, rules)`.

pub mod imports;
pub mod rules;
pub mod scanner;

use rules::{RuleContext, RuleId, RuleSet, apply_edits};
use scanner::Source;
use serde::Serialize;
use std::collections::BTreeSet;

/// Outcome of rewriting one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteResult {
    pub changed: bool,
    /// Equal to the input byte-for-byte when `changed` is false.
    pub new_text: String,
    pub applied_rules: BTreeSet<RuleId>,
    pub imports_added: Vec<String>,
}

impl RewriteResult {
    fn unchanged(text: &str) -> Self {
        Self {
            changed: false,
            new_text: text.to_string(),
            applied_rules: BTreeSet::new(),
            imports_added: Vec::new(),
        }
    }

    /// One-line human summary, e.g. `execute-call, import-consolidation`.
    pub fn summary(&self) -> String {
        if self.applied_rules.is_empty() {
            return "no changes".to_string();
        }
        self.applied_rules
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub struct RewriteEngine {
    rules: RuleSet,
}

impl RewriteEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rewrite(&self, text: &str) -> RewriteResult {
        let mut current = text.to_string();
        let mut applied = BTreeSet::new();
        let mut pending = Vec::new();
        let mut added = Vec::new();

        for rule in self.rules.iter() {
            let source = Source::scan(&current);
            let ctx = RuleContext {
                source: &source,
                pending_imports: &pending,
            };
            if !rule.detect(&ctx) {
                continue;
            }
            let output = rule.rewrite(&ctx);
            if output.is_empty() {
                tracing::debug!(rule = %rule.id(), "rule matched but declined to rewrite");
                continue;
            }

            let next = apply_edits(&current, output.edits);
            drop(source);
            if next != current {
                applied.insert(rule.id());
                current = next;
            }
            pending.extend(output.required_imports);
            added.extend(output.inserted_imports.iter().map(ToString::to_string));
        }

        if current == text {
            return RewriteResult::unchanged(text);
        }
        RewriteResult {
            changed: true,
            new_text: current,
            applied_rules: applied,
            imports_added: added,
        }
    }
}

impl Default for RewriteEngine {
    fn default() -> Self {
        Self::new(RuleSet::standard())
    }
}

/// Rewrite `text` with the standard rule set.
pub fn rewrite_text(text: &str) -> RewriteResult {
    RewriteEngine::default().rewrite(text)
}

/// True when `text` imports anything from the SDK; buffers that do not are
/// reported as "no relevant code" rather than "already compatible".
pub fn mentions_sdk(text: &str) -> bool {
    imports::mentions_sdk(&Source::scan(text))
}
