use super::imports::ImportSpec;
use super::scanner::Source;
use serde::Serialize;
use std::ops::Range;

mod backend_import;
mod basic_provider;
mod consolidate;
mod execute_call;

pub use backend_import::BackendImportRule;
pub use basic_provider::BasicProviderRule;
pub use consolidate::ImportConsolidationRule;
pub use execute_call::ExecuteCallRule;

/// Stable identifier of a rewrite rule, reported in change summaries.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RuleId {
    BackendImport,
    BasicProvider,
    ExecuteCall,
    ImportConsolidation,
}

/// A single text replacement against the buffer a rule was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, replacement: impl Into<String>) -> Self {
        Self {
            range,
            replacement: replacement.into(),
        }
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::replace(range, "")
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }
}

/// What a rule wants done to one buffer.
#[derive(Debug, Default)]
pub struct RuleOutput {
    pub edits: Vec<Edit>,
    /// Imports later rules must make sure are present.
    pub required_imports: Vec<ImportSpec>,
    /// Imports this rule inserted itself.
    pub inserted_imports: Vec<ImportSpec>,
}

impl RuleOutput {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty() && self.required_imports.is_empty()
    }
}

/// Everything a rule sees: the scanned buffer and the imports earlier
/// rules have asked for.
pub struct RuleContext<'s, 'a> {
    pub source: &'s Source<'a>,
    pub pending_imports: &'s [ImportSpec],
}

/// A deprecated-pattern detector paired with its rewriter.
///
/// `rewrite` must be pure and total. Where `detect` is false it returns no
/// edits, and running the whole rule set on its own output changes nothing.
pub trait PatternRule: Send + Sync {
    fn id(&self) -> RuleId;

    fn detect(&self, ctx: &RuleContext<'_, '_>) -> bool;

    fn rewrite(&self, ctx: &RuleContext<'_, '_>) -> RuleOutput;
}

/// Ordered catalog of rules. Order matters: consolidation must run last so
/// it sees the imports every earlier rule requested.
pub struct RuleSet {
    rules: Vec<Box<dyn PatternRule>>,
}

impl RuleSet {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                Box::new(BackendImportRule),
                Box::new(BasicProviderRule),
                Box::new(ExecuteCallRule),
                Box::new(ImportConsolidationRule),
            ],
        }
    }

    pub fn from_rules(rules: Vec<Box<dyn PatternRule>>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn PatternRule> {
        self.rules.iter().map(AsRef::as_ref)
    }

    pub fn ids(&self) -> Vec<RuleId> {
        self.rules.iter().map(|r| r.id()).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Apply `edits` to `text`. Edits are applied back to front; an edit that
/// overlaps one already accepted is dropped rather than guessed at.
pub fn apply_edits(text: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by(|a, b| a.range.start.cmp(&b.range.start).then(a.range.end.cmp(&b.range.end)));

    let mut accepted: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits {
        if let Some(prev) = accepted.last()
            && edit.range.start < prev.range.end
        {
            tracing::debug!(?edit.range, ?prev.range, "dropping overlapping edit");
            continue;
        }
        accepted.push(edit);
    }

    let mut out = text.to_string();
    for edit in accepted.into_iter().rev() {
        out.replace_range(edit.range, &edit.replacement);
    }
    out
}
