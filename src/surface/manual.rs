use super::{FixOptions, FixOutcome};
use crate::rewrite::{self, RewriteResult};
use anyhow::{Context, Result};
use std::path::Path;

/// Result of fixing one file: the outcome plus the text that was written
/// back, if anything was.
#[derive(Debug, Clone)]
pub struct FileFix {
    pub outcome: FixOutcome,
    pub written: Option<String>,
}

/// Classify and rewrite a buffer. Text that never touches the SDK is left
/// alone even if it happens to call a function named `execute`.
pub fn fix_text(text: &str) -> (FixOutcome, RewriteResult) {
    if !rewrite::mentions_sdk(text) {
        return (
            FixOutcome::NoRelevantCode,
            RewriteResult {
                changed: false,
                new_text: text.to_string(),
                applied_rules: Default::default(),
                imports_added: Vec::new(),
            },
        );
    }
    let result = rewrite::rewrite_text(text);
    let outcome = if result.changed {
        FixOutcome::Fixed {
            rules: result.applied_rules.iter().copied().collect(),
            imports_added: result.imports_added.clone(),
        }
    } else {
        FixOutcome::AlreadyCompatible
    };
    (outcome, result)
}

pub fn apply_to_file(path: &Path, options: &FixOptions) -> Result<FileFix> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (outcome, result) = fix_text(&text);

    if !outcome.is_fixed() || options.dry_run {
        return Ok(FileFix {
            outcome,
            written: None,
        });
    }

    std::fs::write(path, &result.new_text)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), rules = %result.summary(), "fixed file");

    if let Some(history) = &options.history
        && let Err(e) = history.record(path, &outcome.rule_names())
    {
        tracing::warn!("failed to record fix history: {e:#}");
    }

    Ok(FileFix {
        outcome,
        written: Some(result.new_text),
    })
}

/// Fix a single file in place.
pub fn fix_file(path: &Path, options: &FixOptions) -> Result<FixOutcome> {
    Ok(apply_to_file(path, options)?.outcome)
}
