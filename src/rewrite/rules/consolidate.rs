use super::{Edit, PatternRule, RuleContext, RuleId, RuleOutput};
use crate::rewrite::imports::{ImportSpec, from_imports, insertion_point};

/// Inserts the imports earlier rules required, skipping any the buffer
/// already binds and any duplicates among the requests themselves.
pub struct ImportConsolidationRule;

impl ImportConsolidationRule {
    fn missing(ctx: &RuleContext<'_, '_>) -> Vec<ImportSpec> {
        let existing = from_imports(ctx.source);
        let mut missing: Vec<ImportSpec> = Vec::new();
        for spec in ctx.pending_imports {
            if spec.is_satisfied_by(&existing) || missing.contains(spec) {
                continue;
            }
            missing.push(spec.clone());
        }
        missing
    }
}

impl PatternRule for ImportConsolidationRule {
    fn id(&self) -> RuleId {
        RuleId::ImportConsolidation
    }

    fn detect(&self, ctx: &RuleContext<'_, '_>) -> bool {
        !Self::missing(ctx).is_empty()
    }

    fn rewrite(&self, ctx: &RuleContext<'_, '_>) -> RuleOutput {
        let missing = Self::missing(ctx);
        if missing.is_empty() {
            return RuleOutput::default();
        }

        let text = ctx.source.text();
        let at = insertion_point(ctx.source);
        let mut block = String::new();
        if at > 0 && !text[..at].ends_with('\n') {
            block.push('\n');
        }
        for spec in &missing {
            block.push_str(&spec.to_string());
            block.push('\n');
        }

        RuleOutput {
            edits: vec![Edit::insert(at, block)],
            required_imports: Vec::new(),
            inserted_imports: missing,
        }
    }
}
