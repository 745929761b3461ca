//! `from qiskit import Aer` → `from qiskit_aer import Aer`.

use super::{Edit, PatternRule, RuleContext, RuleId, RuleOutput};
use crate::rewrite::imports::{ImportSpec, excise_ranges, from_imports};

pub(crate) const UMBRELLA_PACKAGE: &str = "qiskit";
pub(crate) const BACKEND_PACKAGE: &str = "qiskit_aer";
pub(crate) const BACKEND_SYMBOL: &str = "Aer";

pub struct BackendImportRule;

impl PatternRule for BackendImportRule {
    fn id(&self) -> RuleId {
        RuleId::BackendImport
    }

    fn detect(&self, ctx: &RuleContext<'_, '_>) -> bool {
        from_imports(ctx.source)
            .iter()
            .any(|i| i.module == UMBRELLA_PACKAGE && i.position_of(BACKEND_SYMBOL).is_some())
    }

    fn rewrite(&self, ctx: &RuleContext<'_, '_>) -> RuleOutput {
        let source = ctx.source;
        let imports = from_imports(source);
        let mut output = RuleOutput::default();

        for import in imports.iter().filter(|i| i.module == UMBRELLA_PACKAGE) {
            let Some(index) = import.position_of(BACKEND_SYMBOL) else {
                continue;
            };
            let item = &import.names[index];
            let relocated =
                ImportSpec::new(BACKEND_PACKAGE, BACKEND_SYMBOL).with_alias(item.alias.clone());
            let already_present = relocated.is_satisfied_by(&imports);

            if import.names.len() == 1 && !import.star {
                // Standalone import: replace it wholesale, or drop it when the
                // dedicated import already exists elsewhere.
                if already_present && source.is_removable(&import.statement) {
                    output
                        .edits
                        .push(Edit::delete(source.statement_lines(&import.statement)));
                } else {
                    output.edits.push(Edit::replace(
                        import.statement.span.clone(),
                        relocated.to_string(),
                    ));
                    output.inserted_imports.push(relocated);
                }
                continue;
            }

            output.edits.extend(
                excise_ranges(source, import, index)
                    .into_iter()
                    .map(Edit::delete),
            );
            if !already_present {
                output.required_imports.push(relocated);
            }
        }

        output
    }
}
