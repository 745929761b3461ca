//! Trigger surfaces sharing the rewrite engine: manual fix, one-shot scan,
//! background file watch and clipboard watch, plus the supervisor and pid
//! records that keep at most one watcher per mode alive in a workspace.

pub mod clipboard;
pub mod file_watch;
pub mod manual;
pub mod pid_record;
pub mod scan;
pub mod session;

use crate::history::History;
use crate::rewrite::rules::RuleId;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct FixOptions {
    /// Report what would change without writing anything back.
    pub dry_run: bool,
    pub history: Option<Arc<History>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    Fixed {
        rules: Vec<RuleId>,
        imports_added: Vec<String>,
    },
    AlreadyCompatible,
    NoRelevantCode,
}

impl FixOutcome {
    pub fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed { .. })
    }

    pub fn rule_names(&self) -> Vec<String> {
        match self {
            Self::Fixed { rules, .. } => rules.iter().map(ToString::to_string).collect(),
            Self::AlreadyCompatible | Self::NoRelevantCode => Vec::new(),
        }
    }
}

impl fmt::Display for FixOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed { rules, .. } => {
                let names = rules
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "fixed ({names})")
            }
            Self::AlreadyCompatible => f.write_str("no changes needed, already compatible"),
            Self::NoRelevantCode => f.write_str("no Qiskit code found"),
        }
    }
}
