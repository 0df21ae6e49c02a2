use std::path::PathBuf;

use thiserror::Error;

// ————————————————————————————————————————————————————————————————————————————
// ANALYSIS
// ————————————————————————————————————————————————————————————————————————————

/// Failures raised while building or querying the capture registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// A nonterminal names a rule the grammar never defined.
    #[error("reference to undefined rule `{name}`")]
    UndefinedRule { name: String },

    /// `EndCapture` with no capture open in the current rule.
    #[error("rule `{rule}`: end of capture without a matching begin")]
    UnbalancedCapture { rule: String },

    /// A capture still open when the rule body ends.
    #[error("rule `{rule}`: {open} capture(s) never closed")]
    UnclosedCapture { rule: String, open: usize },

    /// A capture opened inside a choice branch, option or repetition body
    /// and closed outside of it (or the other way around).
    #[error("rule `{rule}`: capture crosses a choice, option or repetition boundary")]
    CaptureAcrossScope { rule: String },
}

// ————————————————————————————————————————————————————————————————————————————
// TOP LEVEL
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("failed writing templates to {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] crate::load::LoadError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
