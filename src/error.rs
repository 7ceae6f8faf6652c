use thiserror::Error;

use crate::{distribution::DistributionError, logp::LogpError};

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Random variable `{name}` was declared outside of any trace")]
    NoActiveContext { name: String },

    #[error("Random variable `{name}` was declared twice in one trace")]
    DuplicateVariableName { name: String },

    #[error("Expected {expected} variables, found {found}")]
    VariableCountMismatch { expected: usize, found: usize },

    #[error("Variable {position} of the trace is {found}, but the model was configured with {expected}")]
    VariableShapeMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Cannot enter a context: {reason}")]
    ContextConflict { reason: String },

    /// The registry stack was not unwound in order. This is a bug and is
    /// not recoverable.
    #[error("Context registry is inconsistent: expected frame {expected}, found {found:?}")]
    InternalConsistency { expected: u64, found: Option<u64> },

    #[error("Model must be configured before it can be evaluated")]
    NotConfigured,

    #[error("Invalid distribution for variable `{name}`")]
    Distribution {
        name: String,
        #[source]
        source: DistributionError,
    },

    #[error(transparent)]
    Template(#[from] anyhow::Error),
}

impl ModelError {
    /// Errors that indicate a broken invariant of this crate.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModelError::InternalConsistency { .. })
    }
}

impl LogpError for ModelError {
    fn is_recoverable(&self) -> bool {
        matches!(self, ModelError::Distribution { .. })
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
