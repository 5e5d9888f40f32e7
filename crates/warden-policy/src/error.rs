//! Error taxonomy for the policy engine.
//!
//! Hydration problems never surface here: a failed reload degrades to
//! system-rules-only and is logged. Filter-fragment parse failures do
//! propagate, because a syntactically invalid stored policy is a hard
//! configuration error rather than something evaluation can recover from.

/// Errors produced by the policy engine and its collaborator seams.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The policy source failed to list policies for a realm.
    #[error("policy source error: {message}")]
    Source {
        /// Description of the underlying failure.
        message: String,
    },

    /// A rule's filter fragment could not be parsed into a predicate.
    #[error("failed to parse filter fragment '{fragment}': {message}")]
    FilterParse {
        /// The offending fragment, after variable substitution.
        fragment: String,
        /// What the parser objected to.
        message: String,
    },

    /// A condition script failed to compile or evaluate.
    #[error("script evaluation failed: {message}")]
    Script {
        /// Compiler or runtime detail.
        message: String,
    },
}

impl PolicyError {
    /// Create a [`PolicyError::Source`].
    #[must_use]
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Create a [`PolicyError::FilterParse`].
    #[must_use]
    pub fn filter_parse(fragment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FilterParse {
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    /// Create a [`PolicyError::Script`].
    #[must_use]
    pub fn script(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
        }
    }
}

/// Type alias for policy engine results.
pub type PolicyResult<T> = Result<T, PolicyError>;
