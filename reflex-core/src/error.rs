//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Errors raised by
//! user functions are carried in [`Error::Compute`] with their original source
//! intact, so callers can downcast them.

use thiserror::Error;

use crate::reactive::NamespaceId;

/// Boxed error type returned by user-supplied functions and sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while reading, writing or computing named values.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or delete referred to a name that holds no entry.
    #[error("name `{name}` is not defined")]
    NotFound {
        /// The missing name.
        name: String,
    },

    /// A descriptor was computed before being attached to a namespace.
    #[error("descriptor has not been registered with a namespace")]
    Unregistered,

    /// A descriptor read a name through a getter owned by another namespace.
    #[error("`{name}` belongs to namespace {owner}, but was read from namespace {expected}")]
    CrossNamespaceDependency {
        /// The name the getter reads.
        name: String,
        /// The namespace the offending getter is bound to.
        owner: NamespaceId,
        /// The namespace doing the computation.
        expected: NamespaceId,
    },

    /// Evaluation nested deeper than the configured limit, which means the
    /// names involved reference each other in a cycle.
    #[error("recursion limit of {limit} exceeded while computing `{name}`")]
    RecursionLimit {
        /// The name whose evaluation crossed the limit.
        name: String,
        /// The configured limit.
        limit: usize,
    },

    /// A function asked for a parameter that was neither passed nor filled.
    #[error("missing argument `{name}`")]
    MissingArgument {
        /// Parameter name.
        name: String,
    },

    /// A function asked for a positional argument past the end.
    #[error("missing positional argument {index}")]
    MissingPositional {
        /// Zero-based position.
        index: usize,
    },

    /// A user-supplied function or source failed.
    #[error("computation failed: {0}")]
    Compute(#[source] BoxError),

    /// Options could not be parsed.
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this is a [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Wrap an error from user code, unwrapping it if it already is ours.
    pub(crate) fn from_user(err: BoxError) -> Self {
        match err.downcast::<Error>() {
            Ok(err) => *err,
            Err(err) => Error::Compute(err),
        }
    }

    pub(crate) fn not_found(name: &str) -> Self {
        Error::NotFound {
            name: name.to_string(),
        }
    }
}
