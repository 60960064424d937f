//! Domain error taxonomy.
//!
//! Store and application failures travel as `anyhow::Error` with context, the
//! same way the rest of the crate reports them. The variants here are the
//! conditions stages need to tell apart: a catalog request that may be retried,
//! one that ran out of retries, and the skip-and-continue cases.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network or API failure against the catalog source.
    #[error("catalog request `{operation}` failed: {message}")]
    ExternalFetch {
        operation: &'static str,
        message: String,
    },

    /// Bounded retry gave up; carries the last underlying failure.
    #[error("catalog request `{operation}` failed after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: Box<PipelineError>,
    },

    /// A track id came back without audio features.
    #[error("no audio features for track {0}")]
    MissingFeature(String),

    /// A clustering stage was handed nothing to cluster.
    #[error("{stage}: no input to cluster")]
    EmptyInput { stage: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn fetch(operation: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalFetch {
            operation,
            message: message.into(),
        }
    }

    /// Only transport failures are worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalFetch { .. })
    }
}
