//! Stage error taxonomy.
//!
//! Every collaborator (script generator, speech synthesizer, footage finder,
//! animation renderer, assembler) reports failures through `StageError`. The
//! variant determines how the stage runner reacts: transient errors are
//! retried within a bounded budget, auth errors fail immediately, content
//! errors skip retry but remain eligible for a fallback collaborator, and
//! composition errors are fatal for the run.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    /// Network/timeout class failure, eligible for bounded retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Invalid or missing credentials. Fatal, never retried.
    #[error("auth error: {0}")]
    Auth(String),

    /// The collaborator rejected the input. No retry, fallback-eligible.
    #[error("content error: {0}")]
    Content(String),

    /// Media assembly failure. Fatal for the run.
    #[error("composition error: {0}")]
    Composition(String),
}

impl StageError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn content(msg: impl Into<String>) -> Self {
        Self::Content(msg.into())
    }

    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Whether the error is eligible for a bounded retry of the same
    /// collaborator.
    pub fn is_transient(&self) -> bool {
        matches!(self, StageError::Transient(_))
    }

    /// Whether the error is fatal regardless of fallback configuration.
    pub fn is_auth(&self) -> bool {
        matches!(self, StageError::Auth(_))
    }
}

impl From<std::io::Error> for StageError {
    fn from(e: std::io::Error) -> Self {
        // Local IO against collaborator work dirs is treated as transient:
        // a retry after the filesystem settles can succeed.
        StageError::Transient(format!("io error: {}", e))
    }
}
