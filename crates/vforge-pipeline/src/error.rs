//! Pipeline error types.

use thiserror::Error;

use vforge_models::{Stage, StageError};

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Terminal failure of a pipeline run.
///
/// The caller always receives either a complete artifact or exactly one of
/// these, naming the stage that failed and the underlying error.
#[derive(Debug, Clone, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    pub error: StageError,
}

impl PipelineError {
    pub fn stage(stage: Stage, error: StageError) -> Self {
        Self { stage, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_stage_and_error() {
        let e = PipelineError::stage(Stage::Script, StageError::auth("key missing"));
        assert_eq!(e.to_string(), "script stage failed: auth error: key missing");
    }
}
