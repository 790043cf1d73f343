//! Pipeline stages and per-invocation stage results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// One phase of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Script,
    Audio,
    Illustration,
    Animation,
    Compilation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Script => "script",
            Stage::Audio => "audio",
            Stage::Illustration => "illustration",
            Stage::Animation => "animation",
            Stage::Compilation => "compilation",
        }
    }

    /// Whether this stage's per-scene output is mandatory for compilation.
    ///
    /// A `Failed` result from a mandatory stage fails the whole run;
    /// non-mandatory failures degrade to a run warning.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Stage::Script | Stage::Audio | Stage::Compilation)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tagged outcome of one stage invocation.
///
/// Created and consumed within a single stage call; the orchestrator folds
/// these into scene media slots and run warnings.
#[derive(Debug, Clone)]
pub enum StageResult<T> {
    /// The primary collaborator succeeded.
    Success(T),
    /// The primary collaborator failed and the fallback produced the payload.
    FallbackUsed { payload: T, reason: String },
    /// Both the primary and any configured fallback failed.
    Failed(StageError),
}

impl<T> StageResult<T> {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed(_))
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self, StageResult::FallbackUsed { .. })
    }

    /// The payload, if the stage produced one (directly or via fallback).
    pub fn payload(self) -> Option<T> {
        match self {
            StageResult::Success(payload) => Some(payload),
            StageResult::FallbackUsed { payload, .. } => Some(payload),
            StageResult::Failed(_) => None,
        }
    }

    /// The error, if the stage failed.
    pub fn error(&self) -> Option<&StageError> {
        match self {
            StageResult::Failed(e) => Some(e),
            _ => None,
        }
    }
}
