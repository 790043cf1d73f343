//! Pipeline run state, status reporting, and the final artifact.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::stage::Stage;
use crate::transition::TransitionDecision;

/// Unique identifier for a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State machine over pipeline stages.
///
/// `Failed` is terminal and reachable from any non-terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunState {
    ScriptPending,
    AudioPending,
    IllustrationPending,
    AnimationPending,
    CompilationPending,
    Done,
    Failed { stage: Stage, error: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed { .. })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::ScriptPending => write!(f, "script_pending"),
            RunState::AudioPending => write!(f, "audio_pending"),
            RunState::IllustrationPending => write!(f, "illustration_pending"),
            RunState::AnimationPending => write!(f, "animation_pending"),
            RunState::CompilationPending => write!(f, "compilation_pending"),
            RunState::Done => write!(f, "done"),
            RunState::Failed { stage, error } => write!(f, "failed({}: {})", stage, error),
        }
    }
}

/// Progress of one media slot for one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Done,
    /// The stage failed but the run proceeds without this layer.
    Degraded,
    /// The stage decided the scene does not need this layer.
    Skipped,
}

/// Per-scene progress, one entry per media slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneProgress {
    pub index: usize,
    pub audio: SlotStatus,
    pub illustration: SlotStatus,
    pub animation: SlotStatus,
}

impl SceneProgress {
    pub fn pending(index: usize) -> Self {
        Self {
            index,
            audio: SlotStatus::Pending,
            illustration: SlotStatus::Pending,
            animation: SlotStatus::Pending,
        }
    }
}

/// Snapshot of a run: current stage plus per-scene progress.
///
/// Published over a watch channel while the run executes, so front ends can
/// poll without touching orchestrator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: RunId,
    pub state: RunState,
    pub scenes: Vec<SceneProgress>,
}

impl RunStatus {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: RunState::ScriptPending,
            scenes: Vec::new(),
        }
    }
}

/// A non-fatal degradation recorded in run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneWarning {
    pub scene_index: usize,
    pub stage: Stage,
    pub message: String,
}

/// The final composed artifact returned to the caller.
///
/// The caller always receives either a complete `Artifact` or a single
/// failed result naming the stage and error; never a partial output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub run_id: RunId,
    pub topic: String,
    pub output: PathBuf,
    pub total_scenes: usize,
    /// Sum of per-scene audio durations, seconds.
    pub total_duration_secs: f64,
    pub transitions: Vec<TransitionDecision>,
    pub warnings: Vec<SceneWarning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Done.is_terminal());
        assert!(RunState::Failed {
            stage: Stage::Script,
            error: "auth error".into()
        }
        .is_terminal());
        assert!(!RunState::AudioPending.is_terminal());
    }

    #[test]
    fn test_scene_progress_starts_pending() {
        let p = SceneProgress::pending(3);
        assert_eq!(p.index, 3);
        assert_eq!(p.audio, SlotStatus::Pending);
        assert_eq!(p.illustration, SlotStatus::Pending);
        assert_eq!(p.animation, SlotStatus::Pending);
    }
}
