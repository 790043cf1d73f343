//! Collaborator contracts.
//!
//! Each trait is a black box around an external generation service. The
//! orchestrator only depends on these contracts; concrete implementations
//! live in `vforge-services` (HTTP/LLM backends) and `vforge-media`
//! (FFmpeg assembly).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use vforge_models::{Scene, Script, StageError, TransitionDecision};

/// Writes a video script for a topic.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(&self, topic: &str) -> Result<Script, StageError>;
}

/// Synthesizes narration audio for one scene's dialogue.
///
/// Implementations write the clip under `out_dir` and return its path.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, StageError>;
}

/// Finds a stock-footage clip illustrating one scene.
///
/// `scene_index` lets implementations keep clips unique across the scenes of
/// a run.
#[async_trait]
pub trait FootageFinder: Send + Sync {
    async fn find(
        &self,
        title: &str,
        dialogue: &str,
        scene_index: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, StageError>;
}

/// Renders a math animation for one scene.
///
/// Returns `Ok(None)` when the renderer decides the scene has no
/// mathematical content — the skip is the renderer's own call, recorded
/// upstream as a successful empty slot, never a failure.
#[async_trait]
pub trait AnimationRenderer: Send + Sync {
    async fn render(&self, scene: &Scene, out_dir: &Path) -> Result<Option<PathBuf>, StageError>;
}

/// A successfully assembled video.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub output: PathBuf,
    /// Sum of per-scene audio durations, seconds.
    pub duration_secs: f64,
}

/// Composes the final artifact from ordered scene media and the per-pair
/// transition plan.
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn assemble(
        &self,
        topic: &str,
        scenes: &[Scene],
        transitions: &[TransitionDecision],
        output: &Path,
    ) -> Result<Assembly, StageError>;
}
