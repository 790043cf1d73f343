//! Final video assembly.
//!
//! [`FfmpegAssembler`] implements the pipeline's `VideoAssembler` contract:
//! it validates the scene sequence and transition plan, builds one normalized
//! clip per scene, folds the pairwise transitions over the sequence, then
//! brackets the result with intro and outro cards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use vforge_models::{Scene, StageError, TransitionDecision};
use vforge_pipeline::{Assembly, VideoAssembler};

use crate::compositor::{FfmpegCompositor, MediaCompositor, SceneClipSpec};
use crate::error::{MediaError, MediaResult};

/// Duration of the intro and outro cards, seconds.
const CARD_SECS: f64 = 3.0;

/// Assembles the final video via a [`MediaCompositor`].
#[derive(Debug, Clone)]
pub struct FfmpegAssembler<C = FfmpegCompositor> {
    compositor: C,
}

impl Default for FfmpegAssembler<FfmpegCompositor> {
    fn default() -> Self {
        Self::with_compositor(FfmpegCompositor::new())
    }
}

impl FfmpegAssembler<FfmpegCompositor> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: MediaCompositor> FfmpegAssembler<C> {
    pub fn with_compositor(compositor: C) -> Self {
        Self { compositor }
    }

    /// Check scene ordering and per-scene audio before any media work.
    fn validate_scenes(scenes: &[Scene]) -> MediaResult<()> {
        if scenes.is_empty() {
            return Err(MediaError::InvalidTransitionPlan(
                "no scenes to assemble".to_string(),
            ));
        }
        for pair in scenes.windows(2) {
            if pair[0].index >= pair[1].index {
                return Err(MediaError::SceneOrder(format!(
                    "scene {} followed by scene {}",
                    pair[0].index, pair[1].index
                )));
            }
        }
        for scene in scenes {
            if scene.media.audio.is_none() {
                return Err(MediaError::MissingAudio(scene.index));
            }
        }
        Ok(())
    }

    /// The plan must cover every adjacent pair, in order, and nothing else.
    fn validate_plan(scenes: &[Scene], transitions: &[TransitionDecision]) -> MediaResult<()> {
        let expected = scenes.len() - 1;
        if transitions.len() != expected {
            return Err(MediaError::InvalidTransitionPlan(format!(
                "expected {} transitions for {} scenes, got {}",
                expected,
                scenes.len(),
                transitions.len()
            )));
        }
        for (i, decision) in transitions.iter().enumerate() {
            if decision.from_scene != scenes[i].index || decision.to_scene != scenes[i + 1].index {
                return Err(MediaError::InvalidTransitionPlan(format!(
                    "transition {} covers pair {}->{}, expected {}->{}",
                    i,
                    decision.from_scene,
                    decision.to_scene,
                    scenes[i].index,
                    scenes[i + 1].index
                )));
            }
        }
        Ok(())
    }

    async fn assemble_inner(
        &self,
        topic: &str,
        scenes: &[Scene],
        transitions: &[TransitionDecision],
        output: &Path,
    ) -> MediaResult<Assembly> {
        Self::validate_scenes(scenes)?;
        Self::validate_plan(scenes, transitions)?;

        let work = tempfile::tempdir()?;
        let work_dir = work.path();

        // One normalized clip per scene. Animation takes precedence over
        // the illustration; neither falls back to a placeholder card.
        let mut clips: Vec<PathBuf> = Vec::with_capacity(scenes.len());
        let mut total_secs = 0.0;
        for scene in scenes {
            let visual = scene
                .media
                .animation
                .clone()
                .or_else(|| scene.media.illustration.clone());
            let audio = scene
                .media
                .audio
                .clone()
                .ok_or(MediaError::MissingAudio(scene.index))?;
            let spec = SceneClipSpec {
                index: scene.index,
                title: scene.title.clone(),
                audio,
                visual,
            };
            let clip = work_dir.join(format!("scene_{:03}.mp4", scene.index));
            let secs = self.compositor.scene_clip(&spec, &clip).await?;
            debug!(scene = scene.index, secs, "Built scene clip");
            total_secs += secs;
            clips.push(clip);
        }

        // Fold transitions left to right: each step merges the running video
        // with the next scene clip.
        let mut current = clips[0].clone();
        for (i, decision) in transitions.iter().enumerate() {
            let merged = work_dir.join(format!("merged_{:03}.mp4", i));
            self.compositor
                .combine(
                    &current,
                    &clips[i + 1],
                    decision.kind,
                    decision.duration_secs,
                    &merged,
                )
                .await?;
            current = merged;
        }

        let intro = work_dir.join("intro.mp4");
        self.compositor
            .title_card(&format!("Video: {}", topic), CARD_SECS, &intro)
            .await?;
        let outro = work_dir.join("outro.mp4");
        self.compositor
            .title_card("Thank you for watching!", CARD_SECS, &outro)
            .await?;

        self.compositor
            .concat(&[intro, current, outro], output)
            .await?;

        info!(
            output = %output.display(),
            scenes = scenes.len(),
            secs = total_secs,
            "Assembled video"
        );
        Ok(Assembly {
            output: output.to_path_buf(),
            duration_secs: total_secs,
        })
    }
}

#[async_trait]
impl<C: MediaCompositor> VideoAssembler for FfmpegAssembler<C> {
    async fn assemble(
        &self,
        topic: &str,
        scenes: &[Scene],
        transitions: &[TransitionDecision],
        output: &Path,
    ) -> Result<Assembly, StageError> {
        self.assemble_inner(topic, scenes, transitions, output)
            .await
            .map_err(|e| StageError::composition(e.to_string()))
    }
}
