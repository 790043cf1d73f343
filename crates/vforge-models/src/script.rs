//! Script and scene models.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A generated video script: an ordered sequence of scenes.
///
/// Scene ordering is fixed once the script stage completes. All later stages
/// and the transition selector index by this order; nothing re-sorts or
/// renumbers scenes mid-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    pub scenes: Vec<Scene>,
}

impl Script {
    /// Normalize scene indices to their position in the sequence.
    ///
    /// Called exactly once, when the script stage hands the script to the
    /// orchestrator.
    pub fn with_sequential_indices(mut self) -> Self {
        for (i, scene) in self.scenes.iter_mut().enumerate() {
            scene.index = i;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

/// One narrative/visual unit of the script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// 0-based position in the script. Sequence-defining and immutable after
    /// the script stage.
    pub index: usize,

    /// Scene title (used for footage keyword derivation and placeholders).
    pub title: String,

    /// Narration lines as produced by the script generator.
    pub lines: Vec<String>,

    /// Estimated spoken duration in seconds.
    #[serde(default)]
    pub duration_estimate: f64,

    /// Per-scene generated media, populated as stages complete.
    #[serde(default)]
    pub media: SceneMedia,
}

impl Scene {
    pub fn new(index: usize, title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            index,
            title: title.into(),
            lines,
            duration_estimate: 0.0,
            media: SceneMedia::default(),
        }
    }

    /// The full narration text, lines joined with spaces.
    pub fn dialogue(&self) -> String {
        self.lines.join(" ")
    }
}

/// Media references for one scene, one slot per generation stage.
///
/// Each slot is written by exactly one stage task; no two stages ever write
/// the same slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneMedia {
    /// Synthesized narration audio. Mandatory for compilation.
    pub audio: Option<PathBuf>,

    /// Stock-footage illustration clip. Optional; a placeholder layer is
    /// substituted at assembly when absent.
    pub illustration: Option<PathBuf>,

    /// Math animation clip. Optional; absent when the scene was classified
    /// as non-mathematical or the renderer failed.
    pub animation: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialogue_joins_lines() {
        let scene = Scene::new(0, "Intro", vec!["Hello.".into(), "Welcome.".into()]);
        assert_eq!(scene.dialogue(), "Hello. Welcome.");
    }

    #[test]
    fn test_with_sequential_indices() {
        let script = Script {
            scenes: vec![
                Scene::new(7, "A", vec![]),
                Scene::new(7, "B", vec![]),
                Scene::new(0, "C", vec![]),
            ],
        };
        let script = script.with_sequential_indices();
        let indices: Vec<usize> = script.scenes.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
