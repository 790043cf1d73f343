//! Pipeline orchestration.
//!
//! Sequences the five generation stages as a state machine:
//!
//! ```text
//! ScriptPending -> AudioPending -> IllustrationPending -> AnimationPending
//!               -> CompilationPending -> Done
//! ```
//!
//! with a terminal `Failed(stage, error)` reachable from any non-terminal
//! state. The script stage runs once per run; audio, illustration, and
//! animation fan out per scene (bounded by `max_concurrent_calls`), each
//! phase a fan-out/fan-in barrier. Audio is mandatory: a failed scene aborts
//! the run and cancels in-flight tasks. Illustration and animation failures
//! degrade to run warnings; the scene proceeds without that media layer.
//!
//! All run state is owned here for the run's duration. Fan-out tasks return
//! `(scene_index, StageResult)` and the orchestrator alone writes media
//! slots, so no two tasks ever touch the same slot.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use vforge_models::{
    Artifact, RunId, RunState, RunStatus, Scene, SceneProgress, SceneWarning, SlotStatus, Stage,
    StageError, StageResult,
};

use crate::collaborators::{
    AnimationRenderer, FootageFinder, ScriptGenerator, SpeechSynthesizer, VideoAssembler,
};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::selector::TransitionSelector;
use crate::stage_runner::StageRunner;

/// The external collaborator set for one pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub script: Arc<dyn ScriptGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Secondary synthesizer, invoked only after the primary fails.
    pub speech_fallback: Option<Arc<dyn SpeechSynthesizer>>,
    pub footage: Arc<dyn FootageFinder>,
    pub animation: Arc<dyn AnimationRenderer>,
    pub assembler: Arc<dyn VideoAssembler>,
}

/// Runs the full topic-to-video pipeline.
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    collaborators: Collaborators,
    selector: TransitionSelector,
    runner: StageRunner,
    status: watch::Sender<RunStatus>,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let selector = TransitionSelector::new(config.transitions.clone());
        let runner = StageRunner::new(config.retry.clone());
        let (status, _) = watch::channel(RunStatus::new(RunId::new()));
        Self {
            config,
            collaborators,
            selector,
            runner,
            status,
        }
    }

    /// Observe the current run state and per-scene progress.
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Run the pipeline for a topic and return the final artifact.
    ///
    /// On failure the run transitions to `Failed(stage, error)` and no
    /// partial artifact is produced.
    pub async fn run(
        &self,
        topic: &str,
        output_filename: Option<String>,
    ) -> PipelineResult<Artifact> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        self.status.send_replace(RunStatus::new(run_id.clone()));

        info!(run_id = %run_id, topic = topic, "Starting pipeline run");

        for dir in [
            self.config.audio_dir(),
            self.config.video_dir(),
            self.config.output_dir.clone(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| self.fail(Stage::Script, StageError::from(e)))?;
        }

        // Stage 1: script (once per run, mandatory).
        let mut scenes = self.script_phase(topic).await?;
        let mut warnings: Vec<SceneWarning> = Vec::new();

        // Stage 2: audio (per scene, mandatory).
        self.set_state(RunState::AudioPending);
        self.audio_phase(&mut scenes).await?;

        // Stage 3: illustration (per scene, degrades on failure).
        self.set_state(RunState::IllustrationPending);
        self.illustration_phase(&mut scenes, &mut warnings).await;

        // Stage 4: animation (per scene, skippable, degrades on failure).
        self.set_state(RunState::AnimationPending);
        self.animation_phase(&mut scenes, &mut warnings).await;

        // Stage 5: compilation. Transitions are computed only now, over the
        // finalized ordered scene list.
        self.set_state(RunState::CompilationPending);
        let transitions = self.selector.select_all(&scenes);
        for decision in &transitions {
            info!(
                from_scene = decision.from_scene,
                to_scene = decision.to_scene,
                kind = %decision.kind,
                rule = %decision.reason,
                "Transition selected"
            );
        }

        let output = self
            .config
            .output_dir
            .join(output_filename.unwrap_or_else(|| default_output_filename(topic)));

        let assembler = &self.collaborators.assembler;
        let result = self
            .runner
            .run(Stage::Compilation, None, || {
                assembler.assemble(topic, &scenes, &transitions, &output)
            })
            .await;

        let assembly = match result {
            StageResult::Success(assembly) | StageResult::FallbackUsed {
                payload: assembly, ..
            } => assembly,
            StageResult::Failed(e) => return Err(self.fail(Stage::Compilation, e)),
        };

        self.set_state(RunState::Done);
        let finished_at = Utc::now();
        info!(
            run_id = %run_id,
            output = %assembly.output.display(),
            scenes = scenes.len(),
            duration_secs = assembly.duration_secs,
            warnings = warnings.len(),
            "Pipeline run complete"
        );

        Ok(Artifact {
            run_id,
            topic: topic.to_string(),
            output: assembly.output,
            total_scenes: scenes.len(),
            total_duration_secs: assembly.duration_secs,
            transitions,
            warnings,
            started_at,
            finished_at,
        })
    }

    async fn script_phase(&self, topic: &str) -> PipelineResult<Vec<Scene>> {
        self.set_state(RunState::ScriptPending);

        let generator = &self.collaborators.script;
        let result = self
            .runner
            .run(Stage::Script, None, || generator.generate(topic))
            .await;

        let script = match result {
            StageResult::Success(script) | StageResult::FallbackUsed {
                payload: script, ..
            } => script,
            StageResult::Failed(e) => return Err(self.fail(Stage::Script, e)),
        };

        // Scene order is fixed from here on; indices are normalized once and
        // never reassigned.
        let scenes = script.with_sequential_indices().scenes;
        if scenes.is_empty() {
            return Err(self.fail(
                Stage::Script,
                StageError::content("script contained no scenes"),
            ));
        }

        info!(scenes = scenes.len(), "Script generated");
        self.status.send_modify(|s| {
            s.scenes = (0..scenes.len()).map(SceneProgress::pending).collect();
        });
        Ok(scenes)
    }

    async fn audio_phase(&self, scenes: &mut [Scene]) -> PipelineResult<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls));
        let audio_dir = self.config.audio_dir();
        let mut tasks: JoinSet<(usize, StageResult<PathBuf>)> = JoinSet::new();

        for scene in scenes.iter() {
            let index = scene.index;
            let text = scene.dialogue();
            let runner = self.runner.clone();
            let semaphore = Arc::clone(&semaphore);
            let primary = Arc::clone(&self.collaborators.speech);
            let fallback = self.collaborators.speech_fallback.clone();
            let out_dir = audio_dir.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            StageResult::Failed(StageError::transient("concurrency limiter closed")),
                        )
                    }
                };

                let result = match fallback {
                    Some(fb) => {
                        runner
                            .run_with_fallback(
                                Stage::Audio,
                                Some(index),
                                || {
                                    let primary = Arc::clone(&primary);
                                    let text = text.clone();
                                    let dir = out_dir.clone();
                                    async move { primary.synthesize(&text, &dir).await }
                                },
                                || {
                                    let fb = Arc::clone(&fb);
                                    let text = text.clone();
                                    let dir = out_dir.clone();
                                    async move { fb.synthesize(&text, &dir).await }
                                },
                            )
                            .await
                    }
                    None => {
                        runner
                            .run(Stage::Audio, Some(index), || {
                                let primary = Arc::clone(&primary);
                                let text = text.clone();
                                let dir = out_dir.clone();
                                async move { primary.synthesize(&text, &dir).await }
                            })
                            .await
                    }
                };
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    tasks.abort_all();
                    return Err(self.fail(
                        Stage::Audio,
                        StageError::transient(format!("audio task aborted: {}", e)),
                    ));
                }
            };

            match result {
                StageResult::Success(path) => {
                    scenes[index].media.audio = Some(path);
                    self.set_slot(index, Stage::Audio, SlotStatus::Done);
                }
                StageResult::FallbackUsed { payload, reason } => {
                    info!(scene_index = index, reason = %reason, "Audio produced by fallback synthesizer");
                    scenes[index].media.audio = Some(payload);
                    self.set_slot(index, Stage::Audio, SlotStatus::Done);
                }
                StageResult::Failed(e) => {
                    // Mandatory stage: cancel everything still in flight and
                    // fail the run.
                    tasks.abort_all();
                    return Err(self.fail(Stage::Audio, e));
                }
            }
        }
        Ok(())
    }

    async fn illustration_phase(&self, scenes: &mut [Scene], warnings: &mut Vec<SceneWarning>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls));
        let video_dir = self.config.video_dir();
        let mut tasks: JoinSet<(usize, StageResult<PathBuf>)> = JoinSet::new();

        for scene in scenes.iter() {
            let index = scene.index;
            let title = scene.title.clone();
            let dialogue = scene.dialogue();
            let runner = self.runner.clone();
            let semaphore = Arc::clone(&semaphore);
            let finder = Arc::clone(&self.collaborators.footage);
            let out_dir = video_dir.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            StageResult::Failed(StageError::transient("concurrency limiter closed")),
                        )
                    }
                };

                let result = runner
                    .run(Stage::Illustration, Some(index), || {
                        let finder = Arc::clone(&finder);
                        let title = title.clone();
                        let dialogue = dialogue.clone();
                        let dir = out_dir.clone();
                        async move { finder.find(&title, &dialogue, index, &dir).await }
                    })
                    .await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "Illustration task aborted");
                    continue;
                }
            };

            match result {
                StageResult::Success(path) | StageResult::FallbackUsed { payload: path, .. } => {
                    scenes[index].media.illustration = Some(path);
                    self.set_slot(index, Stage::Illustration, SlotStatus::Done);
                }
                StageResult::Failed(e) => {
                    warn!(
                        scene_index = index,
                        error = %e,
                        "Illustration failed; scene proceeds without this layer"
                    );
                    warnings.push(SceneWarning {
                        scene_index: index,
                        stage: Stage::Illustration,
                        message: e.to_string(),
                    });
                    self.set_slot(index, Stage::Illustration, SlotStatus::Degraded);
                }
            }
        }
    }

    async fn animation_phase(&self, scenes: &mut [Scene], warnings: &mut Vec<SceneWarning>) {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls));
        let video_dir = self.config.video_dir();
        let mut tasks: JoinSet<(usize, StageResult<Option<PathBuf>>)> = JoinSet::new();

        for scene in scenes.iter() {
            let index = scene.index;
            let scene = scene.clone();
            let runner = self.runner.clone();
            let semaphore = Arc::clone(&semaphore);
            let renderer = Arc::clone(&self.collaborators.animation);
            let out_dir = video_dir.clone();

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            StageResult::Failed(StageError::transient("concurrency limiter closed")),
                        )
                    }
                };

                let result = runner
                    .run(Stage::Animation, Some(index), || {
                        let renderer = Arc::clone(&renderer);
                        let scene = scene.clone();
                        let dir = out_dir.clone();
                        async move { renderer.render(&scene, &dir).await }
                    })
                    .await;
                (index, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "Animation task aborted");
                    continue;
                }
            };

            match result {
                StageResult::Success(Some(path))
                | StageResult::FallbackUsed {
                    payload: Some(path),
                    ..
                } => {
                    scenes[index].media.animation = Some(path);
                    self.set_slot(index, Stage::Animation, SlotStatus::Done);
                }
                // The renderer classified the scene as non-mathematical: a
                // successful empty slot, not a failure.
                StageResult::Success(None) | StageResult::FallbackUsed { payload: None, .. } => {
                    self.set_slot(index, Stage::Animation, SlotStatus::Skipped);
                }
                StageResult::Failed(e) => {
                    warn!(
                        scene_index = index,
                        error = %e,
                        "Animation failed; scene proceeds without this layer"
                    );
                    warnings.push(SceneWarning {
                        scene_index: index,
                        stage: Stage::Animation,
                        message: e.to_string(),
                    });
                    self.set_slot(index, Stage::Animation, SlotStatus::Degraded);
                }
            }
        }
    }

    fn fail(&self, stage: Stage, error: StageError) -> PipelineError {
        error!(stage = %stage, error = %error, "Pipeline run failed");
        self.set_state(RunState::Failed {
            stage,
            error: error.to_string(),
        });
        PipelineError::stage(stage, error)
    }

    fn set_state(&self, state: RunState) {
        self.status.send_modify(|s| s.state = state);
    }

    fn set_slot(&self, index: usize, stage: Stage, status: SlotStatus) {
        self.status.send_modify(|s| {
            if let Some(progress) = s.scenes.get_mut(index) {
                match stage {
                    Stage::Audio => progress.audio = status,
                    Stage::Illustration => progress.illustration = status,
                    Stage::Animation => progress.animation = status,
                    _ => {}
                }
            }
        });
    }
}

fn default_output_filename(topic: &str) -> String {
    let slug: String = topic
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    format!("{}_video.mp4", slug)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use vforge_models::{Script, TransitionDecision, TransitionKind};

    use super::*;
    use crate::collaborators::Assembly;
    use crate::config::RetryPolicy;

    struct FakeScriptGen {
        texts: Vec<&'static str>,
        fail_with: Option<StageError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ScriptGenerator for FakeScriptGen {
        async fn generate(&self, _topic: &str) -> Result<Script, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            let scenes = self
                .texts
                .iter()
                .enumerate()
                .map(|(i, text)| Scene::new(i, format!("Scene {}", i + 1), vec![text.to_string()]))
                .collect();
            Ok(Script { scenes })
        }
    }

    struct FakeSpeech {
        fail_with: Option<StageError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        async fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(e) = &self.fail_with {
                return Err(e.clone());
            }
            Ok(out_dir.join(format!("audio_{}.mp3", text.len())))
        }
    }

    struct FakeFootage {
        fail_index: Option<usize>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl FootageFinder for FakeFootage {
        async fn find(
            &self,
            _title: &str,
            _dialogue: &str,
            scene_index: usize,
            out_dir: &Path,
        ) -> Result<PathBuf, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_index == Some(scene_index) {
                return Err(StageError::content("no footage matched"));
            }
            Ok(out_dir.join(format!("footage_{}.mp4", scene_index)))
        }
    }

    struct FakeAnimation {
        math_scene: Option<usize>,
    }

    #[async_trait]
    impl AnimationRenderer for FakeAnimation {
        async fn render(
            &self,
            scene: &Scene,
            out_dir: &Path,
        ) -> Result<Option<PathBuf>, StageError> {
            if self.math_scene == Some(scene.index) {
                Ok(Some(out_dir.join(format!("manim_{}.mp4", scene.index))))
            } else {
                Ok(None)
            }
        }
    }

    struct FakeAssembler {
        calls: AtomicU32,
    }

    #[async_trait]
    impl VideoAssembler for FakeAssembler {
        async fn assemble(
            &self,
            _topic: &str,
            scenes: &[Scene],
            transitions: &[TransitionDecision],
            output: &Path,
        ) -> Result<Assembly, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // Assembly requires the transition plan to be total.
            assert_eq!(transitions.len(), scenes.len().saturating_sub(1));
            Ok(Assembly {
                output: output.to_path_buf(),
                duration_secs: scenes.len() as f64 * 10.0,
            })
        }
    }

    /// Synthesizer fake that gauges the fan-out: tracks in-flight and peak
    /// concurrent calls around a sleep, and counts completions. Scenes whose
    /// dialogue equals `fail_text` fail immediately instead.
    struct MeteredSpeech {
        in_flight: AtomicU32,
        peak: AtomicU32,
        completed: AtomicU32,
        delay: Duration,
        fail_text: Option<&'static str>,
    }

    impl MeteredSpeech {
        fn new(delay: Duration, fail_text: Option<&'static str>) -> Self {
            Self {
                in_flight: AtomicU32::new(0),
                peak: AtomicU32::new(0),
                completed: AtomicU32::new(0),
                delay,
                fail_text,
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for MeteredSpeech {
        async fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, StageError> {
            if self.fail_text == Some(text) {
                return Err(StageError::content("voice rejected"));
            }
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(out_dir.join(format!("audio_{}.mp3", text.len())))
        }
    }

    struct Fixture {
        script: Arc<FakeScriptGen>,
        speech: Arc<FakeSpeech>,
        speech_fallback: Option<Arc<FakeSpeech>>,
        footage: Arc<FakeFootage>,
        animation: Arc<FakeAnimation>,
        assembler: Arc<FakeAssembler>,
    }

    impl Fixture {
        fn new(texts: Vec<&'static str>) -> Self {
            Self {
                script: Arc::new(FakeScriptGen {
                    texts,
                    fail_with: None,
                    calls: AtomicU32::new(0),
                }),
                speech: Arc::new(FakeSpeech {
                    fail_with: None,
                    calls: AtomicU32::new(0),
                }),
                speech_fallback: None,
                footage: Arc::new(FakeFootage {
                    fail_index: None,
                    calls: AtomicU32::new(0),
                }),
                animation: Arc::new(FakeAnimation { math_scene: None }),
                assembler: Arc::new(FakeAssembler {
                    calls: AtomicU32::new(0),
                }),
            }
        }

        fn collaborators(&self) -> Collaborators {
            Collaborators {
                script: self.script.clone(),
                speech: self.speech.clone(),
                speech_fallback: self
                    .speech_fallback
                    .clone()
                    .map(|f| f as Arc<dyn SpeechSynthesizer>),
                footage: self.footage.clone(),
                animation: self.animation.clone(),
                assembler: self.assembler.clone(),
            }
        }

        fn orchestrator(&self) -> PipelineOrchestrator {
            PipelineOrchestrator::new(test_config(), self.collaborators())
        }
    }

    fn test_config() -> PipelineConfig {
        let dir = std::env::temp_dir().join(format!("vforge-test-{}", uuid_suffix()));
        PipelineConfig {
            retry: RetryPolicy::default()
                .with_max_retries(1)
                .with_base_delay(Duration::from_millis(1)),
            work_dir: dir.join("work"),
            output_dir: dir.join("out"),
            ..PipelineConfig::default()
        }
    }

    fn uuid_suffix() -> String {
        RunId::new().as_str().chars().take(8).collect()
    }

    #[tokio::test]
    async fn test_successful_run_produces_artifact() {
        let fixture = Fixture::new(vec!["plain one", "plain two", "plain three"]);
        let orchestrator = fixture.orchestrator();

        let artifact = orchestrator.run("photosynthesis", None).await.unwrap();
        assert_eq!(artifact.total_scenes, 3);
        assert_eq!(artifact.transitions.len(), 2);
        assert!(artifact.warnings.is_empty());
        assert!(artifact
            .output
            .to_string_lossy()
            .ends_with("photosynthesis_video.mp4"));
        assert_eq!(orchestrator.subscribe().borrow().state, RunState::Done);
    }

    #[tokio::test]
    async fn test_transition_decisions_follow_scene_content() {
        let fixture = Fixture::new(vec![
            "Photosynthesis converts light into chemical energy",
            "dramatic cellular changes unfold",
            "then the process begins",
        ]);
        let orchestrator = fixture.orchestrator();

        let artifact = orchestrator.run("photosynthesis", None).await.unwrap();
        assert_eq!(artifact.transitions[0].kind, TransitionKind::FadeToBlack);
        assert_eq!(artifact.transitions[1].kind, TransitionKind::FadeToBlack);
    }

    #[tokio::test]
    async fn test_script_auth_failure_invokes_no_scene_stages() {
        let mut fixture = Fixture::new(vec![]);
        fixture.script = Arc::new(FakeScriptGen {
            texts: vec![],
            fail_with: Some(StageError::auth("invalid key")),
            calls: AtomicU32::new(0),
        });
        let orchestrator = fixture.orchestrator();

        let err = orchestrator.run("topic", None).await.unwrap_err();
        assert_eq!(err.stage, Stage::Script);
        assert!(matches!(err.error, StageError::Auth(_)));
        assert_eq!(fixture.speech.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.footage.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            orchestrator.subscribe().borrow().state,
            RunState::Failed {
                stage: Stage::Script,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_audio_failure_fails_run_before_illustration() {
        let mut fixture = Fixture::new(vec!["one", "two"]);
        fixture.speech = Arc::new(FakeSpeech {
            fail_with: Some(StageError::content("voice rejected")),
            calls: AtomicU32::new(0),
        });
        let orchestrator = fixture.orchestrator();

        let err = orchestrator.run("topic", None).await.unwrap_err();
        assert_eq!(err.stage, Stage::Audio);
        // Later phases never start.
        assert_eq!(fixture.footage.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.assembler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_speech_fallback_keeps_run_alive() {
        let mut fixture = Fixture::new(vec!["one", "two"]);
        fixture.speech = Arc::new(FakeSpeech {
            fail_with: Some(StageError::transient("api down")),
            calls: AtomicU32::new(0),
        });
        fixture.speech_fallback = Some(Arc::new(FakeSpeech {
            fail_with: None,
            calls: AtomicU32::new(0),
        }));
        let orchestrator = fixture.orchestrator();

        let artifact = orchestrator.run("topic", None).await.unwrap();
        assert_eq!(artifact.total_scenes, 2);
        let fallback_calls = fixture
            .speech_fallback
            .as_ref()
            .unwrap()
            .calls
            .load(Ordering::SeqCst);
        assert_eq!(fallback_calls, 2);
    }

    #[tokio::test]
    async fn test_audio_fan_out_bounded_by_max_concurrent_calls() {
        let fixture = Fixture::new(vec!["one", "two", "three", "four", "five", "six"]);
        let speech = Arc::new(MeteredSpeech::new(Duration::from_millis(20), None));
        let config = PipelineConfig {
            max_concurrent_calls: 2,
            ..test_config()
        };
        let orchestrator = PipelineOrchestrator::new(
            config,
            Collaborators {
                speech: speech.clone(),
                ..fixture.collaborators()
            },
        );

        orchestrator.run("topic", None).await.unwrap();
        assert_eq!(speech.completed.load(Ordering::SeqCst), 6);
        assert!(speech.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_audio_failure_cancels_in_flight_scene_tasks() {
        // One scene fails fast while the other is still sleeping in its
        // synthesizer call; the failure must cancel it mid-flight.
        let fixture = Fixture::new(vec!["bad voice", "slow scene"]);
        let speech = Arc::new(MeteredSpeech::new(
            Duration::from_millis(100),
            Some("bad voice"),
        ));
        let orchestrator = PipelineOrchestrator::new(
            test_config(),
            Collaborators {
                speech: speech.clone(),
                ..fixture.collaborators()
            },
        );

        let err = orchestrator.run("topic", None).await.unwrap_err();
        assert_eq!(err.stage, Stage::Audio);

        // Long enough for an uncancelled task to have finished its sleep.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(speech.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_illustration_failure_degrades_to_warning() {
        let mut fixture = Fixture::new(vec!["one", "two", "three"]);
        fixture.footage = Arc::new(FakeFootage {
            fail_index: Some(1),
            calls: AtomicU32::new(0),
        });
        let orchestrator = fixture.orchestrator();

        let artifact = orchestrator.run("topic", None).await.unwrap();
        assert_eq!(artifact.warnings.len(), 1);
        assert_eq!(artifact.warnings[0].scene_index, 1);
        assert_eq!(artifact.warnings[0].stage, Stage::Illustration);

        let status = orchestrator.subscribe().borrow().clone();
        assert_eq!(status.scenes[1].illustration, SlotStatus::Degraded);
        assert_eq!(status.scenes[0].illustration, SlotStatus::Done);
        assert_eq!(status.state, RunState::Done);
    }

    #[tokio::test]
    async fn test_animation_skip_is_success_not_warning() {
        let mut fixture = Fixture::new(vec!["one", "two"]);
        fixture.animation = Arc::new(FakeAnimation {
            math_scene: Some(0),
        });
        let orchestrator = fixture.orchestrator();

        let artifact = orchestrator.run("topic", None).await.unwrap();
        assert!(artifact.warnings.is_empty());

        let status = orchestrator.subscribe().borrow().clone();
        assert_eq!(status.scenes[0].animation, SlotStatus::Done);
        assert_eq!(status.scenes[1].animation, SlotStatus::Skipped);
    }

    #[tokio::test]
    async fn test_empty_script_fails_run() {
        let fixture = Fixture::new(vec![]);
        let orchestrator = fixture.orchestrator();

        let err = orchestrator.run("topic", None).await.unwrap_err();
        assert_eq!(err.stage, Stage::Script);
        assert!(matches!(err.error, StageError::Content(_)));
    }

    #[test]
    fn test_default_output_filename_slug() {
        assert_eq!(
            default_output_filename("The Water Cycle"),
            "the_water_cycle_video.mp4"
        );
        assert_eq!(default_output_filename("  DNA!  "), "dna_video.mp4");
    }
}
