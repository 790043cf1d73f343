//! Pipeline orchestration and transition-selection engine.
//!
//! The core of videoforge: sequences the five generation stages (script,
//! audio, illustration, animation, compilation) with fallback and
//! partial-failure handling, and picks a content-aware transition effect for
//! every adjacent pair of scenes before final assembly.
//!
//! External generation services plug in through the traits in
//! [`collaborators`]; the orchestrator owns all run state for the duration of
//! a run.

pub mod classifier;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod selector;
pub mod stage_runner;

pub use classifier::{classify, scale_direction, Category, ScaleDirection};
pub use collaborators::{
    AnimationRenderer, Assembly, FootageFinder, ScriptGenerator, SpeechSynthesizer, VideoAssembler,
};
pub use config::{PipelineConfig, RetryPolicy, TransitionDurations};
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use selector::TransitionSelector;
pub use stage_runner::StageRunner;
