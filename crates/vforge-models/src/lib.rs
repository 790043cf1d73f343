//! Shared data models for the videoforge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Scripts and scenes (the atomic unit of per-stage work)
//! - Pipeline stages and stage results
//! - The stage error taxonomy driving retry/fallback policy
//! - Transition kinds and per-pair transition decisions
//! - Pipeline runs, run state, and run status reporting

pub mod error;
pub mod run;
pub mod script;
pub mod stage;
pub mod transition;

// Re-export common types
pub use error::StageError;
pub use run::{Artifact, RunId, RunState, RunStatus, SceneProgress, SceneWarning, SlotStatus};
pub use script::{Scene, SceneMedia, Script};
pub use stage::{Stage, StageResult};
pub use transition::{TransitionDecision, TransitionKind};
