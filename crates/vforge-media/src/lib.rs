//! FFmpeg CLI wrapper and final video assembly for videoforge.
//!
//! Provides the low-level media compositor (pairwise transitions, concat,
//! title cards, per-scene clip building) and the [`FfmpegAssembler`], the
//! concrete `VideoAssembler` used as the pipeline's compilation stage.

pub mod assembler;
pub mod command;
pub mod compositor;
pub mod error;

pub use assembler::FfmpegAssembler;
pub use command::{probe_duration, FfmpegCommand};
pub use compositor::{FfmpegCompositor, MediaCompositor, SceneClipSpec};
pub use error::{MediaError, MediaResult};
