//! Concrete generation services for videoforge.
//!
//! Implements the pipeline's collaborator contracts against the real
//! backends: Gemini for script writing, keyword derivation and math-content
//! detection, ElevenLabs (with a Google Translate TTS fallback) for
//! narration, Getty Images for stock footage, and the Manim CLI for math
//! animations.

pub mod gemini;
pub mod getty;
pub mod manim;
pub mod speech;

pub use gemini::{GeminiClient, GeminiScriptGenerator};
pub use getty::GettyFootageFinder;
pub use manim::ManimAnimationRenderer;
pub use speech::{ElevenLabsSynthesizer, GttsSynthesizer};
