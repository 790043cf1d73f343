//! Transition kinds and per-pair transition decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Visual effect applied at the boundary between two adjacent scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Crossfade,
    FadeToBlack,
    ZoomIn,
    ZoomOut,
    QuickFade,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Crossfade => "crossfade",
            TransitionKind::FadeToBlack => "fade_to_black",
            TransitionKind::ZoomIn => "zoom_in",
            TransitionKind::ZoomOut => "zoom_out",
            TransitionKind::QuickFade => "quick_fade",
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One transition decision for an adjacent scene pair.
///
/// For N scenes there are exactly N-1 decisions, one per adjacent pair with
/// no gaps. The duration is configuration-provided per kind, not computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionDecision {
    pub from_scene: usize,
    pub to_scene: usize,
    pub kind: TransitionKind,
    pub duration_secs: f64,
    /// Which selection rule produced this decision (for run reports).
    pub reason: String,
}
