//! Content-aware transition selection.
//!
//! Consumes classifier output for a pair of adjacent scenes and picks one
//! transition kind plus its configured duration. The priority order is an
//! explicit ordered rule list evaluated top to bottom, first match wins:
//!
//! 1. Dramatic (either scene)        -> fade_to_black
//! 2. Temporal (either scene)        -> quick_fade
//! 3. Scale (either scene)           -> zoom_in / zoom_out by direction
//! 4. Action (either scene)          -> zoom_in
//! 5. default                        -> crossfade
//!
//! This total order is the canonical resolution for scenes matching multiple
//! categories. Selection is pure and deterministic, and never fails: missing
//! or unclassifiable text falls through to the default rule.

use std::collections::BTreeSet;

use vforge_models::{Scene, TransitionDecision, TransitionKind};

use crate::classifier::{classify, scale_direction, Category, ScaleDirection};
use crate::config::TransitionDurations;

/// Classifier output for one adjacent pair, unioned over both scenes.
#[derive(Debug)]
struct PairProfile {
    categories: BTreeSet<Category>,
    scale: Option<ScaleDirection>,
}

impl PairProfile {
    fn from_texts(a: &str, b: &str) -> Self {
        let mut categories = classify(a);
        categories.extend(classify(b));
        // Growth wins when the pair contains both directions.
        let scale = match (scale_direction(a), scale_direction(b)) {
            (Some(ScaleDirection::Growth), _) | (_, Some(ScaleDirection::Growth)) => {
                Some(ScaleDirection::Growth)
            }
            (Some(ScaleDirection::Shrink), _) | (_, Some(ScaleDirection::Shrink)) => {
                Some(ScaleDirection::Shrink)
            }
            (None, None) => None,
        };
        Self { categories, scale }
    }
}

type Rule = (&'static str, fn(&PairProfile) -> Option<TransitionKind>);

/// Ordered (predicate, outcome) rules. Priority is positional.
const RULES: &[Rule] = &[
    ("dramatic", |p| {
        p.categories
            .contains(&Category::Dramatic)
            .then_some(TransitionKind::FadeToBlack)
    }),
    ("temporal", |p| {
        p.categories
            .contains(&Category::Temporal)
            .then_some(TransitionKind::QuickFade)
    }),
    ("scale", |p| {
        if !p.categories.contains(&Category::Scale) {
            return None;
        }
        match p.scale {
            Some(ScaleDirection::Shrink) => Some(TransitionKind::ZoomOut),
            // Scale matched without a direction cannot happen with the fixed
            // keyword lists, but growth is the safe default.
            _ => Some(TransitionKind::ZoomIn),
        }
    }),
    ("action", |p| {
        p.categories
            .contains(&Category::Action)
            .then_some(TransitionKind::ZoomIn)
    }),
];

const DEFAULT_RULE: &str = "default";

/// Selects a transition for each adjacent scene pair.
#[derive(Debug, Clone, Default)]
pub struct TransitionSelector {
    durations: TransitionDurations,
}

impl TransitionSelector {
    pub fn new(durations: TransitionDurations) -> Self {
        Self { durations }
    }

    /// Decide the transition between two adjacent scenes.
    ///
    /// Never fails; a pair with no matched keywords gets the default
    /// crossfade.
    pub fn select(&self, a: &Scene, b: &Scene) -> TransitionDecision {
        let profile = PairProfile::from_texts(&a.dialogue(), &b.dialogue());

        let (reason, kind) = RULES
            .iter()
            .find_map(|(name, rule)| rule(&profile).map(|kind| (*name, kind)))
            .unwrap_or((DEFAULT_RULE, TransitionKind::Crossfade));

        TransitionDecision {
            from_scene: a.index,
            to_scene: b.index,
            kind,
            duration_secs: self.durations.for_kind(kind),
            reason: reason.to_string(),
        }
    }

    /// Decide transitions for every adjacent pair of the ordered scene list.
    ///
    /// For N scenes this returns exactly N-1 decisions with no gaps.
    pub fn select_all(&self, scenes: &[Scene]) -> Vec<TransitionDecision> {
        scenes
            .windows(2)
            .map(|pair| self.select(&pair[0], &pair[1]))
            .collect()
    }
}
