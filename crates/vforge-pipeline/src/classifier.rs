//! Scene content classification.
//!
//! Pure keyword matching over a scene's narration text. Matching is
//! case-insensitive substring membership against four fixed keyword lists;
//! a text may match zero, one, or several categories and the full set is
//! preserved for the selector to prioritize.

use std::collections::BTreeSet;

/// A content category matched in a scene's narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Action,
    Dramatic,
    Temporal,
    Scale,
}

/// Direction implied by matched scale keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDirection {
    Growth,
    Shrink,
}

const ACTION_KEYWORDS: &[&str] = &[
    "move", "run", "walk", "travel", "journey", "go", "arrive", "leave", "fast", "quick",
];

const DRAMATIC_KEYWORDS: &[&str] = &[
    "dramatic", "emotional", "sad", "happy", "surprise", "shock", "reveal",
];

const TEMPORAL_KEYWORDS: &[&str] = &[
    "time", "then", "next", "after", "before", "meanwhile", "suddenly",
];

const SCALE_GROWTH_KEYWORDS: &[&str] = &["big", "large", "huge", "grow", "expand"];

const SCALE_SHRINK_KEYWORDS: &[&str] = &["small", "tiny", "shrink"];

fn matches_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Classify a scene's narration text into the set of matched categories.
///
/// Deterministic and side-effect free: identical text always yields the
/// identical set. Empty or whitespace-only text classifies to the empty set.
pub fn classify(text: &str) -> BTreeSet<Category> {
    let mut categories = BTreeSet::new();
    if text.trim().is_empty() {
        return categories;
    }
    let text = text.to_lowercase();

    if matches_any(&text, ACTION_KEYWORDS) {
        categories.insert(Category::Action);
    }
    if matches_any(&text, DRAMATIC_KEYWORDS) {
        categories.insert(Category::Dramatic);
    }
    if matches_any(&text, TEMPORAL_KEYWORDS) {
        categories.insert(Category::Temporal);
    }
    if matches_any(&text, SCALE_GROWTH_KEYWORDS) || matches_any(&text, SCALE_SHRINK_KEYWORDS) {
        categories.insert(Category::Scale);
    }

    categories
}

/// The zoom direction implied by a text's scale keywords, if any.
///
/// Growth wins when both growth and shrink keywords are present.
pub fn scale_direction(text: &str) -> Option<ScaleDirection> {
    let text = text.to_lowercase();
    if matches_any(&text, SCALE_GROWTH_KEYWORDS) {
        Some(ScaleDirection::Growth)
    } else if matches_any(&text, SCALE_SHRINK_KEYWORDS) {
        Some(ScaleDirection::Shrink)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_empty_set() {
        assert!(classify("").is_empty());
        assert!(classify("   \t\n ").is_empty());
    }

    #[test]
    fn test_single_category() {
        let cats = classify("A dramatic turn of events.");
        assert_eq!(cats.len(), 1);
        assert!(cats.contains(&Category::Dramatic));
    }

    #[test]
    fn test_multiple_categories_preserved() {
        let cats = classify("Then the huge wave made a dramatic entrance.");
        assert!(cats.contains(&Category::Temporal));
        assert!(cats.contains(&Category::Scale));
        assert!(cats.contains(&Category::Dramatic));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(classify("DRAMATIC").contains(&Category::Dramatic));
        assert!(classify("Suddenly!").contains(&Category::Temporal));
    }

    #[test]
    fn test_deterministic() {
        let text = "They travel fast before the reveal.";
        assert_eq!(classify(text), classify(text));
    }

    #[test]
    fn test_no_match() {
        assert!(classify("Photosynthesis converts light into chemical energy.").is_empty());
    }

    #[test]
    fn test_scale_direction_growth_wins_tie() {
        assert_eq!(
            scale_direction("cells grow and shrink"),
            Some(ScaleDirection::Growth)
        );
        assert_eq!(scale_direction("a tiny organism"), Some(ScaleDirection::Shrink));
        assert_eq!(scale_direction("nothing about size"), None);
    }
}
