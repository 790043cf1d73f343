//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vforge_models::TransitionKind;

/// Bounded retry policy for transient collaborator errors.
///
/// Only errors classified as transient are retried; auth and content errors
/// fail the attempt immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before the given retry attempt (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }
}

/// Default transition durations per kind, in seconds.
///
/// Configuration-provided, never computed from content.
#[derive(Debug, Clone)]
pub struct TransitionDurations {
    pub crossfade: f64,
    pub fade_to_black: f64,
    pub zoom: f64,
    pub quick_fade: f64,
}

impl Default for TransitionDurations {
    fn default() -> Self {
        Self {
            crossfade: 1.0,
            fade_to_black: 1.5,
            zoom: 1.0,
            quick_fade: 0.5,
        }
    }
}

impl TransitionDurations {
    pub fn for_kind(&self, kind: TransitionKind) -> f64 {
        match kind {
            TransitionKind::Crossfade => self.crossfade,
            TransitionKind::FadeToBlack => self.fade_to_black,
            TransitionKind::ZoomIn | TransitionKind::ZoomOut => self.zoom,
            TransitionKind::QuickFade => self.quick_fade,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrent external-collaborator calls across the per-scene
    /// fan-out (rate-limit bound).
    pub max_concurrent_calls: usize,
    /// Retry policy for transient collaborator errors.
    pub retry: RetryPolicy,
    /// Default transition durations.
    pub transitions: TransitionDurations,
    /// Work directory for generated media.
    pub work_dir: PathBuf,
    /// Output directory for compiled videos.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 4,
            retry: RetryPolicy::default(),
            transitions: TransitionDurations::default(),
            work_dir: PathBuf::from("static"),
            output_dir: PathBuf::from("static/compiled_videos"),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_calls: std::env::var("VFORGE_MAX_CONCURRENT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_calls),
            retry: RetryPolicy::default().with_max_retries(
                std::env::var("VFORGE_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.retry.max_retries),
            ),
            transitions: TransitionDurations::default(),
            work_dir: std::env::var("VFORGE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("VFORGE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        }
    }

    /// Directory for synthesized narration audio.
    pub fn audio_dir(&self) -> PathBuf {
        self.work_dir.join("audio")
    }

    /// Directory for downloaded/rendered scene visuals.
    pub fn video_dir(&self) -> PathBuf {
        self.work_dir.join("videos")
    }
}
