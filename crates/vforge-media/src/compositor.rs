//! Low-level media composition primitives.
//!
//! [`MediaCompositor`] is the seam between the assembler's orchestration and
//! actual FFmpeg invocation; [`FfmpegCompositor`] is the real implementation.
//! All clips are normalized to 1920x1080 @ 24 fps with AAC audio so pairwise
//! transition and concat filters can assume uniform streams.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use vforge_models::TransitionKind;

use crate::command::{probe_duration, FfmpegCommand};
use crate::error::{MediaError, MediaResult};

pub const FRAME_WIDTH: u32 = 1920;
pub const FRAME_HEIGHT: u32 = 1080;
pub const FPS: u32 = 24;

/// Background color for placeholder scene visuals (dark blue, matching the
/// text-overlay fallback look).
const PLACEHOLDER_COLOR: &str = "0x141432";
/// Background color for intro/outro cards.
const CARD_COLOR: &str = "0x0a0a1e";

/// Inputs for building one scene clip.
#[derive(Debug, Clone)]
pub struct SceneClipSpec {
    pub index: usize,
    pub title: String,
    /// Narration audio; defines the clip duration.
    pub audio: PathBuf,
    /// Visual layer (animation or illustration). `None` renders a
    /// placeholder color card with the scene title.
    pub visual: Option<PathBuf>,
}

/// Primitive media operations used by the assembler.
#[async_trait]
pub trait MediaCompositor: Send + Sync {
    /// Build one scene clip: visual layer looped/trimmed to the narration
    /// audio duration. Returns the clip duration in seconds.
    async fn scene_clip(&self, spec: &SceneClipSpec, output: &Path) -> MediaResult<f64>;

    /// Concatenate two clips applying the named transition at the boundary.
    async fn combine(
        &self,
        a: &Path,
        b: &Path,
        kind: TransitionKind,
        duration_secs: f64,
        output: &Path,
    ) -> MediaResult<()>;

    /// Render a full-frame text card (intro/outro) with silent audio.
    async fn title_card(&self, text: &str, duration_secs: f64, output: &Path) -> MediaResult<()>;

    /// Concatenate uniform clips back to back.
    async fn concat(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed compositor.
#[derive(Debug, Clone, Default)]
pub struct FfmpegCompositor;

impl FfmpegCompositor {
    pub fn new() -> Self {
        Self
    }

    fn encode_args(cmd: FfmpegCommand) -> FfmpegCommand {
        cmd.video_codec("libx264")
            .output_args(["-crf", "23", "-preset", "veryfast", "-pix_fmt", "yuv420p"])
            .audio_codec("aac")
            .output_args(["-ar", "44100", "-ac", "2"])
    }
}

/// FFmpeg `xfade` transition name for a transition kind.
///
/// `xfade` has no zoom-out transition; `circleclose` is the closest
/// pull-away effect. `quick_fade` is a plain fade with the shorter duration
/// the selector already assigned.
fn xfade_name(kind: TransitionKind) -> &'static str {
    match kind {
        TransitionKind::Crossfade => "fade",
        TransitionKind::FadeToBlack => "fadeblack",
        TransitionKind::ZoomIn => "zoomin",
        TransitionKind::ZoomOut => "circleclose",
        TransitionKind::QuickFade => "fade",
    }
}

/// Escape text for use inside a drawtext filter's `text='...'`.
fn escape_drawtext(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '\'' | ':' | ',' | ';' | '[' | ']' | '%' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Scale/pad filter normalizing any visual to the output frame.
fn normalize_filter() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT,
        fps = FPS
    )
}

fn centered_drawtext(text: &str, font_size: u32) -> String {
    format!(
        "drawtext=text='{}':fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
        escape_drawtext(text),
        font_size
    )
}

#[async_trait]
impl MediaCompositor for FfmpegCompositor {
    async fn scene_clip(&self, spec: &SceneClipSpec, output: &Path) -> MediaResult<f64> {
        if !spec.audio.exists() {
            return Err(MediaError::FileNotFound(spec.audio.clone()));
        }
        let duration = probe_duration(&spec.audio).await?;

        let cmd = match &spec.visual {
            Some(visual) => {
                if !visual.exists() {
                    return Err(MediaError::FileNotFound(visual.clone()));
                }
                // Loop the visual to cover the narration, trim to its length.
                FfmpegCommand::new(output)
                    .input_with_args(visual, ["-stream_loop", "-1"])
                    .input(&spec.audio)
                    .map("0:v")
                    .map("1:a")
                    .video_filter(normalize_filter())
                    .duration(duration)
            }
            None => {
                // Placeholder: color card with the scene title.
                FfmpegCommand::new(output)
                    .lavfi_input(format!(
                        "color=c={}:s={}x{}:r={}:d={:.3}",
                        PLACEHOLDER_COLOR, FRAME_WIDTH, FRAME_HEIGHT, FPS, duration
                    ))
                    .input(&spec.audio)
                    .map("0:v")
                    .map("1:a")
                    .video_filter(centered_drawtext(&spec.title, 60))
                    .duration(duration)
            }
        };

        Self::encode_args(cmd).run().await?;
        Ok(duration)
    }

    async fn combine(
        &self,
        a: &Path,
        b: &Path,
        kind: TransitionKind,
        duration_secs: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let a_duration = probe_duration(a).await?;
        // The transition overlaps the tail of the first clip.
        let offset = (a_duration - duration_secs).max(0.0);

        let filter = format!(
            "[0:v][1:v]xfade=transition={}:duration={:.3}:offset={:.3}[v];\
             [0:a][1:a]acrossfade=d={:.3}[a]",
            xfade_name(kind),
            duration_secs,
            offset,
            duration_secs
        );

        let cmd = FfmpegCommand::new(output)
            .input(a)
            .input(b)
            .filter_complex(filter)
            .map("[v]")
            .map("[a]");
        Self::encode_args(cmd).run().await
    }

    async fn title_card(&self, text: &str, duration_secs: f64, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(output)
            .lavfi_input(format!(
                "color=c={}:s={}x{}:r={}:d={:.3}",
                CARD_COLOR, FRAME_WIDTH, FRAME_HEIGHT, FPS, duration_secs
            ))
            .lavfi_input(format!("anullsrc=r=44100:cl=stereo:d={:.3}", duration_secs))
            .map("0:v")
            .map("1:a")
            .video_filter(centered_drawtext(text, 80))
            .duration(duration_secs);
        Self::encode_args(cmd).run().await
    }

    async fn concat(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()> {
        if clips.is_empty() {
            return Err(MediaError::InvalidTransitionPlan(
                "nothing to concatenate".to_string(),
            ));
        }
        if clips.len() == 1 {
            tokio::fs::copy(&clips[0], output).await?;
            return Ok(());
        }

        let mut cmd = FfmpegCommand::new(output);
        let mut filter = String::new();
        for (i, clip) in clips.iter().enumerate() {
            cmd = cmd.input(clip);
            filter.push_str(&format!("[{i}:v][{i}:a]"));
        }
        filter.push_str(&format!("concat=n={}:v=1:a=1[v][a]", clips.len()));

        let cmd = cmd.filter_complex(filter).map("[v]").map("[a]");
        Self::encode_args(cmd).run().await
    }
}
