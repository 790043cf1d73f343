//! Manim math-animation renderer.
//!
//! Two Gemini calls drive the stage: one classifies whether the dialogue has
//! mathematical content worth animating (a negative answer is a normal skip,
//! not a failure), one writes the Manim scene code. The code is rendered by
//! invoking the `manim` CLI.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use vforge_models::{Scene, StageError};
use vforge_pipeline::AnimationRenderer;

use crate::gemini::{extract_json, GeminiClient};

/// Math-animation renderer backed by Gemini and the Manim CLI.
#[derive(Debug, Clone)]
pub struct ManimAnimationRenderer {
    gemini: GeminiClient,
}

#[derive(Debug, Deserialize)]
struct ContentAnalysis {
    needs_manim: bool,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    description: String,
}

impl ManimAnimationRenderer {
    pub fn new(gemini: GeminiClient) -> Self {
        Self { gemini }
    }

    async fn analyze(&self, dialogue: &str) -> Result<ContentAnalysis, StageError> {
        let prompt = format!(
            r#"Analyze this dialogue and determine if it contains mathematical content that would benefit from visual illustration (graphs, equations, geometric shapes, data visualization, etc.):

"{dialogue}"

Respond with JSON in this exact format:
{{"needs_manim": true/false, "content_type": "equation/graph/geometry/data/none", "description": "brief description of what should be illustrated"}}"#
        );

        let text = self.gemini.generate(&prompt, 0.3, 1000).await?;
        let json = extract_json(&text)?;
        serde_json::from_str(json)
            .map_err(|e| StageError::content(format!("Malformed content analysis: {}", e)))
    }

    async fn generate_code(&self, dialogue: &str, analysis: &ContentAnalysis) -> Result<String, StageError> {
        let prompt = format!(
            r#"Generate Manim code to create a visual illustration for this content:

Dialogue: "{dialogue}"
Content Type: {content_type}
Description: {description}

Requirements:
1. Create a class that inherits from Scene
2. Use appropriate Manim objects and animations
3. Keep it simple and clear for a 2-minute video
4. Include proper timing for animations
5. Make it visually appealing

Return only the Python code without any explanations."#,
            content_type = analysis.content_type,
            description = analysis.description,
        );

        let text = self.gemini.generate(&prompt, 0.5, 2000).await?;
        Ok(strip_code_fences(&text))
    }

    async fn render_code(
        &self,
        code: &str,
        scene_index: usize,
        out_dir: &Path,
    ) -> Result<PathBuf, StageError> {
        which::which("manim").map_err(|_| StageError::content("manim not found in PATH"))?;

        let class_name = extract_scene_class(code)
            .ok_or_else(|| StageError::content("No Scene class in generated Manim code"))?;

        let media_dir = out_dir.join("manim");
        tokio::fs::create_dir_all(&media_dir)
            .await
            .map_err(|e| StageError::transient(format!("Creating manim dir: {}", e)))?;

        let stem = format!("animation_{:03}", scene_index);
        let script = media_dir.join(format!("{}.py", stem));
        let source = format!("from manim import *\n\n{}\n", code);
        tokio::fs::write(&script, source)
            .await
            .map_err(|e| StageError::transient(format!("Writing manim script: {}", e)))?;

        debug!(scene = scene_index, class = %class_name, "Rendering Manim scene");
        let output = Command::new("manim")
            .arg(&script)
            .arg(&class_name)
            .args(["--media_dir"])
            .arg(&media_dir)
            .args(["--quality", "medium_quality", "--format", "mp4"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| StageError::transient(format!("Spawning manim: {}", e)))?;

        if !output.status.success() {
            return Err(StageError::content(format!(
                "Manim render failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // Manim's medium quality renders under videos/<stem>/720p30/.
        let rendered = media_dir
            .join("videos")
            .join(&stem)
            .join("720p30")
            .join(format!("{}.mp4", class_name));
        if !rendered.exists() {
            return Err(StageError::content(format!(
                "Manim reported success but {} is missing",
                rendered.display()
            )));
        }
        Ok(rendered)
    }
}

/// Strip markdown code fences around generated Python.
fn strip_code_fences(text: &str) -> String {
    if let Some(rest) = text.split("```python").nth(1) {
        rest.split("```").next().unwrap_or(rest).trim().to_string()
    } else if let Some(rest) = text.split("```").nth(1) {
        rest.trim().to_string()
    } else {
        text.trim().to_string()
    }
}

/// Find the name of the first class inheriting from `Scene`.
fn extract_scene_class(code: &str) -> Option<String> {
    for line in code.lines() {
        let Some(rest) = line.trim_start().strip_prefix("class ") else {
            continue;
        };
        let name: String = rest
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if name.is_empty() {
            continue;
        }
        let after = rest[name.len()..].trim_start();
        if after.starts_with('(') && after.contains("Scene") {
            return Some(name);
        }
    }
    None
}

#[async_trait::async_trait]
impl AnimationRenderer for ManimAnimationRenderer {
    async fn render(&self, scene: &Scene, out_dir: &Path) -> Result<Option<PathBuf>, StageError> {
        let dialogue = scene.dialogue();
        if dialogue.trim().is_empty() {
            return Ok(None);
        }

        let analysis = match self.analyze(&dialogue).await {
            Ok(analysis) => analysis,
            // A garbled classification is treated like "no math content";
            // real API failures still propagate.
            Err(e) if !e.is_transient() && !e.is_auth() => {
                warn!(scene = scene.index, "Content analysis unusable: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !analysis.needs_manim {
            debug!(scene = scene.index, "No mathematical content, skipping animation");
            return Ok(None);
        }

        let code = self.generate_code(&dialogue, &analysis).await?;
        let clip = self.render_code(&code, scene.index, out_dir).await?;
        info!(
            scene = scene.index,
            content_type = %analysis.content_type,
            clip = %clip.display(),
            "Rendered math animation"
        );
        Ok(Some(clip))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[test]
    fn test_extract_scene_class() {
        let code = "import math\n\nclass GraphScene(Scene):\n    def construct(self):\n        pass\n";
        assert_eq!(extract_scene_class(code).as_deref(), Some("GraphScene"));
        assert!(extract_scene_class("class Helper:\n    pass").is_none());
        assert!(extract_scene_class("def construct():\n    pass").is_none());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fences("```\nx = 2\n```"), "x = 2");
        assert_eq!(strip_code_fences("x = 3"), "x = 3");
    }

    #[tokio::test]
    async fn test_non_math_dialogue_skips() {
        let server = MockServer::start().await;
        let body = json!({
            "candidates": [{"content": {"parts": [{"text":
                "{\"needs_manim\": false, \"content_type\": \"none\", \"description\": \"\"}"
            }]}}]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let renderer =
            ManimAnimationRenderer::new(GeminiClient::new("k").with_base_url(server.uri()));
        let scene = Scene::new(0, "Story", vec!["Once upon a time.".into()]);
        let out = tempfile::tempdir().unwrap();

        let result = renderer.render(&scene, out.path()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_dialogue_skips_without_api_call() {
        let renderer = ManimAnimationRenderer::new(
            GeminiClient::new("k").with_base_url("http://127.0.0.1:1"),
        );
        let scene = Scene::new(0, "Silent", vec![]);
        let out = tempfile::tempdir().unwrap();

        let result = renderer.render(&scene, out.path()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited_analysis_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let renderer =
            ManimAnimationRenderer::new(GeminiClient::new("k").with_base_url(server.uri()));
        let scene = Scene::new(0, "Math", vec!["The slope of a line.".into()]);
        let out = tempfile::tempdir().unwrap();

        let err = renderer.render(&scene, out.path()).await.unwrap_err();
        assert!(err.is_transient());
    }
}
