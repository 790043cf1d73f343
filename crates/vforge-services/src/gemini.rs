//! Gemini API client and the script generation service built on it.
//!
//! One shared [`GeminiClient`] handles request shape, HTTP status mapping,
//! and extraction of the JSON object Gemini wraps in prose or code fences.
//! Service types (script generation here, content detection in the Manim
//! renderer, keyword generation in the Getty finder) compose it.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vforge_models::{Scene, Script, StageError};
use vforge_pipeline::ScriptGenerator;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

impl GeminiClient {
    /// Create a client from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, StageError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| StageError::auth("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a prompt and return the raw response text.
    pub async fn generate(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, StageError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens,
            },
        };

        debug!(model = %self.model, "Calling Gemini API");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::transient(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error("Gemini", status, &body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| StageError::content(format!("Malformed Gemini response: {}", e)))?;

        parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| StageError::content("Gemini response has no candidates"))
    }
}

/// Map an HTTP error status to a stage error.
///
/// 401/403 are credential problems and abort the run; 429 and 5xx are worth
/// retrying; anything else means the request itself was bad.
pub(crate) fn status_to_error(service: &str, status: StatusCode, body: &str) -> StageError {
    let message = format!("{} returned {}: {}", service, status, body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        StageError::auth(message)
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StageError::transient(message)
    } else {
        StageError::content(message)
    }
}

/// Extract the outermost JSON object from model output, tolerating prose and
/// code fences around it.
pub(crate) fn extract_json(text: &str) -> Result<&str, StageError> {
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(&text[s..=e]),
        _ => Err(StageError::content("No JSON object in model output")),
    }
}

/// Script generation via Gemini.
#[derive(Debug, Clone)]
pub struct GeminiScriptGenerator {
    client: GeminiClient,
}

/// Average narration speaking rate (150 words per minute).
const WORDS_PER_SECOND: f64 = 2.5;

/// Estimate the spoken duration of narration text.
fn estimate_duration_secs(text: &str) -> f64 {
    text.split_whitespace().count() as f64 / WORDS_PER_SECOND
}

#[derive(Debug, Deserialize)]
struct RawScript {
    scenes: Vec<RawScene>,
}

#[derive(Debug, Deserialize)]
struct RawScene {
    title: String,
    content: Vec<String>,
}

impl GeminiScriptGenerator {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    fn prompt(topic: &str) -> String {
        format!(
            r#"Write a 2 min video script of this topic in an interactive way: "{topic}"

I want this in a json format with strictly these keys:
{{"scenes": [{{"title": "", "content": ["line1", "line2"]}}]}}

Make sure:
- The script is engaging and interactive
- Each scene has a clear title
- Content is broken down into digestible lines
- Total duration should be around 2 minutes when spoken
- Include 5-7 scenes for good pacing
- Do not include extra instructions or comments in the script, just the dialogue
"#
        )
    }
}

#[async_trait::async_trait]
impl ScriptGenerator for GeminiScriptGenerator {
    async fn generate(&self, topic: &str) -> Result<Script, StageError> {
        let text = self.client.generate(&Self::prompt(topic), 0.7, 2000).await?;
        let json = extract_json(&text)?;
        let raw: RawScript = serde_json::from_str(json)
            .map_err(|e| StageError::content(format!("Malformed script JSON: {}", e)))?;

        let scenes = raw
            .scenes
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let mut scene = Scene::new(i, s.title, s.content);
                scene.duration_estimate = estimate_duration_secs(&scene.dialogue());
                scene
            })
            .collect();
        let script = Script { scenes };
        info!(topic, scenes = script.len(), "Generated script");
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn gemini_body(text: &str) -> serde_json::Value {
        json!({
            "candidates": [
                {"content": {"parts": [{"text": text}]}}
            ]
        })
    }

    async fn generator(server: &MockServer) -> GeminiScriptGenerator {
        GeminiScriptGenerator::new(GeminiClient::new("test-key").with_base_url(server.uri()))
    }

    #[tokio::test]
    async fn test_generates_script_from_fenced_json() {
        let server = MockServer::start().await;
        let script_json = json!({
            "scenes": [
                {"title": "Intro", "content": ["Hello.", "Welcome."]},
                {"title": "Body", "content": ["Details."]}
            ]
        });
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gemini_body(&format!(
                "```json\n{}\n```",
                script_json
            ))))
            .mount(&server)
            .await;

        let script = generator(&server).await.generate("Gravity").await.unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.scenes[0].title, "Intro");
        assert_eq!(script.scenes[0].dialogue(), "Hello. Welcome.");
        assert_eq!(script.scenes[1].index, 1);
        // Two words of narration at 2.5 words/second.
        assert!((script.scenes[0].duration_estimate - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_estimate_duration_from_word_count() {
        assert_eq!(estimate_duration_secs("one two three four five"), 2.0);
        assert_eq!(estimate_duration_secs(""), 0.0);
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = generator(&server).await.generate("T").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = generator(&server).await.generate("T").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_prose_without_json_is_content_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(gemini_body("I cannot write that script.")),
            )
            .mount(&server)
            .await;

        let err = generator(&server).await.generate("T").await.unwrap_err();
        assert!(!err.is_transient());
        assert!(!err.is_auth());
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json(r#"before {"a": 1} after"#).unwrap(), r#"{"a": 1}"#);
        assert!(extract_json("no json here").is_err());
    }
}
