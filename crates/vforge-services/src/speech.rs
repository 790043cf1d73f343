//! Speech synthesis services.
//!
//! [`ElevenLabsSynthesizer`] is the primary narration voice;
//! [`GttsSynthesizer`] (Google Translate TTS) is the free fallback the
//! pipeline degrades to when ElevenLabs fails.

use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use vforge_models::StageError;
use vforge_pipeline::SpeechSynthesizer;

use crate::gemini::status_to_error;

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
const GTTS_BASE_URL: &str = "https://translate.google.com";

/// Voice ids for the narration characters.
pub fn voice_id(character: &str) -> Option<&'static str> {
    match character {
        "Daniel" => Some("onwK4e9ZLuTAKqWW03F9"),
        "Female" => Some("21m00Tcm4TlvDq8ikWAM"),
        _ => None,
    }
}

/// Random uppercase/digit suffix for unique clip filenames.
fn random_suffix(len: usize) -> String {
    use rand::Rng;
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::rng();
    (0..len)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect()
}

async fn write_clip(out_dir: &Path, bytes: &[u8]) -> Result<PathBuf, StageError> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| StageError::transient(format!("Creating audio dir: {}", e)))?;
    let path = out_dir.join(format!("audio_{}.mp3", random_suffix(4)));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| StageError::transient(format!("Writing audio clip: {}", e)))?;
    Ok(path)
}

/// ElevenLabs text-to-speech client.
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    api_key: String,
    base_url: String,
    voice_id: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct TtsRequest {
    text: String,
    model_id: String,
    voice_settings: VoiceSettings,
}

#[derive(Debug, Serialize)]
struct VoiceSettings {
    stability: f64,
    similarity_boost: f64,
}

impl ElevenLabsSynthesizer {
    /// Create a synthesizer from the `ELEVEN_LABS_API` environment variable,
    /// narrated by the "Daniel" voice.
    pub fn from_env() -> Result<Self, StageError> {
        let api_key = std::env::var("ELEVEN_LABS_API")
            .map_err(|_| StageError::auth("ELEVEN_LABS_API not set"))?;
        Ok(Self::new(api_key, voice_id("Daniel").unwrap_or_default()))
    }

    pub fn new(api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: ELEVENLABS_BASE_URL.to_string(),
            voice_id: voice_id.into(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, StageError> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, self.voice_id);
        let request = TtsRequest {
            text: text.to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.5,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| StageError::transient(format!("ElevenLabs request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error("ElevenLabs", status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| StageError::transient(format!("Reading ElevenLabs audio: {}", e)))?;

        let path = write_clip(out_dir, &bytes).await?;
        info!(clip = %path.display(), chars = text.len(), "Synthesized narration");
        Ok(path)
    }
}

/// Google Translate TTS fallback.
///
/// The endpoint caps the query length, so long dialogue is synthesized in
/// chunks and the MP3 frames are appended into one clip.
#[derive(Debug, Clone)]
pub struct GttsSynthesizer {
    base_url: String,
    lang: String,
    client: Client,
}

const GTTS_CHUNK_CHARS: usize = 180;

/// Split text into whitespace-respecting chunks of at most `max_chars`.
fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl Default for GttsSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl GttsSynthesizer {
    pub fn new() -> Self {
        Self {
            base_url: GTTS_BASE_URL.to_string(),
            lang: "en".to_string(),
            client: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for GttsSynthesizer {
    async fn synthesize(&self, text: &str, out_dir: &Path) -> Result<PathBuf, StageError> {
        let chunks = chunk_text(text, GTTS_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(StageError::content("Nothing to synthesize"));
        }

        let mut bytes = Vec::new();
        for chunk in &chunks {
            let url = format!(
                "{}/translate_tts?ie=UTF-8&client=tw-ob&tl={}&q={}",
                self.base_url,
                self.lang,
                urlencoding::encode(chunk)
            );
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| StageError::transient(format!("gTTS request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(status_to_error("gTTS", status, &body));
            }

            bytes.extend_from_slice(
                &response
                    .bytes()
                    .await
                    .map_err(|e| StageError::transient(format!("Reading gTTS audio: {}", e)))?,
            );
        }

        let path = write_clip(out_dir, &bytes).await?;
        debug!(clip = %path.display(), chunks = chunks.len(), "Synthesized fallback narration");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn test_elevenlabs_writes_clip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/voice123"))
            .and(header("xi-api-key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3data".to_vec()))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let synth = ElevenLabsSynthesizer::new("secret", "voice123").with_base_url(server.uri());
        let clip = synth.synthesize("Hello world.", out.path()).await.unwrap();

        assert!(clip.starts_with(out.path()));
        assert_eq!(std::fs::read(&clip).unwrap(), b"mp3data");
    }

    #[tokio::test]
    async fn test_elevenlabs_bad_key_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let synth = ElevenLabsSynthesizer::new("bad", "voice123").with_base_url(server.uri());
        let err = synth.synthesize("Hello.", out.path()).await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_gtts_appends_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_tts"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"X".to_vec()))
            .mount(&server)
            .await;

        let out = tempfile::tempdir().unwrap();
        let synth = GttsSynthesizer::new().with_base_url(server.uri());
        let long_text = "word ".repeat(100);
        let clip = synth.synthesize(&long_text, out.path()).await.unwrap();

        // 500 chars of dialogue needs several chunks, one byte each here.
        assert!(std::fs::read(&clip).unwrap().len() > 1);
    }

    #[test]
    fn test_chunk_text_respects_word_boundaries() {
        let chunks = chunk_text("alpha beta gamma delta", 11);
        assert_eq!(chunks, vec!["alpha beta", "gamma delta"]);
        for chunk in &chunks {
            assert!(chunk.len() <= 11);
        }
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("   ", 100).is_empty());
    }

    #[test]
    fn test_voice_ids() {
        assert_eq!(voice_id("Daniel"), Some("onwK4e9ZLuTAKqWW03F9"));
        assert!(voice_id("Unknown").is_none());
    }
}
