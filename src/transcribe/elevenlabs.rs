//! ElevenLabs speech-to-text client.
//!
//! Uploads the extracted WAV and normalizes the word-level reply into the
//! internal [`Transcript`], with sentences assembled from the word stream.

use crate::error::{AutocutError, Result};
use crate::transcribe::SpeechToText;
use crate::transcript::{assemble_sentences, Transcript, TranscriptSegment, WordSpan};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

/// ElevenLabs speech-to-text endpoint.
const ELEVENLABS_STT_URL: &str = "https://api.elevenlabs.io/v1/speech-to-text";

/// Transcription model with word timestamps.
const MODEL_ID: &str = "scribe_v1";

/// Maximum retries for API calls.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

pub struct ElevenLabsClient {
    client: reqwest::Client,
    api_key: String,
    language: Option<String>,
    base_url: String,
}

#[derive(Deserialize, Debug)]
struct SttResponse {
    #[serde(default)]
    language_code: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    words: Vec<SttWord>,
}

#[derive(Deserialize, Debug)]
struct SttWord {
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SttErrorResponse {
    detail: SttErrorDetail,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum SttErrorDetail {
    Message { message: String },
    Text(String),
}

impl ElevenLabsClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            language: None,
            base_url: ELEVENLABS_STT_URL.to_string(),
        }
    }

    /// Set the source language (ISO 639-3 code, e.g. "eng").
    pub fn with_language(mut self, language: String) -> Self {
        self.language = Some(language);
        self
    }

    /// Override the endpoint; used by mock-server tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn build_form(&self, audio_path: &Path) -> Result<Form> {
        let file_bytes = fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let mime_type = match audio_path.extension().and_then(|e| e.to_str()) {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("m4a") => "audio/mp4",
            Some("flac") => "audio/flac",
            Some("ogg") => "audio/ogg",
            _ => "application/octet-stream",
        };

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_type)?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model_id", MODEL_ID)
            .text("tag_audio_events", "false")
            .text("diarize", "false");

        if let Some(ref lang) = self.language {
            form = form.text("language_code", lang.clone());
        }

        Ok(form)
    }

    async fn call_api(&self, form: Form) -> Result<SttResponse> {
        let response = self
            .client
            .post(&self.base_url)
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("ElevenLabs API response status: {}", status);

        if status.is_success() {
            let body = response.text().await?;
            debug!("ElevenLabs API response: {}", &body[..body.len().min(500)]);
            let parsed: SttResponse = serde_json::from_str(&body)?;
            return Ok(parsed);
        }

        let error_body = response.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<SttErrorResponse>(&error_body) {
            let message = match api_error.detail {
                SttErrorDetail::Message { message } => message,
                SttErrorDetail::Text(text) => text,
            };
            return Err(AutocutError::Api(format!(
                "ElevenLabs API error: {message}"
            )));
        }

        Err(AutocutError::Api(format!(
            "ElevenLabs API error ({status}): {error_body}"
        )))
    }

    /// Upload with retry - the form is consumed per attempt, so it is
    /// rebuilt each time.
    async fn transcribe_with_retry(&self, audio_path: &Path) -> Result<SttResponse> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!("Retry attempt {} after {}ms delay", attempt, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let form = self.build_form(audio_path).await?;

            match self.call_api(form).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    // Don't retry on client errors.
                    if e.to_string().contains("error (4") {
                        return Err(e);
                    }
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AutocutError::Api("transcription failed".to_string())))
    }
}

/// Normalize the provider reply into the internal transcript: keep spoken
/// words only, wrap them in a single segment, and assemble sentences.
fn convert_response(response: SttResponse) -> Transcript {
    let words: Vec<WordSpan> = response
        .words
        .into_iter()
        .filter(|w| w.kind.as_deref().map(|k| k == "word").unwrap_or(true))
        .map(|w| WordSpan {
            word: w.text,
            start: w.start,
            end: w.end,
        })
        .collect();

    let duration = words.last().map(|w| w.end);
    let segments = if words.is_empty() {
        Vec::new()
    } else {
        vec![TranscriptSegment {
            text: response.text.clone(),
            start: words.first().map(|w| w.start).unwrap_or(0.0),
            end: duration.unwrap_or(0.0),
            words,
        }]
    };

    let sentences = assemble_sentences(&segments);

    Transcript {
        segments,
        sentences,
        language: response.language_code,
        duration,
    }
}

#[async_trait]
impl SpeechToText for ElevenLabsClient {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript> {
        if !audio.exists() {
            return Err(AutocutError::FileNotFound(audio.display().to_string()));
        }

        let response = self.transcribe_with_retry(audio).await?;
        let transcript = convert_response(response);

        debug!(
            "Transcribed {} words into {} sentences",
            transcript.word_count(),
            transcript.sentences.len()
        );

        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "ElevenLabs"
    }
}
