//! Image generation through OpenRouter's image-capable chat models.

use crate::error::{AutocutError, Result};
use crate::images::generate::ImageGenerator;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// OpenRouter chat-completions endpoint.
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default image model.
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-image";

/// Maximum retries for API calls.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

pub struct OpenRouterImageClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    messages: Vec<ImageMessage<'a>>,
    modalities: [&'a str; 2],
}

#[derive(Serialize)]
struct ImageMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    choices: Option<Vec<ImageChoice>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ImageChoice {
    message: Option<ImageResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ImageResponseMessage {
    images: Option<Vec<GeneratedImage>>,
}

#[derive(Deserialize, Debug)]
struct GeneratedImage {
    image_url: Option<ImageUrl>,
}

#[derive(Deserialize, Debug)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

impl OpenRouterImageClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENROUTER_API_URL.to_string(),
        }
    }

    /// Set a different image model (e.g. "black-forest-labs/flux.2-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the endpoint; used by mock-server tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_api(&self, prompt: &str) -> Result<Vec<u8>> {
        let request = ImageRequest {
            model: &self.model,
            messages: vec![ImageMessage {
                role: "user",
                content: prompt,
            }],
            modalities: ["image", "text"],
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!("OpenRouter image response status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            return Err(AutocutError::Api(format!(
                "OpenRouter image error ({status}): {body}"
            )));
        }

        let parsed: ImageResponse = serde_json::from_str(&body)?;
        if let Some(error) = parsed.error {
            return Err(AutocutError::Api(format!(
                "OpenRouter image error: {}",
                error.message
            )));
        }

        let url = parsed
            .choices
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.message)
            .and_then(|m| m.images)
            .and_then(|mut images| images.drain(..).next())
            .and_then(|i| i.image_url)
            .map(|u| u.url)
            .ok_or_else(|| AutocutError::Api("no image in OpenRouter reply".to_string()))?;

        decode_data_url(&url)
    }
}

/// Decode a `data:image/...;base64,...` payload.
fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .split_once(";base64,")
        .map(|(_, data)| data)
        .ok_or_else(|| {
            let preview: String = url.chars().take(60).collect();
            AutocutError::Api(format!("image URL is not a base64 data URL: {preview}"))
        })?;

    BASE64
        .decode(payload.trim())
        .map_err(|e| AutocutError::Api(format!("invalid base64 image payload: {e}")))
}

#[async_trait]
impl ImageGenerator for OpenRouterImageClient {
    fn name(&self) -> &'static str {
        "OpenRouter"
    }

    async fn generate(&self, prompt: &str, output: &Path) -> Result<()> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!("Retry attempt {} after {}ms delay", attempt, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.call_api(prompt).await {
                Ok(bytes) => {
                    tokio::fs::write(output, &bytes).await?;
                    debug!("Wrote {} bytes to {}", bytes.len(), output.display());
                    return Ok(());
                }
                Err(e) => {
                    // Client errors never heal on retry.
                    if e.to_string().contains("error (4") {
                        return Err(e);
                    }
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AutocutError::Api("image generation failed".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        let bytes = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_rejects_plain_url() {
        assert!(decode_data_url("https://example.com/image.png").is_err());
    }

    #[test]
    fn test_client_builder() {
        let client = OpenRouterImageClient::new("key".to_string()).with_model("test/model");
        assert_eq!(client.model, "test/model");
        assert_eq!(client.name(), "OpenRouter");
    }
}
