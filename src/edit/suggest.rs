//! Edit suggestions via the OpenRouter chat-completions API.
//!
//! The model sees the sentence list with ids and timings and proposes which
//! sentences to remove. The reply is advisory: it is converted into the
//! human-editable decision file and reviewed before anything is cut.

use crate::error::{AutocutError, Result};
use crate::transcript::{Sentence, SentenceId};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// OpenRouter chat-completions endpoint.
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model for editing suggestions.
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Maximum retries for API calls.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
const BASE_DELAY_MS: u64 = 1000;

const SUGGESTION_PROMPT: &str = r#"You are a video editing assistant. The transcript below lists every
spoken sentence of a long-form video as `[start-end]-text`, numbered by id.

Identify sentences that should be removed: false starts, repeated takes,
filler, and tangents that hurt the flow. Keep the video coherent; when in
doubt, keep the sentence.

Respond with a JSON object in exactly this format:
{
    "thoughts": "your reasoning about the edit",
    "sentences_to_remove": [4, 17, 18]
}

Transcript:
"#;

/// Parsed suggestion reply.
#[derive(Debug, Clone, Deserialize)]
pub struct EditSuggestion {
    #[serde(default)]
    pub thoughts: String,
    pub sentences_to_remove: Vec<SentenceId>,
}

/// OpenRouter chat-completions client for edit suggestions.
pub struct SuggestionClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize, Debug)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

impl SuggestionClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENROUTER_API_URL.to_string(),
        }
    }

    /// Set a different model (e.g. "anthropic/claude-sonnet-4.5").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the endpoint; used by mock-server tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Format the numbered transcript for the prompt.
    fn build_prompt(&self, sentences: &[Sentence]) -> String {
        let mut prompt = String::from(SUGGESTION_PROMPT);
        for sentence in sentences {
            prompt.push_str(&format!(
                "{}: [{:.2}-{:.2}]-{}\n",
                sentence.id, sentence.start, sentence.end, sentence.text
            ));
        }
        prompt
    }

    async fn call_api(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
            max_tokens: 4000,
        };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        debug!("OpenRouter response status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<ChatResponse>(&body) {
                if let Some(error) = parsed.error {
                    return Err(AutocutError::Api(format!(
                        "OpenRouter error: {}",
                        error.message
                    )));
                }
            }
            return Err(AutocutError::Api(format!(
                "OpenRouter error ({status}): {body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        if let Some(error) = parsed.error {
            return Err(AutocutError::Api(format!(
                "OpenRouter error: {}",
                error.message
            )));
        }

        parsed
            .choices
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or_else(|| AutocutError::Api("OpenRouter reply had no content".to_string()))
    }

    /// Ask the model which sentences to remove.
    pub async fn suggest(&self, sentences: &[Sentence]) -> Result<EditSuggestion> {
        let prompt = self.build_prompt(sentences);

        let mut last_error = None;
        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt - 1);
                debug!("Retry attempt {} after {}ms delay", attempt, delay);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.call_api(&prompt).await {
                Ok(reply) => {
                    let suggestion = parse_suggestion(&reply)?;
                    return validate_suggestion(suggestion, sentences);
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AutocutError::Api("suggestion request failed".to_string())))
    }
}

/// Extract the JSON object from a reply that may wrap it in a code fence.
pub fn parse_suggestion(reply: &str) -> Result<EditSuggestion> {
    let fenced = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("static regex");
    let payload = fenced
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(reply)
        .trim();

    serde_json::from_str(payload)
        .map_err(|e| AutocutError::Api(format!("unparseable suggestion reply: {e}")))
}

/// Drop removal ids the transcript does not contain; the model occasionally
/// hallucinates an id past the end of the list.
fn validate_suggestion(
    mut suggestion: EditSuggestion,
    sentences: &[Sentence],
) -> Result<EditSuggestion> {
    let known: std::collections::BTreeSet<SentenceId> =
        sentences.iter().map(|s| s.id).collect();
    let before = suggestion.sentences_to_remove.len();
    suggestion.sentences_to_remove.retain(|id| known.contains(id));
    if suggestion.sentences_to_remove.len() != before {
        warn!(
            "Suggestion referenced {} unknown sentence id(s); ignored",
            before - suggestion.sentences_to_remove.len()
        );
    }
    Ok(suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suggestion_plain_json() {
        let reply = r#"{"thoughts": "cut the retake", "sentences_to_remove": [2, 5]}"#;
        let suggestion = parse_suggestion(reply).unwrap();
        assert_eq!(suggestion.thoughts, "cut the retake");
        assert_eq!(
            suggestion.sentences_to_remove,
            vec![SentenceId(2), SentenceId(5)]
        );
    }

    #[test]
    fn test_parse_suggestion_fenced() {
        let reply = "Here you go:\n```json\n{\"thoughts\": \"ok\", \"sentences_to_remove\": [\"3\"]}\n```";
        let suggestion = parse_suggestion(reply).unwrap();
        assert_eq!(suggestion.sentences_to_remove, vec![SentenceId(3)]);
    }

    #[test]
    fn test_parse_suggestion_rejects_garbage() {
        assert!(parse_suggestion("I could not decide, sorry.").is_err());
    }

    #[test]
    fn test_build_prompt_numbers_sentences() {
        let client = SuggestionClient::new("test-key".to_string());
        let sentences = vec![Sentence {
            id: SentenceId(4),
            text: "Keep rolling.".to_string(),
            start: 1.5,
            end: 3.25,
            words: vec![],
        }];

        let prompt = client.build_prompt(&sentences);
        assert!(prompt.contains("4: [1.50-3.25]-Keep rolling."));
    }
}
