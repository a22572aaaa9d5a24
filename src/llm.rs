//! # Generation Backends
//!
//! Prompt in, text out. The agent only ever sees the [`TextGenerator`] trait;
//! the concrete backends wrap the OpenAI chat API and Google's Generative
//! Language API.

use crate::error::{TipError, TipResult};
use async_trait::async_trait;
use log::{debug, error};
use openai::chat::{ChatCompletion, ChatCompletionMessage, ChatCompletionMessageRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Sampling parameters for one call. `None` leaves the provider default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
}

impl GenerationOptions {
    pub fn with_temperature(temperature: f32) -> Self {
        GenerationOptions {
            temperature: Some(temperature),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> TipResult<String>;
}

#[async_trait]
impl<G: TextGenerator + ?Sized> TextGenerator for Arc<G> {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> TipResult<String> {
        (**self).generate(prompt, options).await
    }
}

/// Chat completion through the `openai` crate. The API key is installed
/// globally with `openai::set_key` at startup.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    model: String,
}

impl OpenAiGenerator {
    pub fn new(model: impl Into<String>) -> Self {
        OpenAiGenerator { model: model.into() }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> TipResult<String> {
        let messages = vec![ChatCompletionMessage {
            role: ChatCompletionMessageRole::User,
            content: Some(prompt.to_string()),
            name: None,
            function_call: None,
            tool_call_id: None,
            tool_calls: None,
        }];

        let mut builder = ChatCompletion::builder(&self.model, messages);
        if let Some(temperature) = options.temperature {
            builder = builder.temperature(temperature);
        }

        debug!("Requesting completion from {} ({} prompt chars)", self.model, prompt.len());
        let completion = builder
            .create()
            .await
            .map_err(|e| TipError::Generation(format!("OpenAI error: {}", e)))?;

        completion
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| TipError::Generation("No response from OpenAI".to_string()))
    }
}

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Deserialize, Debug)]
struct GeminiErrorDetails {
    message: String,
    status: Option<String>,
}

/// Google Generative Language API over plain HTTPS.
#[derive(Clone)]
pub struct GeminiGenerator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(api_key: String, model: impl Into<String>) -> Self {
        GeminiGenerator {
            api_key,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> TipResult<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: options
                .temperature
                .map(|temperature| GeminiGenerationConfig { temperature }),
        };

        debug!("Sending request to Gemini model {}", self.model);
        let response = self
            .client
            .post(format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| TipError::Generation(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| TipError::Generation(format!("Gemini response unreadable: {}", e)))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<GeminiError>(&response_text) {
                Ok(error_response) => {
                    error!(
                        "Gemini API error: {} (status: {:?})",
                        error_response.error.message, error_response.error.status
                    );
                    TipError::Generation(format!("Gemini error: {}", error_response.error.message))
                }
                Err(_) => {
                    error!("Gemini API error (status {}): {}", status, response_text);
                    TipError::Generation(format!("Gemini API error (status {})", status))
                }
            });
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| TipError::Generation(format!("Failed to parse Gemini response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|part| part.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(TipError::Generation("No candidates in Gemini response".to_string()));
        }
        Ok(text)
    }
}

/// Bounds every call of the wrapped generator. A hung provider would
/// otherwise stall the whole post.
pub struct TimeoutGenerator<G> {
    inner: G,
    timeout: Duration,
}

impl<G> TimeoutGenerator<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        TimeoutGenerator { inner, timeout }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for TimeoutGenerator<G> {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> TipResult<String> {
        match tokio::time::timeout(self.timeout, self.inner.generate(prompt, options)).await {
            Ok(result) => result,
            Err(_) => Err(TipError::Generation(format!(
                "timed out after {}s",
                self.timeout.as_secs_f32()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedGenerator;

    struct Stalled;

    #[async_trait]
    impl TextGenerator for Stalled {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> TipResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_generator_fails_slow_calls() {
        let generator = TimeoutGenerator::new(Stalled, Duration::from_millis(20));
        let err = generator.generate("hi", &GenerationOptions::default()).await.unwrap_err();
        assert!(matches!(err, TipError::Generation(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_timeout_generator_passes_fast_calls_through() {
        let generator = TimeoutGenerator::new(ScriptedGenerator::repeating("quick"), Duration::from_secs(1));
        let text = generator.generate("hi", &GenerationOptions::with_temperature(1.5)).await.unwrap();
        assert_eq!(text, "quick");
    }

    #[test]
    fn test_gemini_request_shape() {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: "prompt" }],
            }],
            generation_config: Some(GeminiGenerationConfig { temperature: 1.5 }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "prompt");
        assert_eq!(value["generationConfig"]["temperature"], 1.5);
    }

    #[test]
    fn test_gemini_response_parsing_tolerates_missing_parts() {
        let parsed: GeminiResponse = serde_json::from_str(r#"{"candidates":[{"content":{}}]}"#).unwrap();
        assert!(parsed.candidates[0].content.as_ref().unwrap().parts.is_empty());

        let parsed: GeminiResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
