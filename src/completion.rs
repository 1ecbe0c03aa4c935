//! Text completion client
//!
//! Talks to an OpenAI-compatible `/v1/completions` endpoint with a fixed
//! sampling policy.

use async_trait::async_trait;

use crate::{Error, Result};

/// Default completion API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default completion model
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-instruct";

/// Stop sequence; also appended to every prompt so the model knows where it ends
pub const STOP_SEQUENCE: &str = "'''";

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPolicy {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
}

/// The one sampling policy the assistant uses
pub const SAMPLING: SamplingPolicy = SamplingPolicy {
    temperature: 0.9,
    top_p: 1.0,
    max_tokens: 512,
    frequency_penalty: 0.0,
    presence_penalty: 0.6,
};

/// Produces a reply for an assembled prompt
#[async_trait(?Send)]
pub trait Completer {
    /// Complete `prompt` and return cleaned reply text
    ///
    /// # Errors
    ///
    /// Returns error if the completion service fails
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(serde::Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
    stop: [&'a str; 1],
}

#[derive(serde::Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(serde::Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Remote completion client
pub struct CompletionClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl CompletionClient {
    /// Create a client for the default `OpenAI` endpoint
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: String, model: String) -> Result<Self> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client for an OpenAI-compatible endpoint
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for completions".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    /// Model name sent with each request
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(&'a self, prompt: &str) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            prompt: format!("{prompt}\n{STOP_SEQUENCE}"),
            temperature: SAMPLING.temperature,
            max_tokens: SAMPLING.max_tokens,
            top_p: SAMPLING.top_p,
            frequency_penalty: SAMPLING.frequency_penalty,
            presence_penalty: SAMPLING.presence_penalty,
            stop: [STOP_SEQUENCE],
        }
    }
}

#[async_trait(?Send)]
impl Completer for CompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.request(prompt);
        tracing::debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "requesting completion"
        );

        let response = self
            .client
            .post(format!("{}/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(Error::Completion(format!(
                "completion API error {status}: {body}"
            )));
        }

        let body: CompletionResponse = response.json().await?;
        first_reply(body)
    }
}

fn first_reply(response: CompletionResponse) -> Result<String> {
    let raw = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.text)
        .ok_or_else(|| Error::Completion("response contained no choices".to_string()))?;

    let reply = clean_reply(&raw);
    tracing::debug!(raw_len = raw.len(), reply_len = reply.len(), "completion received");
    Ok(reply)
}

/// Strip role-label artifacts from a raw completion
///
/// Removes every newline and every literal `AI:`, then trims the ends.
/// This is lossy: words split by a newline run together, and a reply that
/// legitimately contains `AI:` loses it.
#[must_use]
pub fn clean_reply(raw: &str) -> String {
    raw.replace('\n', "").replace("AI:", "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CompletionClient {
        CompletionClient::new("sk-test".to_string(), DEFAULT_MODEL.to_string()).unwrap()
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = CompletionClient::new(String::new(), DEFAULT_MODEL.to_string());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_clean_reply() {
        assert_eq!(clean_reply("AI: The weather\nis sunny.AI:"), "The weatheris sunny.");
        assert_eq!(clean_reply(" Sure thing."), "Sure thing.");
        assert_eq!(clean_reply(""), "");
    }

    #[test]
    fn test_request_carries_sampling_policy() {
        let client = client();
        let value = serde_json::to_value(client.request("\nHuman: hi")).unwrap();

        assert_eq!(value["model"], DEFAULT_MODEL);
        assert_eq!(value["prompt"], "\nHuman: hi\n'''");
        assert_eq!(value["max_tokens"], 512);
        assert_eq!(value["stop"], serde_json::json!(["'''"]));
        assert!((value["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!((value["top_p"].as_f64().unwrap() - 1.0).abs() < 1e-6);
        assert!((value["presence_penalty"].as_f64().unwrap() - 0.6).abs() < 1e-6);
        assert!(value["frequency_penalty"].as_f64().unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_first_choice_is_used() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"text":" It is noon.\n"},{"text":"ignored"}]}"#,
        )
        .unwrap();

        assert_eq!(first_reply(response).unwrap(), "It is noon.");
    }

    #[test]
    fn test_no_choices_is_error() {
        let response: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_reply(response), Err(Error::Completion(_))));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = CompletionClient::with_base_url(
            "sk-test".to_string(),
            "m".to_string(),
            "http://localhost:8080/v1/".to_string(),
        )
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
