//! Groq chat completions client.
//!
//! Speaks the OpenAI-compatible API: `POST {base_url}/chat/completions` and
//! `GET {base_url}/models`, authenticated with a bearer API key.

use crate::ai::{ChatCompletion, ChatMessage, ChatProvider, ModelInfo, Usage};
use crate::config::GroqConfig;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Sampling parameters sent with every completion request.
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 4096;
const TOP_P: f32 = 1.0;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// The concrete [`ChatProvider`] backed by the Groq API.
pub struct GroqProvider {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    model: String,
    request_timeout: Duration,
}

impl GroqProvider {
    pub fn new(config: &GroqConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            request_timeout: config.timeout,
        })
    }

    fn endpoint(&self, path: &str) -> anyhow::Result<Url> {
        ensure_slash(&self.base_url)
            .join(path)
            .map_err(|e| anyhow!("failed to construct {path} URL: {e}"))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

/// Makes sure a url has a trailing slash.
///
/// `Url::join` drops the last path segment when it lacks a trailing slash:
/// joining '/openai/v1' with 'models' yields '/openai/models'. Call this
/// before calling `.join`.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<ChatCompletion> {
        let url = self.endpoint("chat/completions")?;
        debug!("Requesting completion from {} with {} messages", url, messages.len());

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            top_p: TOP_P,
            stream: false,
        };

        let response = self
            .authorize(self.client.post(url.clone()))
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Groq completions request to {url} failed: {status} - {body}");
            return Err(anyhow!("Groq API error: {status} - {body}"));
        }

        let completion: ChatCompletionResponse =
            response.json().await.context("error decoding completions response body")?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Groq API returned no completion choices"))?;

        Ok(ChatCompletion {
            content: choice.message.content,
            model: completion.model,
            usage: completion.usage,
        })
    }

    async fn list_models(&self) -> anyhow::Result<Vec<ModelInfo>> {
        let url = self.endpoint("models")?;
        debug!("Fetching models from {url}");

        let response = self
            .authorize(self.client.get(url.clone()))
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Groq models request to {url} failed: {status} - {body}");
            return Err(anyhow!("Groq API error: {status} - {body}"));
        }

        let models: ModelsResponse = response.json().await.context("error decoding models response body")?;
        Ok(models.data)
    }
}
