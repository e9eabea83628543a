//! OpenAI-compatible embedding and chat backends.
//!
//! This module is only available when the `openai` feature is enabled. The
//! base URL is configurable, so any server speaking the OpenAI wire format
//! (a local Ollama, vLLM or LiteLLM proxy) works too.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, LanguageModelService, TurnRole};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Output size of `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const PROVIDER: &str = "OpenAI";

/// Authenticated JSON client shared by both services.
#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ApiClient {
    fn new(api_key: String) -> std::result::Result<Self, String> {
        if api_key.trim().is_empty() {
            return Err("API key must not be empty".to_string());
        }
        Ok(Self { http: reqwest::Client::new(), api_key, base_url: DEFAULT_BASE_URL.to_string() })
    }

    fn api_key_from_env() -> std::result::Result<String, String> {
        std::env::var("OPENAI_API_KEY")
            .map_err(|_| "OPENAI_API_KEY environment variable not set".to_string())
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(format!("API returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("failed to parse response: {e}"))
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message }
}

fn generation_error(message: String) -> RagError {
    RagError::GenerationError { provider: PROVIDER.into(), message }
}

// ── Embeddings ────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] backed by the `/embeddings` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use tutor_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// let embedding = provider.embed("What is a food chain?").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: ApiClient,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = ApiClient::new(api_key.into()).map_err(embedding_error)?;
        Ok(Self {
            client,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(ApiClient::api_key_from_env().map_err(embedding_error)?)
    }

    /// Point the provider at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request truncated embeddings; also changes [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let mut response: EmbeddingResponse =
            self.client.post("embeddings", &request).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "embedding request failed");
                embedding_error(message)
            })?;

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ── Chat completions ──────────────────────────────────────────────

/// A [`LanguageModelService`] backed by the `/chat/completions` endpoint.
///
/// The model is instructed to answer only from the supplied textbook
/// excerpts and to pitch the explanation at the student's grade.
pub struct OpenAIChatService {
    client: ApiClient,
    model: String,
    temperature: f32,
}

impl OpenAIChatService {
    /// Create a service with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = ApiClient::new(api_key.into()).map_err(generation_error)?;
        Ok(Self { client, model: DEFAULT_CHAT_MODEL.into(), temperature: 0.3 })
    }

    /// Create a service using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(ApiClient::api_key_from_env().map_err(generation_error)?)
    }

    /// Point the service at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.client.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn system_prompt(request: &GenerationRequest) -> String {
    let mut prompt = String::from(
        "You are a patient school tutor. Answer the student's question using only the \
         textbook excerpts provided. If the excerpts do not contain the answer, say so.",
    );
    if let Some(grade) = request.grade {
        prompt.push_str(&format!(" Explain at a level suitable for a grade {grade} student."));
    }
    if let Some(style) = &request.style {
        prompt.push_str(&format!(" Preferred explanation style: {style}."));
    }
    prompt
}

fn chat_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage { role: "system", content: system_prompt(request) }];
    messages.extend(request.history.iter().map(|turn| ChatMessage {
        role: match turn.role {
            TurnRole::Student => "user",
            TurnRole::Tutor => "assistant",
        },
        content: turn.content.clone(),
    }));
    messages.push(ChatMessage {
        role: "user",
        content: format!(
            "Textbook excerpts:\n{}\n\nQuestion: {}",
            request.context, request.question
        ),
    });
    messages
}

#[async_trait]
impl LanguageModelService for OpenAIChatService {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            context_len = request.context.len(),
            history_len = request.history.len(),
            "requesting chat completion"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: chat_messages(request),
            temperature: self.temperature,
        };
        let response: ChatResponse =
            self.client.post("chat/completions", &body).await.map_err(|message| {
                error!(provider = PROVIDER, error = %message, "chat completion failed");
                generation_error(message)
            })?;

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| generation_error("API returned no answer".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ConversationTurn;

    #[test]
    fn empty_keys_are_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(""), Err(RagError::EmbeddingError { .. })));
        assert!(matches!(OpenAIChatService::new("  "), Err(RagError::GenerationError { .. })));
    }

    #[test]
    fn dimensions_override_is_reported() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap().with_dimensions(256);
        assert_eq!(provider.dimensions(), 256);
    }

    #[test]
    fn messages_carry_history_and_context() {
        let request = GenerationRequest {
            question: "Why do we see lightning before thunder?".into(),
            context: "[1] (Science | Sound)\nLight travels faster than sound.".into(),
            style: Some("use an everyday example".into()),
            grade: Some(8),
            history: vec![
                ConversationTurn::student("What is sound?"),
                ConversationTurn::tutor("Sound is a vibration."),
            ],
        };
        let messages = chat_messages(&request);
        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert!(messages[0].content.contains("grade 8"));
        assert!(messages[0].content.contains("everyday example"));
        assert!(messages[3].content.contains("Light travels faster than sound."));
        assert!(messages[3].content.ends_with("Question: Why do we see lightning before thunder?"));
    }
}
