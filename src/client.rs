//! Completion-API client: turn a prompt plus page images into one HTTP call.
//!
//! The transport is deliberately dumb — build the JSON body, POST it with a
//! bearer token, pull the first candidate's text out of the response. All
//! retry logic lives in [`crate::pipeline::transcribe`]; all prompt content
//! lives in [`crate::prompts`]. The [`CompletionProvider`] trait is the seam
//! pipeline tests stub instead of hitting the network.
//!
//! ## Response leniency
//!
//! A well-formed response with no candidates (or a candidate with no text
//! part) yields an **empty string, not an error**. Only transport failures,
//! non-success HTTP statuses, and unreadable image files raise.

use crate::error::PdfScribeError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// One completion call: a user message with optional system prompt and
/// optional image attachments.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model id, e.g. `gemini-1.5-pro`. `None` uses the provider's default.
    pub model: Option<String>,
    /// The user message text.
    pub message: String,
    /// Optional system turn sent before the user turn.
    pub system: Option<String>,
    /// Paths of JPEG images attached to the user turn, in order.
    pub images: Vec<PathBuf>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token budget.
    pub max_tokens: u32,
}

/// Anything that can answer a [`CompletionRequest`] with generated text.
///
/// Production code uses [`GeminiClient`]; tests inject stubs via
/// [`crate::config::ConversionConfig::provider`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PdfScribeError>;
}

/// HTTP client for the generative-language completion endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl GeminiClient {
    /// Create a client against `base_url` authenticating with `api_key`,
    /// defaulting to [`crate::config::DEFAULT_MODEL`] for requests that
    /// don't pin a model of their own.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            default_model: crate::config::DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the model used when a request doesn't name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// `<base_url>models/<model>:generateContent`, tolerating a missing
    /// trailing slash on the configured base.
    fn endpoint(&self, model: &str) -> String {
        let sep = if self.base_url.ends_with('/') { "" } else { "/" };
        format!("{}{}models/{}:generateContent", self.base_url, sep, model)
    }

    /// Build the message list: optional system turn, then the user turn.
    ///
    /// With images attached, the user content becomes a part list — the text
    /// first, then one inline-data entry per image, each read fully into
    /// memory and embedded as a base64 data URI with a JPEG media type.
    async fn build_messages(
        &self,
        request: &CompletionRequest,
    ) -> Result<Vec<Message>, PdfScribeError> {
        let mut messages = Vec::with_capacity(2);

        if let Some(ref system) = request.system {
            messages.push(Message {
                role: "system",
                content: MessageContent::Text(system.clone()),
            });
        }

        let content = if request.images.is_empty() {
            MessageContent::Text(request.message.clone())
        } else {
            let mut parts = Vec::with_capacity(request.images.len() + 1);
            parts.push(ContentPart::Text {
                text: request.message.clone(),
            });
            for path in &request.images {
                let bytes = tokio::fs::read(path).await.map_err(|source| {
                    PdfScribeError::ImageReadFailed {
                        path: path.clone(),
                        source,
                    }
                })?;
                let b64 = STANDARD.encode(&bytes);
                debug!("Encoded {} → {} bytes base64", path.display(), b64.len());
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{b64}"),
                    },
                });
            }
            MessageContent::Parts(parts)
        };

        messages.push(Message {
            role: "user",
            content,
        });
        Ok(messages)
    }
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, PdfScribeError> {
        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let messages = self.build_messages(request).await?;
        let body = ChatRequest {
            model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .http
            .post(self.endpoint(model))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdfScribeError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(extract_text(&parsed))
    }
}

/// First candidate → content → first part → text; empty string when any
/// link in that chain is absent.
fn extract_text(response: &ChatResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .and_then(|p| p.text.clone())
        .unwrap_or_default()
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize, Debug)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Debug)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(message: &str) -> CompletionRequest {
        CompletionRequest {
            model: Some("gemini-1.5-pro".into()),
            message: message.into(),
            system: None,
            images: vec![],
            temperature: 0.3,
            max_tokens: 8192,
        }
    }

    #[test]
    fn default_model_is_used_when_request_names_none() {
        let client = GeminiClient::new(crate::config::DEFAULT_BASE_URL, "k")
            .with_default_model("gemini-1.5-flash");
        let mut req = request("hello");
        req.model = None;
        let model = req.model.as_deref().unwrap_or(&client.default_model);
        assert_eq!(model, "gemini-1.5-flash");
    }

    #[test]
    fn endpoint_joins_with_and_without_trailing_slash() {
        let with = GeminiClient::new("https://api.example/v1beta/", "k");
        let without = GeminiClient::new("https://api.example/v1beta", "k");
        let expected = "https://api.example/v1beta/models/gemini-1.5-pro:generateContent";
        assert_eq!(with.endpoint("gemini-1.5-pro"), expected);
        assert_eq!(without.endpoint("gemini-1.5-pro"), expected);
    }

    #[tokio::test]
    async fn text_only_request_serialises_flat_content() {
        let client = GeminiClient::new(crate::config::DEFAULT_BASE_URL, "k");
        let mut req = request("hello");
        req.system = Some("be terse".into());
        let messages = client.build_messages(&req).await.unwrap();
        let json = serde_json::to_value(&messages).unwrap();

        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[0]["content"], "be terse");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"], "hello");
    }

    #[tokio::test]
    async fn image_request_serialises_part_list() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("page-1.jpg");
        std::fs::write(&img, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let client = GeminiClient::new(crate::config::DEFAULT_BASE_URL, "k");
        let mut req = request("transcribe");
        req.images = vec![img];
        let messages = client.build_messages(&req).await.unwrap();
        let json = serde_json::to_value(&messages).unwrap();

        let parts = json[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "transcribe");
        assert_eq!(parts[1]["type"], "image_url");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn missing_image_file_raises() {
        let client = GeminiClient::new(crate::config::DEFAULT_BASE_URL, "k");
        let mut req = request("transcribe");
        req.images = vec![PathBuf::from("/no/such/page.jpg")];
        let err = client.build_messages(&req).await.unwrap_err();
        assert!(matches!(err, PdfScribeError::ImageReadFailed { .. }));
    }

    #[test]
    fn extract_text_happy_path() {
        let resp: ChatResponse = serde_json::from_str(
            r##"{"candidates":[{"content":{"parts":[{"text":"# Title\n"}]}}]}"##,
        )
        .unwrap();
        assert_eq!(extract_text(&resp), "# Title\n");
    }

    #[test]
    fn extract_text_tolerates_absent_structure() {
        for body in [
            r#"{}"#,
            r#"{"candidates":[]}"#,
            r#"{"candidates":[{}]}"#,
            r#"{"candidates":[{"content":{}}]}"#,
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
            r#"{"candidates":[{"content":{"parts":[{}]}}]}"#,
        ] {
            let resp: ChatResponse = serde_json::from_str(body).unwrap();
            assert_eq!(extract_text(&resp), "", "body: {body}");
        }
    }
}
