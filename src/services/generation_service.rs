use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{ImageAttachment, ModelRef, ToolInvocation};

use super::cancellation::CancelToken;
use super::error::{SendError, SendResult};
use super::stream_decoder::{EventStream, decode_frames};

/// Explicit backend configuration, passed in rather than read from any
/// ambient context.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Bearer-style token, sent as `Authorization: Token <value>`.
    pub auth_token: Option<String>,
}

/// Provider-agnostic generation payload.
///
/// Wire shape: `{model, provider, conversation, use_tools, message}`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub model: String,
    pub provider: String,
    pub conversation: String,
    pub use_tools: bool,
    pub message: OutboundMessage,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub content: String,
    pub role: String,
    pub images: Vec<OutboundImage>,
}

/// An image normalized to a base64 payload plus its MIME type.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundImage {
    #[serde(rename = "type")]
    pub mime: String,
    pub data: String,
}

impl GenerationRequest {
    /// Compose a payload from message text, optional image and the selected
    /// model/provider.
    pub fn compose(
        conversation: &str,
        model: &ModelRef,
        content: &str,
        image: Option<&ImageAttachment>,
        use_tools: bool,
    ) -> Self {
        let images = image
            .map(|image| {
                vec![OutboundImage {
                    mime: image.mime.clone(),
                    data: BASE64.encode(&image.bytes),
                }]
            })
            .unwrap_or_default();

        Self {
            model: model.model.clone(),
            provider: model.provider.clone(),
            conversation: conversation.to_string(),
            use_tools,
            message: OutboundMessage {
                content: content.to_string(),
                role: "user".to_string(),
                images,
            },
        }
    }
}

/// Reply from a direct (non-streaming) generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectReply {
    pub message: ReplyMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tools_used: Option<Vec<ToolInvocation>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Transport seam for the generation backend.
///
/// `generate` resolves one blocking request; `generate_stream` opens a
/// long-lived body decoded into framed events. Implementations map HTTP
/// failures to [`SendError::Transport`] and malformed direct bodies to
/// [`SendError::Protocol`]; in-band error fields are the caller's concern.
#[async_trait]
pub trait GenerationBackend: Send + Sync + 'static {
    async fn generate(&self, request: &GenerationRequest) -> SendResult<DirectReply>;

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        cancel: CancelToken,
    ) -> SendResult<EventStream>;
}

/// HTTP implementation of [`GenerationBackend`].
///
/// Direct mode posts to `chat/`; streaming mode posts to `chat/stream/`
/// and hands the body to the frame decoder.
#[derive(Clone)]
pub struct HttpGenerationClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl HttpGenerationClient {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(self.endpoint(path));
        if let Some(token) = &self.config.auth_token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }
        builder
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> SendResult<DirectReply> {
        debug!(model = %request.model, provider = %request.provider, "direct generation request");
        let response = self.post("chat/").json(request).send().await?;
        let response = response.error_for_status()?;

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| SendError::Protocol(err.to_string()))
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
        cancel: CancelToken,
    ) -> SendResult<EventStream> {
        debug!(model = %request.model, provider = %request.provider, "streaming generation request");
        let response = self.post("chat/stream/").json(request).send().await?;
        let response = response.error_for_status()?;

        Ok(decode_frames(response.bytes_stream(), cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ModelRef {
        ModelRef {
            id: 7,
            name: "Llama".to_string(),
            model: "llama3.2".to_string(),
            provider: "ollama".to_string(),
        }
    }

    #[test]
    fn test_compose_without_image() {
        let request = GenerationRequest::compose("conv-1", &model(), "Hello", None, true);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "model": "llama3.2",
                "provider": "ollama",
                "conversation": "conv-1",
                "use_tools": true,
                "message": {
                    "content": "Hello",
                    "role": "user",
                    "images": [],
                },
            })
        );
    }

    #[test]
    fn test_compose_normalizes_image_to_base64() {
        let image = ImageAttachment {
            mime: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        };
        let request = GenerationRequest::compose("conv-1", &model(), "look", Some(&image), false);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["message"]["images"][0]["type"], "image/png");
        assert_eq!(value["message"]["images"][0]["data"], "AQID");
    }

    #[test]
    fn test_direct_reply_parses_optional_fields() {
        let reply: DirectReply =
            serde_json::from_str("{\"message\":{\"content\":\"ok\"}}").unwrap();
        assert_eq!(reply.message.content, "ok");
        assert!(reply.message.tools_used.is_none());
        assert!(reply.message.error.is_none());

        let reply: DirectReply =
            serde_json::from_str("{\"message\":{\"error\":\"boom\"}}").unwrap();
        assert_eq!(reply.message.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = HttpGenerationClient::new(BackendConfig {
            base_url: "http://localhost:8000/api/".to_string(),
            auth_token: None,
        });
        assert_eq!(client.endpoint("chat/stream/"), "http://localhost:8000/api/chat/stream/");
    }
}
