use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::models::{AssistantMessage, Conversation, ImageAttachment, UserMessage};
use crate::services::BackendConfig;

use super::error::{RepositoryError, RepositoryResult};
use super::message_repository::{BoxFuture, MessageRepository, NewAssistantMessage, clamp_title};

/// REST implementation of [`MessageRepository`].
///
/// Endpoints:
/// - `POST /conversations/`
/// - `PUT  /conversations/{id}/`
/// - `POST /messages/user/` (multipart form; the image rides as a file part)
/// - `POST /messages/assistant/`
/// - `PATCH /messages/assistant/{id}/`
#[derive(Clone)]
pub struct HttpMessageRepository {
    http: reqwest::Client,
    config: BackendConfig,
}

impl HttpMessageRepository {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, self.endpoint(path));
        if let Some(token) = &self.config.auth_token {
            builder = builder.header("Authorization", format!("Token {token}"));
        }
        builder
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> RepositoryResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RepositoryError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl MessageRepository for HttpMessageRepository {
    fn create_conversation(
        &self,
        title: &str,
    ) -> BoxFuture<'static, RepositoryResult<Conversation>> {
        let repo = self.clone();
        let title = clamp_title(title);

        Box::pin(async move {
            debug!(%title, "creating conversation");
            let response = repo
                .request(reqwest::Method::POST, "conversations/")
                .json(&json!({ "title": title }))
                .send()
                .await?;
            Self::decode(response).await
        })
    }

    fn rename_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> BoxFuture<'static, RepositoryResult<Conversation>> {
        let repo = self.clone();
        let path = format!("conversations/{id}/");
        let title = clamp_title(title);

        Box::pin(async move {
            let response = repo
                .request(reqwest::Method::PUT, &path)
                .json(&json!({ "title": title }))
                .send()
                .await?;
            Self::decode(response).await
        })
    }

    fn create_user_message(
        &self,
        conversation: &str,
        content: &str,
        image: Option<ImageAttachment>,
    ) -> BoxFuture<'static, RepositoryResult<UserMessage>> {
        let repo = self.clone();
        let conversation = conversation.to_string();
        let content = content.to_string();

        Box::pin(async move {
            let mut form = multipart::Form::new()
                .text("conversation", conversation)
                .text("content", content);
            if let Some(image) = image {
                let part = multipart::Part::bytes(image.bytes)
                    .file_name("attachment")
                    .mime_str(&image.mime)?;
                form = form.part("image", part);
            }

            let response = repo
                .request(reqwest::Method::POST, "messages/user/")
                .multipart(form)
                .send()
                .await?;
            Self::decode(response).await
        })
    }

    fn create_assistant_message(
        &self,
        new: NewAssistantMessage,
    ) -> BoxFuture<'static, RepositoryResult<AssistantMessage>> {
        let repo = self.clone();

        Box::pin(async move {
            let body = json!({
                "conversation": new.conversation,
                "content_variations": [new.content],
                "model": new.model.id,
                "provider": new.provider,
                "generated_by": new.generated_by,
                "tools_used": new.tools_used,
            });
            let response = repo
                .request(reqwest::Method::POST, "messages/assistant/")
                .json(&body)
                .send()
                .await?;
            Self::decode(response).await
        })
    }

    fn add_content_variation(
        &self,
        message_id: &str,
        content: &str,
    ) -> BoxFuture<'static, RepositoryResult<AssistantMessage>> {
        let repo = self.clone();
        let path = format!("messages/assistant/{message_id}/");
        let content = content.to_string();

        Box::pin(async move {
            let response = repo
                .request(reqwest::Method::PATCH, &path)
                .json(&json!({ "new_content_variation": content }))
                .send()
                .await?;
            Self::decode(response).await
        })
    }
}
