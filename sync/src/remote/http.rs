//! HTTP client for the Dompet document server.

use super::{RemoteError, RemoteStore};
use async_trait::async_trait;
use dompet_engine::EntityType;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Url};
use serde::Deserialize;
use std::time::Duration;

/// Error body returned by the document server.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

/// [`RemoteStore`] backed by the document server's REST API.
///
/// The request timeout is the only sync timeout: a request that exceeds it
/// fails with [`RemoteError::Timeout`] and is retried on the next trigger.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    /// Bearer token; the user ID is sent when unset (development mode)
    token: Option<String>,
}

impl HttpRemote {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        token: Option<String>,
    ) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `{base}/v1/users/{userId}/{collection}/{docId}`, segments escaped.
    pub fn document_url(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
    ) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v1", "users", user_id, entity_type.collection(), doc_id]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder, user_id: &str) -> RequestBuilder {
        let token = self.token.as_deref().unwrap_or(user_id);
        request.header(AUTHORIZATION, format!("Bearer {}", token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(ErrorBody {
                error,
                details: Some(details),
            }) => format!("{} ({})", error, details),
            Ok(body) => body.error,
            Err(_) if text.is_empty() => status.to_string(),
            Err(_) => text,
        };

        tracing::debug!(status = status.as_u16(), %message, "Remote store refused request");

        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn create(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
        document: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let url = self.document_url(user_id, entity_type, doc_id)?;
        self.send(self.authorize(self.client.put(url), user_id).json(document))
            .await
    }

    async fn update(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), RemoteError> {
        let url = self.document_url(user_id, entity_type, doc_id)?;
        self.send(self.authorize(self.client.patch(url), user_id).json(patch))
            .await
    }

    async fn delete(
        &self,
        user_id: &str,
        entity_type: EntityType,
        doc_id: &str,
    ) -> Result<(), RemoteError> {
        let url = self.document_url(user_id, entity_type, doc_id)?;
        self.send(self.authorize(self.client.delete(url), user_id))
            .await
    }
}
