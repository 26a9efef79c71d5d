//! C7 — Backend Client: typed wrappers over the five HTTP endpoints.
//!
//! Grounded on the Wolftown-io-canis backend-client request-construction
//! shape (bearer auth header + JSON decode per call).

use async_trait::async_trait;
use reqwest::Client;

use crate::backend::model::{MatchDescriptor, StatusAck};
use crate::error::BackendError;

/// Supplies the current bearer token for every call; a trait so token
/// refresh/rotation lives outside this client.
pub trait TokenProvider {
    fn token(&self) -> Option<String>;
}

/// Typed surface over `/video_chat/*`. A trait so tests can substitute
/// an in-memory backend without a real HTTP server.
#[async_trait(?Send)]
#[cfg_attr(feature = "mockable", mockall::automock)]
pub trait BackendClient {
    async fn join(&self) -> Result<MatchDescriptor, BackendError>;
    async fn leave(&self) -> Result<StatusAck, BackendError>;
    async fn swipe(&self) -> Result<MatchDescriptor, BackendError>;
    async fn status(&self) -> Result<MatchDescriptor, BackendError>;
    async fn end_session(&self, room_id: &str) -> Result<StatusAck, BackendError>;
    async fn clear_waiting_room(&self, room_id: &str, user_id: &str) -> Result<StatusAck, BackendError>;
}

/// Production [`BackendClient`] over `reqwest`.
pub struct HttpBackendClient<T: TokenProvider> {
    http: Client,
    base_path: String,
    tokens: T,
}

impl<T: TokenProvider> HttpBackendClient<T> {
    pub fn new(base_path: impl Into<String>, tokens: T) -> Self {
        Self { http: Client::new(), base_path: base_path.into(), tokens }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.tokens.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn post_json<R: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        body: serde_json::Value,
    ) -> Result<R, BackendError> {
        let resp = self
            .authed(self.http.post(self.url(endpoint)).json(&body))
            .send()
            .await
            .map_err(|e| BackendError::Network { endpoint, reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(BackendError::UnexpectedStatus {
                endpoint,
                status: resp.status().as_u16(),
            });
        }
        resp.json::<R>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn get_json<R: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
    ) -> Result<R, BackendError> {
        let resp = self
            .authed(self.http.get(self.url(endpoint)))
            .send()
            .await
            .map_err(|e| BackendError::Network { endpoint, reason: e.to_string() })?;

        if !resp.status().is_success() {
            return Err(BackendError::UnexpectedStatus {
                endpoint,
                status: resp.status().as_u16(),
            });
        }
        resp.json::<R>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait(?Send)]
impl<T: TokenProvider> BackendClient for HttpBackendClient<T> {
    async fn join(&self) -> Result<MatchDescriptor, BackendError> {
        self.post_json("/join", serde_json::json!({})).await
    }

    async fn leave(&self) -> Result<StatusAck, BackendError> {
        self.post_json("/leave", serde_json::json!({})).await
    }

    async fn swipe(&self) -> Result<MatchDescriptor, BackendError> {
        self.post_json("/swipe", serde_json::json!({})).await
    }

    async fn status(&self) -> Result<MatchDescriptor, BackendError> {
        self.get_json("/status").await
    }

    async fn end_session(&self, room_id: &str) -> Result<StatusAck, BackendError> {
        self.post_json("/end_session", serde_json::json!({ "room_id": room_id })).await
    }

    async fn clear_waiting_room(&self, room_id: &str, user_id: &str) -> Result<StatusAck, BackendError> {
        self.post_json(
            "/clear_waiting_room",
            serde_json::json!({ "room_id": room_id, "user_id": user_id }),
        )
        .await
    }
}
