//! HTTP request pipeline with transparent token refresh.
//!
//! Every backend call in the client goes through [`RequestPipeline`]. The
//! pipeline attaches the bearer token when a session exists, and on a 401
//! performs exactly one refresh followed by exactly one replay of the
//! original request. A failed refresh tears the session down and notifies
//! subscribers via [`SessionEvent::Expired`].
//!
//! The refresh call itself goes straight to the HTTP client, never back
//! through the pipeline, so an expired refresh token cannot recurse.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use clementine_core::Session;

use crate::auth::{AuthError, TokenStore};
use crate::config::StorefrontConfig;
use crate::error::{ApiError, Result};

/// Capacity of the session event channel.
const EVENT_CAPACITY: usize = 8;

/// Session lifecycle notifications emitted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was torn down because a token refresh failed. The user
    /// must log in again.
    Expired,
}

/// Token pair returned by the refresh endpoint.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Error body shape used by the backend for all non-success responses.
#[derive(serde::Deserialize)]
struct ErrorBody {
    error: String,
}

/// Shared HTTP pipeline for all backend calls.
///
/// Cheap to clone; every clone shares the HTTP connection pool, the token
/// store, and the session event channel.
#[derive(Clone)]
pub struct RequestPipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    http: reqwest::Client,
    config: StorefrontConfig,
    tokens: TokenStore,
    session_events: broadcast::Sender<SessionEvent>,
}

impl RequestPipeline {
    /// Create a pipeline for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig, tokens: TokenStore) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let (session_events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(PipelineInner {
                http,
                config: config.clone(),
                tokens,
                session_events,
            }),
        })
    }

    /// Subscribe to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.session_events.subscribe()
    }

    /// The token store backing this pipeline.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    /// `GET` a path and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch(Method::GET, path, None, 0).await
    }

    /// `POST` a JSON body and decode the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.dispatch(Method::POST, path, Some(&body), 0).await
    }

    /// `POST` with no body and decode the JSON response.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch(Method::POST, path, None, 0).await
    }

    /// `PATCH` a JSON body and decode the JSON response.
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.dispatch(Method::PATCH, path, Some(&body), 0).await
    }

    /// `DELETE` a path and decode the JSON response.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch(Method::DELETE, path, None, 0).await
    }

    /// Send one request, refreshing and replaying at most once on a 401.
    ///
    /// `attempt` is 0 for the original send and 1 for the replay after a
    /// refresh; a 401 on the replay is surfaced, never retried again.
    #[instrument(
        skip(self, body),
        fields(request_id = %Uuid::new_v4(), %method, path, attempt)
    )]
    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        attempt: u8,
    ) -> Result<T> {
        let session = self.inner.tokens.load().await?;
        let authenticated = session.is_some();

        let mut request = self
            .inner
            .http
            .request(method.clone(), self.inner.config.endpoint(path));
        if let Some(session) = &session {
            request = request.bearer_auth(&session.access_token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(%status, "backend responded");

        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status == StatusCode::UNAUTHORIZED {
            if attempt == 0 {
                if let Some(session) = session {
                    self.refresh(session).await?;
                    return Box::pin(self.dispatch(method, path, body, 1)).await;
                }
            }
            let message = error_message(response).await;
            if authenticated {
                return Err(AuthError::ExpiredAccessToken.into());
            }
            return Err(ApiError::Unauthorized(message));
        }

        Err(ApiError::Status {
            status,
            message: error_message(response).await,
        })
    }

    /// Exchange the refresh token for a new pair and persist it.
    ///
    /// Any failure here is unrecoverable: the session is cleared, an
    /// [`SessionEvent::Expired`] is broadcast, and the caller gets
    /// [`AuthError::InvalidRefreshToken`].
    async fn refresh(&self, session: Session) -> Result<()> {
        match self.request_refresh(&session).await {
            Ok(pair) => {
                let rotated = session.with_tokens(pair.access_token, pair.refresh_token);
                self.inner.tokens.save(&rotated).await?;
                debug!("token pair rotated");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, tearing down session");
                self.inner.tokens.clear().await?;
                let _ = self.inner.session_events.send(SessionEvent::Expired);
                Err(AuthError::InvalidRefreshToken.into())
            }
        }
    }

    async fn request_refresh(&self, session: &Session) -> Result<TokenPair> {
        let response = self
            .inner
            .http
            .post(self.inner.config.endpoint("/auth/refresh"))
            .json(&RefreshRequest {
                refresh_token: &session.refresh_token,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(ApiError::Status {
            status,
            message: error_message(response).await,
        })
    }
}

/// Pull the message out of a backend error body, falling back to the raw
/// text when the body is not the expected `{"error": ...}` shape.
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => body.error,
        Err(_) => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StateStore};
    use clementine_core::{Email, UserId, UserProfile, UserRole};
    use mockito::{Matcher, Server};

    fn session(access: &str, refresh: &str) -> Session {
        Session {
            access_token: access.to_owned(),
            refresh_token: refresh.to_owned(),
            user: UserProfile {
                id: UserId::new("u-1"),
                email: Email::parse("shopper@example.com").unwrap(),
                full_name: "Sam Shopper".to_owned(),
                phone: None,
                address: None,
                role: UserRole::Customer,
            },
        }
    }

    fn pipeline_with(server: &Server, store: &MemoryStore) -> RequestPipeline {
        let config = StorefrontConfig::for_api_url(&server.url()).unwrap();
        let tokens = TokenStore::new(Arc::new(store.clone()));
        RequestPipeline::new(&config, tokens).unwrap()
    }

    #[tokio::test]
    async fn test_anonymous_request_has_no_auth_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("authorization", Matcher::Missing)
            .with_body(r#"{"ok": true}"#)
            .create_async()
            .await;

        let store = MemoryStore::new();
        let pipeline = pipeline_with(&server, &store);

        let body: serde_json::Value = pipeline.get("/ping").await.unwrap();
        assert_eq!(body["ok"], true);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_and_replays_once() {
        let mut server = Server::new_async().await;
        let stale = server
            .mock("GET", "/cart")
            .match_header("authorization", "Bearer a1")
            .with_status(401)
            .with_body(r#"{"error": "token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .match_body(Matcher::Json(serde_json::json!({"refreshToken": "r1"})))
            .with_body(r#"{"accessToken": "a2", "refreshToken": "r2"}"#)
            .expect(1)
            .create_async()
            .await;
        let replay = server
            .mock("GET", "/cart")
            .match_header("authorization", "Bearer a2")
            .with_body(r#"{"items": []}"#)
            .expect(1)
            .create_async()
            .await;

        let store = MemoryStore::new();
        store.save_session(&session("a1", "r1")).await.unwrap();
        let pipeline = pipeline_with(&server, &store);

        let body: serde_json::Value = pipeline.get("/cart").await.unwrap();
        assert_eq!(body["items"], serde_json::json!([]));

        stale.assert_async().await;
        refresh.assert_async().await;
        replay.assert_async().await;

        // the rotated pair must be persisted
        let rotated = store.load_session().await.unwrap().unwrap();
        assert_eq!(rotated.access_token, "a2");
        assert_eq!(rotated.refresh_token, "r2");
    }

    #[tokio::test]
    async fn test_failed_refresh_tears_down_session() {
        let mut server = Server::new_async().await;
        let stale = server
            .mock("GET", "/cart")
            .with_status(401)
            .with_body(r#"{"error": "token expired"}"#)
            .expect(1)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(401)
            .with_body(r#"{"error": "refresh token revoked"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = MemoryStore::new();
        store.save_session(&session("a1", "r1")).await.unwrap();
        let pipeline = pipeline_with(&server, &store);
        let mut events = pipeline.subscribe();

        let err = pipeline.get::<serde_json::Value>("/cart").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Auth(AuthError::InvalidRefreshToken)
        ));

        stale.assert_async().await;
        refresh.assert_async().await;

        assert!(store.load_session().await.unwrap().is_none());
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
    }

    #[tokio::test]
    async fn test_second_401_is_not_retried_again() {
        let mut server = Server::new_async().await;
        let target = server
            .mock("GET", "/cart")
            .with_status(401)
            .with_body(r#"{"error": "token expired"}"#)
            .expect(2)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_body(r#"{"accessToken": "a2", "refreshToken": "r2"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = MemoryStore::new();
        store.save_session(&session("a1", "r1")).await.unwrap();
        let pipeline = pipeline_with(&server, &store);

        let err = pipeline.get::<serde_json::Value>("/cart").await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::ExpiredAccessToken)));

        target.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_anonymous_401_maps_to_unauthorized() {
        let mut server = Server::new_async().await;
        let refresh = server.mock("POST", "/auth/refresh").expect(0).create_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"error": "invalid email or password"}"#)
            .create_async()
            .await;

        let store = MemoryStore::new();
        let pipeline = pipeline_with(&server, &store);

        let err = pipeline
            .post::<_, serde_json::Value>("/auth/login", &serde_json::json!({}))
            .await
            .unwrap_err();
        match err {
            ApiError::Unauthorized(message) => {
                assert_eq!(message, "invalid email or password");
            }
            other => panic!("unexpected error: {other}"),
        }
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_other_failures_surface_status_and_message() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/cart")
            .with_status(404)
            .with_body(r#"{"error": "cart not found"}"#)
            .create_async()
            .await;

        let store = MemoryStore::new();
        let pipeline = pipeline_with(&server, &store);

        let err = pipeline.delete::<serde_json::Value>("/cart").await.unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "cart not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
