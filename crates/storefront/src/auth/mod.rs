//! Session lifecycle: token persistence and the login/register/logout flows.
//!
//! [`TokenStore`] is the single authority over the persisted session. The
//! request pipeline reads it before every send and rewrites it on refresh;
//! [`AuthGateway`] writes it on login/register and clears it on logout.

mod error;

pub use error::AuthError;

use std::sync::Arc;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use clementine_core::{Email, Session, UserProfile};

use crate::api::RequestPipeline;
use crate::cart::CartStore;
use crate::error::{ApiError, Result};
use crate::storage::StateStore;
use crate::wishlist::WishlistStore;

/// Handle to the persisted session.
///
/// A thin typed wrapper over the session key of the injected [`StateStore`];
/// cheap to clone and share between the pipeline and the gateway.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn StateStore>,
}

impl TokenStore {
    /// Wrap the session key of `store`.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Load the current session, if any.
    pub async fn load(&self) -> Result<Option<Session>> {
        Ok(self.store.load_session().await?)
    }

    /// Persist `session`, replacing any previous one.
    pub async fn save(&self, session: &Session) -> Result<()> {
        Ok(self.store.save_session(session).await?)
    }

    /// Drop the persisted session.
    pub async fn clear(&self) -> Result<()> {
        Ok(self.store.clear_session().await?)
    }
}

/// Login request body.
#[derive(Debug, Serialize)]
pub struct Credentials {
    /// Account email.
    pub email: Email,
    /// Plaintext password, sent over TLS only.
    pub password: String,
}

/// Registration request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Account email.
    pub email: Email,
    /// Plaintext password, sent over TLS only.
    pub password: String,
    /// Full display name.
    pub full_name: String,
    /// Contact phone, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Shipping address, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Response body shared by the login and register endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthPayload {
    user: UserProfile,
    access_token: String,
    refresh_token: String,
}

impl From<AuthPayload> for Session {
    fn from(payload: AuthPayload) -> Self {
        Self {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            user: payload.user,
        }
    }
}

/// Login, registration, and logout against the backend.
#[derive(Clone)]
pub struct AuthGateway {
    pipeline: RequestPipeline,
    tokens: TokenStore,
    cart: CartStore,
    wishlist: WishlistStore,
}

impl AuthGateway {
    /// Wire the gateway to its collaborators.
    #[must_use]
    pub fn new(
        pipeline: RequestPipeline,
        tokens: TokenStore,
        cart: CartStore,
        wishlist: WishlistStore,
    ) -> Self {
        Self {
            pipeline,
            tokens,
            cart,
            wishlist,
        }
    }

    /// Authenticate with email and password, establishing a session.
    ///
    /// The caller (the [`crate::Storefront`] facade) is responsible for
    /// reconciling the guest cart after this returns.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the backend rejects
    /// the pair; the error does not distinguish unknown email from wrong
    /// password.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let payload: AuthPayload = self
            .pipeline
            .post("/auth/login", credentials)
            .await
            .map_err(|err| match err {
                ApiError::Unauthorized(_) => AuthError::InvalidCredentials.into(),
                other => other,
            })?;

        let session = Session::from(payload);
        self.tokens.save(&session).await?;
        debug!(user = %session.user.id, "session established");
        Ok(session)
    }

    /// Create an account and establish a session in one step.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateAccount`] when the email is taken.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: &Registration) -> Result<Session> {
        let payload: AuthPayload = self
            .pipeline
            .post("/auth/register", registration)
            .await
            .map_err(|err| match err {
                ApiError::Status { status, .. } if status == StatusCode::BAD_REQUEST => {
                    AuthError::DuplicateAccount.into()
                }
                other => other,
            })?;

        let session = Session::from(payload);
        self.tokens.save(&session).await?;
        debug!(user = %session.user.id, "account created, session established");
        Ok(session)
    }

    /// End the session and purge all locally held user state.
    ///
    /// The server-side revocation is best-effort: whether or not the backend
    /// accepts the call, the local session, cart cache, and wishlist cache
    /// are gone when this returns.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        if let Err(err) = self
            .pipeline
            .post_empty::<serde_json::Value>("/auth/logout")
            .await
        {
            debug!(error = %err, "logout revocation failed; clearing local state anyway");
        }

        self.tokens.clear().await?;
        self.cart.purge_local().await?;
        self.wishlist.purge_local().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorefrontConfig;
    use crate::storage::MemoryStore;
    use clementine_core::UserRole;
    use mockito::{Matcher, Server};

    fn auth_payload_json() -> serde_json::Value {
        serde_json::json!({
            "user": {
                "id": "u-1",
                "email": "shopper@example.com",
                "fullName": "Sam Shopper",
                "role": "customer"
            },
            "accessToken": "a1",
            "refreshToken": "r1"
        })
    }

    fn gateway_with(server: &Server, store: &MemoryStore) -> AuthGateway {
        let config = StorefrontConfig::for_api_url(&server.url()).unwrap();
        let store: Arc<dyn StateStore> = Arc::new(store.clone());
        let tokens = TokenStore::new(Arc::clone(&store));
        let pipeline = RequestPipeline::new(&config, tokens.clone()).unwrap();
        let cart = CartStore::new(pipeline.clone(), Arc::clone(&store));
        let wishlist = WishlistStore::new(pipeline.clone(), Arc::clone(&store));
        AuthGateway::new(pipeline, tokens, cart, wishlist)
    }

    #[tokio::test]
    async fn test_login_persists_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(serde_json::json!({
                "email": "shopper@example.com",
                "password": "hunter2"
            })))
            .with_body(auth_payload_json().to_string())
            .create_async()
            .await;

        let store = MemoryStore::new();
        let gateway = gateway_with(&server, &store);

        let session = gateway
            .login(&Credentials {
                email: Email::parse("shopper@example.com").unwrap(),
                password: "hunter2".to_owned(),
            })
            .await
            .unwrap();

        assert_eq!(session.access_token, "a1");
        assert_eq!(session.user.role, UserRole::Customer);
        assert_eq!(store.load_session().await.unwrap(), Some(session));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_login_rejection_maps_to_invalid_credentials() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"error": "invalid email or password"}"#)
            .create_async()
            .await;

        let store = MemoryStore::new();
        let gateway = gateway_with(&server, &store);

        let err = gateway
            .login(&Credentials {
                email: Email::parse("shopper@example.com").unwrap(),
                password: "wrong".to_owned(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::InvalidCredentials)));
        assert!(store.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/auth/register")
            .with_status(400)
            .with_body(r#"{"error": "email already registered"}"#)
            .create_async()
            .await;

        let store = MemoryStore::new();
        let gateway = gateway_with(&server, &store);

        let err = gateway
            .register(&Registration {
                email: Email::parse("shopper@example.com").unwrap(),
                password: "hunter2".to_owned(),
                full_name: "Sam Shopper".to_owned(),
                phone: None,
                address: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::DuplicateAccount)));
    }

    #[tokio::test]
    async fn test_logout_clears_local_state_even_when_revocation_fails() {
        let mut server = Server::new_async().await;
        let revoke = server
            .mock("POST", "/auth/logout")
            .with_status(500)
            .with_body(r#"{"error": "internal"}"#)
            .create_async()
            .await;

        let store = MemoryStore::new();
        let gateway = gateway_with(&server, &store);

        // seed a session and a guest cart so there is something to purge
        let payload: AuthPayload = serde_json::from_value(auth_payload_json()).unwrap();
        store
            .save_session(&Session::from(payload))
            .await
            .unwrap();
        store
            .save_cart(&clementine_core::Cart::new())
            .await
            .unwrap();

        gateway.logout().await.unwrap();

        assert!(store.load_session().await.unwrap().is_none());
        assert!(store.load_cart().await.unwrap().is_none());
        revoke.assert_async().await;
    }
}
