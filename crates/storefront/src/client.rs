//! The [`Storefront`] facade: one handle over the whole client.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use clementine_core::{Session, UserProfile};

use crate::api::{RequestPipeline, SessionEvent};
use crate::auth::{AuthGateway, Credentials, Registration, TokenStore};
use crate::cart::{CartReconciler, CartStore};
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::storage::StateStore;
use crate::wishlist::WishlistStore;

/// Facade over session, cart, and wishlist state.
///
/// All components share one [`RequestPipeline`] and one [`StateStore`], so
/// a token refresh performed while mutating the cart is immediately visible
/// to every other operation.
pub struct Storefront {
    tokens: TokenStore,
    pipeline: RequestPipeline,
    gateway: AuthGateway,
    cart: CartStore,
    wishlist: WishlistStore,
    reconciler: CartReconciler,
    store: Arc<dyn StateStore>,
}

impl Storefront {
    /// Wire up a storefront client against `config`, persisting through
    /// `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &StorefrontConfig, store: Arc<dyn StateStore>) -> Result<Self> {
        let tokens = TokenStore::new(Arc::clone(&store));
        let pipeline = RequestPipeline::new(config, tokens.clone())?;
        let cart = CartStore::new(pipeline.clone(), Arc::clone(&store));
        let wishlist = WishlistStore::new(pipeline.clone(), Arc::clone(&store));
        let gateway = AuthGateway::new(
            pipeline.clone(),
            tokens.clone(),
            cart.clone(),
            wishlist.clone(),
        );
        let reconciler = CartReconciler::new(pipeline.clone(), Arc::clone(&store), cart.clone());

        Ok(Self {
            tokens,
            pipeline,
            gateway,
            cart,
            wishlist,
            reconciler,
            store,
        })
    }

    /// Load persisted state into the in-memory caches.
    ///
    /// Call once at startup, before serving any UI state.
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<()> {
        self.cart.hydrate().await?;
        self.wishlist.hydrate().await?;
        Ok(())
    }

    /// Log in and reconcile the guest cart with the server cart.
    ///
    /// Reconciliation runs to completion before this returns, so the first
    /// cart operation after login always sees the merged cart. A failed
    /// merge does not fail the login: the guest cart stays in storage and
    /// the session is established regardless.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let session = self.gateway.login(credentials).await?;
        self.sync_after_auth().await;
        Ok(session)
    }

    /// Create an account, log in, and reconcile the guest cart.
    #[instrument(skip_all)]
    pub async fn register(&self, registration: &Registration) -> Result<Session> {
        let session = self.gateway.register(registration).await?;
        self.sync_after_auth().await;
        Ok(session)
    }

    /// Log out and purge all locally held user state.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        self.gateway.logout().await
    }

    /// The cart.
    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// The wishlist.
    #[must_use]
    pub fn wishlist(&self) -> &WishlistStore {
        &self.wishlist
    }

    /// Subscribe to session lifecycle events (forced logouts on refresh
    /// failure).
    #[must_use]
    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.pipeline.subscribe()
    }

    /// Profile of the currently authenticated user, if any.
    pub async fn current_user(&self) -> Result<Option<UserProfile>> {
        Ok(self.tokens.load().await?.map(|session| session.user))
    }

    /// Mirror cart changes made through other holders of the state store.
    ///
    /// Runs until the store's event channel closes. Spawn it alongside the
    /// client when the host surface can be open more than once (tabs).
    pub async fn run_storage_listener(&self) {
        let mut events = self.store.watch_cart();
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(err) = self.cart.apply_external(event).await {
                        warn!(error = %err, "failed to apply external cart change");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "cart event stream lagged, continuing with next state");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn sync_after_auth(&self) {
        if let Err(err) = self.reconciler.reconcile().await {
            warn!(error = %err, "cart reconciliation failed, guest cart preserved");
        }
        if let Err(err) = self.wishlist.hydrate().await {
            warn!(error = %err, "wishlist fetch failed after login");
        }
    }
}
