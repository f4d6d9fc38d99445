//! Cart state for anonymous and authenticated shoppers.
//!
//! Anonymous carts live entirely on the client: mutations are applied to an
//! in-memory cache, clamped against the stock snapshot carried by each
//! product, and persisted through the [`StateStore`]. Authenticated carts
//! live on the server: every mutation is a single round-trip whose response
//! is the new cart, and the local cache is only a mirror of it.
//!
//! The one-time merge of a guest cart into the server cart at login is
//! handled by [`CartReconciler`].

mod reconciler;

pub use reconciler::CartReconciler;

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use clementine_core::{Cart, CartLine, Product, ProductId};

use crate::api::RequestPipeline;
use crate::error::{ApiError, Result};
use crate::storage::{CartStorageEvent, StateStore};

/// Errors raised by cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product has no stock at all; nothing was added.
    #[error("product is out of stock")]
    OutOfStock,

    /// The backend has no cart for this user.
    #[error("cart not found")]
    CartNotFound,

    /// The backend rejected the merge payload at login.
    #[error("invalid merge payload: {0}")]
    InvalidMergePayload(String),
}

/// What happened when a product was added to the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was created.
    Added,
    /// An existing line's quantity grew by the requested amount.
    Updated,
    /// The request exceeded the stock snapshot; the line now holds every
    /// available unit instead.
    Clamped {
        /// Units available, which the line now holds.
        available: u32,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddItemRequest<'a> {
    product_id: &'a ProductId,
    quantity: u32,
}

#[derive(Serialize)]
struct UpdateQuantityRequest {
    quantity: u32,
}

/// The cart: a local state machine when anonymous, a server mirror when
/// authenticated.
///
/// Mode is decided per operation by whether a session is currently
/// persisted, so the store never needs to be told about login or logout.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    pipeline: RequestPipeline,
    store: Arc<dyn StateStore>,
    items: RwLock<Cart>,
}

impl CartStore {
    /// Create an empty cart backed by `store`.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, store: Arc<dyn StateStore>) -> Self {
        Self {
            inner: Arc::new(CartStoreInner {
                pipeline,
                store,
                items: RwLock::new(Cart::new()),
            }),
        }
    }

    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.inner.pipeline.tokens().load().await?.is_some())
    }

    /// Populate the cache at startup.
    ///
    /// With a persisted session the server cart is authoritative and is
    /// fetched; otherwise the guest snapshot is loaded from storage.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<()> {
        let cart = if self.is_authenticated().await? {
            self.inner
                .pipeline
                .get("/cart")
                .await
                .map_err(map_cart_status)?
        } else {
            self.inner.store.load_cart().await?.unwrap_or_default()
        };
        debug!(lines = cart.items.len(), "cart hydrated");
        *self.inner.items.write().await = cart;
        Ok(())
    }

    /// Current cart state.
    pub async fn snapshot(&self) -> Cart {
        self.inner.items.read().await.clone()
    }

    /// Add `quantity` units of `product`.
    ///
    /// Anonymous: the new line quantity is `min(existing + quantity, stock)`;
    /// a product with zero stock is rejected outright. Authenticated: the
    /// backend applies its own stock rules and returns the resulting cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::OutOfStock`] when `product.stock` is zero (the
    /// backend raises the equivalent for the authenticated path).
    #[instrument(skip(self, product), fields(product_id = %product.id, quantity))]
    pub async fn add_item(&self, product: &Product, quantity: u32) -> Result<AddOutcome> {
        if self.is_authenticated().await? {
            return self.add_item_remote(product, quantity).await;
        }

        if product.stock == 0 {
            return Err(CartError::OutOfStock.into());
        }

        let mut cart = self.inner.items.write().await;
        let existing = cart.quantity_of(&product.id);
        let desired = existing.saturating_add(quantity);
        let clamped = desired > product.stock;
        let next = desired.min(product.stock);

        if existing == 0 {
            cart.items.push(CartLine::new(product.clone(), next));
        } else {
            cart.set_quantity(&product.id, next);
        }
        self.persist(&cart).await?;

        Ok(if clamped {
            AddOutcome::Clamped {
                available: product.stock,
            }
        } else if existing == 0 {
            AddOutcome::Added
        } else {
            AddOutcome::Updated
        })
    }

    async fn add_item_remote(&self, product: &Product, quantity: u32) -> Result<AddOutcome> {
        let existing = self.inner.items.read().await.quantity_of(&product.id);
        let cart: Cart = self
            .inner
            .pipeline
            .post(
                "/cart/items",
                &AddItemRequest {
                    product_id: &product.id,
                    quantity,
                },
            )
            .await
            .map_err(map_cart_status)?;
        *self.inner.items.write().await = cart;
        Ok(if existing == 0 {
            AddOutcome::Added
        } else {
            AddOutcome::Updated
        })
    }

    /// Set the quantity of an existing line.
    ///
    /// A `quantity` below 1 is a no-op in both modes; removal is always
    /// explicit via [`CartStore::remove_item`]. Anonymous carts clamp to the
    /// stock snapshot held by the line's product.
    #[instrument(skip(self), fields(%product_id, quantity))]
    pub async fn update_quantity(&self, product_id: &ProductId, quantity: u32) -> Result<()> {
        if quantity < 1 {
            return Ok(());
        }

        if self.is_authenticated().await? {
            let cart: Cart = self
                .inner
                .pipeline
                .patch(
                    &format!("/cart/items/{}", product_id.as_str()),
                    &UpdateQuantityRequest { quantity },
                )
                .await
                .map_err(map_cart_status)?;
            *self.inner.items.write().await = cart;
            return Ok(());
        }

        let mut cart = self.inner.items.write().await;
        let Some(stock) = cart.line(product_id).map(|line| line.product.stock) else {
            return Ok(());
        };
        cart.set_quantity(product_id, quantity.min(stock));
        self.persist(&cart).await
    }

    /// Remove a line from the cart.
    #[instrument(skip(self), fields(%product_id))]
    pub async fn remove_item(&self, product_id: &ProductId) -> Result<()> {
        if self.is_authenticated().await? {
            let cart: Cart = self
                .inner
                .pipeline
                .delete(&format!("/cart/items/{}", product_id.as_str()))
                .await
                .map_err(map_cart_status)?;
            *self.inner.items.write().await = cart;
            return Ok(());
        }

        let mut cart = self.inner.items.write().await;
        cart.remove(product_id);
        self.persist(&cart).await
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.is_authenticated().await? {
            let cart: Cart = self
                .inner
                .pipeline
                .delete("/cart")
                .await
                .map_err(map_cart_status)?;
            *self.inner.items.write().await = cart;
            return Ok(());
        }

        *self.inner.items.write().await = Cart::new();
        Ok(self.inner.store.clear_cart().await?)
    }

    /// Replace the cache with server state. Does not touch storage.
    pub(crate) async fn replace(&self, cart: Cart) {
        *self.inner.items.write().await = cart;
    }

    /// Apply a cart change observed on the storage surface.
    ///
    /// Only meaningful while anonymous; an authenticated cart mirrors the
    /// server, so storage-level changes to the guest key are ignored.
    pub async fn apply_external(&self, event: CartStorageEvent) -> Result<()> {
        if self.is_authenticated().await? {
            return Ok(());
        }
        *self.inner.items.write().await = event.cart.unwrap_or_default();
        Ok(())
    }

    /// Drop the cache and the stored guest snapshot. Used on logout.
    pub(crate) async fn purge_local(&self) -> Result<()> {
        *self.inner.items.write().await = Cart::new();
        Ok(self.inner.store.clear_cart().await?)
    }

    async fn persist(&self, cart: &Cart) -> Result<()> {
        Ok(self.inner.store.save_cart(cart).await?)
    }
}

/// Map backend statuses shared by the cart endpoints.
fn map_cart_status(err: ApiError) -> ApiError {
    match err {
        ApiError::Status { status, .. } if status == StatusCode::NOT_FOUND => {
            CartError::CartNotFound.into()
        }
        other => other,
    }
}
