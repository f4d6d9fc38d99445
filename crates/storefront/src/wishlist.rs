//! Wishlist state for anonymous and authenticated shoppers.
//!
//! Same split as the cart, without the merge: a guest wishlist lives in
//! client storage, an authenticated one on the server. At login the server
//! list simply wins; the guest list is left in storage untouched until
//! logout purges it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use clementine_core::{Product, ProductId};

use crate::api::RequestPipeline;
use crate::error::Result;
use crate::storage::StateStore;

#[derive(Deserialize)]
struct WishlistPayload {
    items: Vec<Product>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ToggleRequest<'a> {
    product_id: &'a ProductId,
}

/// The wishlist: client-held when anonymous, server-held when authenticated.
#[derive(Clone)]
pub struct WishlistStore {
    inner: Arc<WishlistStoreInner>,
}

struct WishlistStoreInner {
    pipeline: RequestPipeline,
    store: Arc<dyn StateStore>,
    items: RwLock<Vec<Product>>,
}

impl WishlistStore {
    /// Create an empty wishlist backed by `store`.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, store: Arc<dyn StateStore>) -> Self {
        Self {
            inner: Arc::new(WishlistStoreInner {
                pipeline,
                store,
                items: RwLock::new(Vec::new()),
            }),
        }
    }

    async fn is_authenticated(&self) -> Result<bool> {
        Ok(self.inner.pipeline.tokens().load().await?.is_some())
    }

    /// Populate the cache: from the server with a session, from storage
    /// without one.
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<()> {
        let items = if self.is_authenticated().await? {
            let payload: WishlistPayload = self.inner.pipeline.get("/wishlist").await?;
            payload.items
        } else {
            self.inner.store.load_wishlist().await?.unwrap_or_default()
        };
        debug!(items = items.len(), "wishlist hydrated");
        *self.inner.items.write().await = items;
        Ok(())
    }

    /// Current wishlist contents.
    pub async fn snapshot(&self) -> Vec<Product> {
        self.inner.items.read().await.clone()
    }

    /// Whether `product_id` is on the wishlist.
    pub async fn contains(&self, product_id: &ProductId) -> bool {
        self.inner
            .items
            .read()
            .await
            .iter()
            .any(|p| &p.id == product_id)
    }

    /// Add `product` if absent, remove it if present. Returns `true` when
    /// the product is on the list afterwards.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn toggle(&self, product: &Product) -> Result<bool> {
        if self.is_authenticated().await? {
            let payload: WishlistPayload = self
                .inner
                .pipeline
                .post(
                    "/wishlist/toggle",
                    &ToggleRequest {
                        product_id: &product.id,
                    },
                )
                .await?;
            let present = payload.items.iter().any(|p| p.id == product.id);
            *self.inner.items.write().await = payload.items;
            return Ok(present);
        }

        let mut items = self.inner.items.write().await;
        let present = if items.iter().any(|p| p.id == product.id) {
            items.retain(|p| p.id != product.id);
            false
        } else {
            items.push(product.clone());
            true
        };
        self.inner.store.save_wishlist(&items).await?;
        Ok(present)
    }

    /// Add `product` if it is not already on the list.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: &Product) -> Result<()> {
        if self.contains(&product.id).await {
            return Ok(());
        }
        self.toggle(product).await?;
        Ok(())
    }

    /// Remove `product_id` from the wishlist. Removing an absent product is
    /// a no-op.
    #[instrument(skip(self), fields(%product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<()> {
        if self.is_authenticated().await? {
            let payload: WishlistPayload = self
                .inner
                .pipeline
                .delete(&format!("/wishlist/items/{}", product_id.as_str()))
                .await?;
            *self.inner.items.write().await = payload.items;
            return Ok(());
        }

        let mut items = self.inner.items.write().await;
        items.retain(|p| &p.id != product_id);
        self.inner.store.save_wishlist(&items).await?;
        Ok(())
    }

    /// Drop the cache and the stored guest wishlist. Used on logout.
    pub(crate) async fn purge_local(&self) -> Result<()> {
        self.inner.items.write().await.clear();
        Ok(self.inner.store.clear_wishlist().await?)
    }
}
