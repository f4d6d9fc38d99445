//! One-time merge of the guest cart into the server cart at login.

use std::sync::Arc;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use clementine_core::{Cart, CartLine};

use crate::api::RequestPipeline;
use crate::cart::{CartError, CartStore};
use crate::error::{ApiError, Result};
use crate::storage::StateStore;

#[derive(Serialize)]
struct SyncRequest {
    items: Vec<CartLine>,
}

/// Reconciles the guest cart with the server cart right after login.
///
/// Runs exactly once per login, before any other cart operation is issued
/// for the new session. The server owns the merge: it sums quantities for
/// products present on both sides, appends the rest, applies its own stock
/// rules, and returns the resulting cart.
pub struct CartReconciler {
    pipeline: RequestPipeline,
    store: Arc<dyn StateStore>,
    cart: CartStore,
}

impl CartReconciler {
    /// Wire the reconciler to its collaborators.
    #[must_use]
    pub fn new(pipeline: RequestPipeline, store: Arc<dyn StateStore>, cart: CartStore) -> Self {
        Self {
            pipeline,
            store,
            cart,
        }
    }

    /// Merge the stored guest cart into the server cart.
    ///
    /// With no guest lines this is a plain fetch of the server cart. The
    /// guest snapshot is discarded only after the backend confirms the
    /// merge; on any failure it stays in storage so nothing is lost, and
    /// the cache keeps showing the guest lines.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidMergePayload`] when the backend rejects
    /// the guest lines, or the underlying transport/status error otherwise.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<()> {
        let guest = self.store.load_cart().await?.unwrap_or_default();

        if guest.is_empty() {
            let remote: Cart = self.pipeline.get("/cart").await?;
            debug!(lines = remote.items.len(), "no guest cart, fetched server cart");
            self.cart.replace(remote).await;
            self.store.clear_cart().await?;
            return Ok(());
        }

        let merged: std::result::Result<Cart, ApiError> = self
            .pipeline
            .post(
                "/cart/sync",
                &SyncRequest {
                    items: guest.items.clone(),
                },
            )
            .await;

        match merged {
            Ok(merged) => {
                debug!(
                    guest_lines = guest.items.len(),
                    merged_lines = merged.items.len(),
                    "guest cart merged into server cart"
                );
                self.cart.replace(merged).await;
                self.store.clear_cart().await?;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "cart merge failed, keeping guest cart");
                self.cart.replace(guest).await;
                Err(match err {
                    ApiError::Status { status, message }
                        if status == StatusCode::BAD_REQUEST =>
                    {
                        CartError::InvalidMergePayload(message).into()
                    }
                    other => other,
                })
            }
        }
    }
}
