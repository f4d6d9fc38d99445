//! Client-local persistence boundary.
//!
//! All durable client-side state (session, guest cart, guest wishlist) goes
//! through the [`StateStore`] trait so the application can plug in whatever
//! key-value surface it has, and tests can substitute [`MemoryStore`] and
//! assert exact before/after state.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use clementine_core::{Cart, Product, Session};

/// Keys under which client state is persisted.
///
/// All of them are cleared together on logout.
pub mod keys {
    /// Key for the session (token pair + cached profile).
    pub const SESSION: &str = "session";

    /// Key for the anonymous (guest) cart snapshot.
    pub const CART: &str = "cart";

    /// Key for the guest wishlist.
    pub const WISHLIST: &str = "wishlist";
}

/// Errors raised by the persistence boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A stored value could not be encoded or decoded.
    #[error("storage codec error for key {key}: {source}")]
    Codec {
        /// Storage key involved.
        key: &'static str,
        /// Underlying serde failure.
        source: serde_json::Error,
    },
}

/// A change to the cart key observed on the storage surface.
///
/// This models the browser's cross-tab `storage` event: every holder of the
/// store sees writes made by the others. Consumers must apply it only while
/// anonymous - an authenticated cart lives server-side and ignores it.
#[derive(Debug, Clone)]
pub struct CartStorageEvent {
    /// The new cart state, or `None` when the key was cleared.
    pub cart: Option<Cart>,
}

/// Typed persistence surface for client state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted session, if any.
    async fn load_session(&self) -> Result<Option<Session>, StorageError>;
    /// Persist the session (token pair and cached profile together).
    async fn save_session(&self, session: &Session) -> Result<(), StorageError>;
    /// Drop the session, including the cached profile.
    async fn clear_session(&self) -> Result<(), StorageError>;

    /// Load the guest cart snapshot, if any.
    async fn load_cart(&self) -> Result<Option<Cart>, StorageError>;
    /// Persist the guest cart snapshot.
    async fn save_cart(&self, cart: &Cart) -> Result<(), StorageError>;
    /// Drop the guest cart snapshot.
    async fn clear_cart(&self) -> Result<(), StorageError>;

    /// Load the guest wishlist, if any.
    async fn load_wishlist(&self) -> Result<Option<Vec<Product>>, StorageError>;
    /// Persist the guest wishlist.
    async fn save_wishlist(&self, items: &[Product]) -> Result<(), StorageError>;
    /// Drop the guest wishlist.
    async fn clear_wishlist(&self) -> Result<(), StorageError>;

    /// Subscribe to changes of the cart key made through this store.
    fn watch_cart(&self) -> broadcast::Receiver<CartStorageEvent>;
}
