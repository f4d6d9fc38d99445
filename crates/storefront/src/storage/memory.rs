//! In-memory [`StateStore`] implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, broadcast};

use clementine_core::{Cart, Product, Session};

use super::{CartStorageEvent, StateStore, StorageError, keys};

/// Capacity of the cart-change broadcast channel. Consumers that lag simply
/// miss intermediate snapshots; the next event carries full state anyway.
const WATCH_CAPACITY: usize = 16;

/// In-memory key-value store.
///
/// The default store for tests and for hosts without durable client storage.
/// Values are kept as JSON so the store behaves exactly like a persistent
/// key-value surface would.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

struct MemoryStoreInner {
    values: RwLock<HashMap<&'static str, serde_json::Value>>,
    cart_events: broadcast::Sender<CartStorageEvent>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (cart_events, _) = broadcast::channel(WATCH_CAPACITY);
        Self {
            inner: Arc::new(MemoryStoreInner {
                values: RwLock::new(HashMap::new()),
                cart_events,
            }),
        }
    }

    async fn get<T: DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>, StorageError> {
        let values = self.inner.values.read().await;
        values
            .get(key)
            .cloned()
            .map(|value| {
                serde_json::from_value(value).map_err(|source| StorageError::Codec { key, source })
            })
            .transpose()
    }

    async fn put<T: Serialize>(&self, key: &'static str, value: &T) -> Result<(), StorageError> {
        let encoded =
            serde_json::to_value(value).map_err(|source| StorageError::Codec { key, source })?;
        self.inner.values.write().await.insert(key, encoded);
        Ok(())
    }

    async fn remove(&self, key: &'static str) {
        self.inner.values.write().await.remove(key);
    }

    fn notify_cart(&self, cart: Option<Cart>) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.inner.cart_events.send(CartStorageEvent { cart });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load_session(&self) -> Result<Option<Session>, StorageError> {
        self.get(keys::SESSION).await
    }

    async fn save_session(&self, session: &Session) -> Result<(), StorageError> {
        self.put(keys::SESSION, session).await
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        self.remove(keys::SESSION).await;
        Ok(())
    }

    async fn load_cart(&self) -> Result<Option<Cart>, StorageError> {
        self.get(keys::CART).await
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StorageError> {
        self.put(keys::CART, cart).await?;
        self.notify_cart(Some(cart.clone()));
        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), StorageError> {
        self.remove(keys::CART).await;
        self.notify_cart(None);
        Ok(())
    }

    async fn load_wishlist(&self) -> Result<Option<Vec<Product>>, StorageError> {
        self.get(keys::WISHLIST).await
    }

    async fn save_wishlist(&self, items: &[Product]) -> Result<(), StorageError> {
        self.put(keys::WISHLIST, &items).await
    }

    async fn clear_wishlist(&self) -> Result<(), StorageError> {
        self.remove(keys::WISHLIST).await;
        Ok(())
    }

    fn watch_cart(&self) -> broadcast::Receiver<CartStorageEvent> {
        self.inner.cart_events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clementine_core::{CartLine, Email, ProductId, UserId, UserProfile, UserRole};
    use rust_decimal::Decimal;

    fn session() -> Session {
        Session {
            access_token: "a1".to_owned(),
            refresh_token: "r1".to_owned(),
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

    fn cart() -> Cart {
        Cart {
            items: vec![CartLine::new(
                Product {
                    id: ProductId::new("p-1"),
                    name: "Mug".to_owned(),
                    price: Decimal::from(120),
                    discount: 0,
                    stock: 5,
                },
                2,
            )],
        }
    }

    #[tokio::test]
    async fn test_session_round_trip_and_clear() {
        let store = MemoryStore::new();
        assert!(store.load_session().await.unwrap().is_none());

        store.save_session(&session()).await.unwrap();
        assert_eq!(store.load_session().await.unwrap(), Some(session()));

        store.clear_session().await.unwrap();
        assert!(store.load_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cart_save_broadcasts_new_state() {
        let store = MemoryStore::new();
        let mut watch = store.watch_cart();

        store.save_cart(&cart()).await.unwrap();
        let event = watch.recv().await.unwrap();
        assert_eq!(event.cart, Some(cart()));

        store.clear_cart().await.unwrap();
        let event = watch.recv().await.unwrap();
        assert!(event.cart.is_none());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let store = MemoryStore::new();
        store.save_session(&session()).await.unwrap();
        store.save_cart(&cart()).await.unwrap();

        store.clear_cart().await.unwrap();
        assert!(store.load_session().await.unwrap().is_some());
    }
}
