//! Integration tests for the Clementine storefront client.
//!
//! Every test stands up a [`mockito`] backend and drives the full
//! [`clementine_storefront::Storefront`] facade through it, so the whole
//! wiring is exercised: token store, request pipeline, cart, wishlist, and
//! the login-time reconciliation. No external services are required.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p clementine-integration-tests
//!
//! # with pipeline traces
//! RUST_LOG=clementine_storefront=debug cargo test -p clementine-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_lifecycle` - login, refresh-and-replay, forced logout
//! - `cart_merge` - guest cart behavior and the merge at login

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`. Safe to call from every
/// test; only the first call wins.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
