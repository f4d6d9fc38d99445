//! Clementine Storefront client library.
//!
//! The session-lifecycle and cart core of the Clementine storefront: a
//! shopping cart that behaves correctly for anonymous visitors (client-held
//! state) and authenticated users (server-held state), a one-time
//! stock-aware merge of the two at login, and an access/refresh token
//! protocol that survives token expiry transparently, exactly once per
//! request.
//!
//! # Components
//!
//! - [`storage`] - the injected persistence boundary ([`storage::StateStore`])
//! - [`api`] - the [`api::RequestPipeline`] wrapping all backend calls
//! - [`auth`] - [`auth::TokenStore`] and [`auth::AuthGateway`]
//! - [`cart`] - [`cart::CartStore`] and [`cart::CartReconciler`]
//! - [`wishlist`] - the guest/server wishlist
//! - [`client`] - the [`client::Storefront`] facade wiring everything up

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod client;
pub mod config;
pub mod error;
pub mod storage;
pub mod wishlist;

pub use client::Storefront;
pub use error::{ApiError, Result};
