//! Clementine Core - Shared types library.
//!
//! This crate provides common types used across all Clementine components:
//! - `storefront` - The storefront client (session, cart, wishlist)
//! - `integration-tests` - End-to-end test flows
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! This keeps it lightweight and allows it to be used anywhere, including
//! inside test backends that need to speak the same wire contract.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, email, money, product snapshots, cart lines,
//!   user profiles, and sessions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
