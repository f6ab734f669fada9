//! Ramen Bae Core - Shared types library.
//!
//! This crate provides common types used across all Ramen Bae components:
//! - `cart` - Cart engine with local persistence and remote sync
//! - future storefront/admin binaries
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and allows it to be
//! used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and prices, cart line
//!   and snapshot types, and reward tier configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
