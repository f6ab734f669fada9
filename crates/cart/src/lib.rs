//! Ramen Bae cart engine.
//!
//! Local-first shopping cart state with debounced remote synchronization
//! and a one-time guest-to-account merge.
//!
//! # Architecture
//!
//! [`CartEngine`] owns the in-memory cart for the current session. Every
//! mutation applies synchronously, recomputes derived fields, writes the
//! durable subset to a [`store::LocalCartStore`], and (for account-linked
//! sessions only) schedules a trailing-debounced push to a
//! [`store::RemoteCartStore`]. Remote failures are logged and swallowed:
//! the local cart is always authoritative for display, and the next
//! mutation's push retries with current state.
//!
//! # Modules
//!
//! - [`config`] - debounce window, storage key, and reward tiers
//! - [`engine`] - the [`CartEngine`] itself
//! - [`error`] - error taxonomy per layer
//! - [`store`] - local/remote store ports and their implementations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod engine;
pub mod error;
pub mod store;

pub use config::CartConfig;
pub use engine::CartEngine;
pub use error::{CartError, LocalStoreError, RemoteStoreError};
