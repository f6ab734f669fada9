//! Store ports consumed by the cart engine.
//!
//! The engine is written against two passive stores and an identity
//! source, all injected at construction:
//!
//! - [`LocalCartStore`] - single-device durable storage (survives a
//!   process restart, no network involved). Synchronous; writes happen
//!   before a mutation returns.
//! - [`RemoteCartStore`] - the account-linked authoritative store,
//!   reachable only when a user identity exists. Asynchronous; all line
//!   writes are batched.
//! - [`IdentityProvider`] - source of the current user identity, queried
//!   once per login-state check (never polled by the engine).
//!
//! Neither store ever originates a cart change; they reflect what the
//! engine tells them (the login-time pull that seeds a merge is the one
//! sanctioned read).

pub mod json_file;
pub mod postgres;

use async_trait::async_trait;
use ramen_bae_core::{ProductId, RemoteCartId, RemoteLine, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{LocalStoreError, RemoteStoreError};

pub use json_file::JsonFileStore;
pub use postgres::PgCartStore;

/// The durable subset of engine state written to local storage.
///
/// Derived fields are deliberately absent: they are recomputed from
/// `lines` on load and never trusted across a restart boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCart {
    pub lines: Vec<ramen_bae_core::CartLine>,
    pub remote_cart_id: Option<RemoteCartId>,
}

/// Single-device durable storage with overwrite-whole-value semantics.
pub trait LocalCartStore: Send + Sync {
    /// Overwrite the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the write fails. The engine treats
    /// this as an environment fault: logged, not propagated.
    fn save(&self, key: &str, record: &PersistedCart) -> Result<(), LocalStoreError>;

    /// Load the last record saved under `key`, or `None` if never saved.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the read or deserialization fails.
    fn load(&self, key: &str) -> Result<Option<PersistedCart>, LocalStoreError>;
}

/// The remote authoritative cart store.
///
/// Line writes are keyed by `(cart, product)` and batched: one call per
/// push regardless of cart size.
#[async_trait]
pub trait RemoteCartStore: Send + Sync {
    /// Find the cart owned by `owner`, if one exists.
    async fn find_cart(&self, owner: UserId) -> Result<Option<RemoteCartId>, RemoteStoreError>;

    /// Create (or atomically find) the cart owned by `owner`.
    ///
    /// Implementations must be safe to call concurrently for the same
    /// owner: at most one cart per owner may ever exist.
    async fn create_cart(&self, owner: UserId) -> Result<RemoteCartId, RemoteStoreError>;

    /// Update the cart's timestamp without changing content.
    async fn touch_cart(&self, cart: RemoteCartId) -> Result<(), RemoteStoreError>;

    /// Read all lines for a cart.
    async fn read_lines(&self, cart: RemoteCartId) -> Result<Vec<RemoteLine>, RemoteStoreError>;

    /// Insert-or-replace the given lines in one batched operation.
    async fn upsert_lines(
        &self,
        cart: RemoteCartId,
        lines: &[RemoteLine],
    ) -> Result<(), RemoteStoreError>;

    /// Delete the lines for the given products in one batched operation.
    async fn delete_lines(
        &self,
        cart: RemoteCartId,
        products: &[ProductId],
    ) -> Result<(), RemoteStoreError>;
}

/// Source of the current user identity.
pub trait IdentityProvider: Send + Sync {
    /// The currently-authenticated user, or `None` for a guest session.
    fn current_identity(&self) -> Option<UserId>;
}
