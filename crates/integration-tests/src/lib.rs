//! Test support for Ramen Bae integration tests.
//!
//! Provides recording in-memory fakes for the cart engine's store ports:
//!
//! - [`RecordingRemoteStore`] - in-memory remote cart store that records
//!   every call and can be switched into a failing mode to exercise the
//!   swallow-and-retry and merge-abort paths.
//! - [`MemoryLocalStore`] - in-memory local durable store shareable
//!   across engine instances to simulate a process restart.
//! - [`StaticIdentity`] - identity provider returning a fixed answer.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[tokio::test(start_paused = true)]
//! async fn my_test() {
//!     let remote = Arc::new(RecordingRemoteStore::default());
//!     let local = Arc::new(MemoryLocalStore::default());
//!     let engine = CartEngine::new(CartConfig::default(), local, remote.clone());
//!     // ...
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use ramen_bae_cart::error::{LocalStoreError, RemoteStoreError};
use ramen_bae_cart::store::{
    IdentityProvider, LocalCartStore, PersistedCart, RemoteCartStore,
};
use ramen_bae_core::{ProductId, RemoteCartId, RemoteLine, UserId};

/// Counts and payload history of every remote store call.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub find_cart: usize,
    pub create_cart: usize,
    pub touch_cart: usize,
    pub read_lines: usize,
    /// One entry per `upsert_lines` call, holding the pushed batch.
    pub upsert_lines: Vec<Vec<RemoteLine>>,
    /// One entry per `delete_lines` call, holding the deleted set.
    pub delete_lines: Vec<Vec<ProductId>>,
}

impl CallLog {
    /// Total number of remote operations issued.
    #[must_use]
    pub fn total(&self) -> usize {
        self.find_cart
            + self.create_cart
            + self.touch_cart
            + self.read_lines
            + self.upsert_lines.len()
            + self.delete_lines.len()
    }
}

#[derive(Default)]
struct RemoteState {
    carts: HashMap<UserId, RemoteCartId>,
    lines: HashMap<RemoteCartId, BTreeMap<ProductId, RemoteLine>>,
    calls: CallLog,
}

/// In-memory [`RemoteCartStore`] that records every call.
#[derive(Default)]
pub struct RecordingRemoteStore {
    state: Mutex<RemoteState>,
    failing: AtomicBool,
}

impl RecordingRemoteStore {
    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch every subsequent operation into returning
    /// `RemoteStoreError::Unavailable`. Calls are still recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RemoteStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteStoreError::Unavailable("injected failure".to_owned()));
        }
        Ok(())
    }

    /// Seed a cart for an owner without recording a call.
    pub fn seed_cart(&self, owner: UserId) -> RemoteCartId {
        let cart = RemoteCartId::generate();
        let mut state = self.lock();
        state.carts.insert(owner, cart);
        state.lines.entry(cart).or_default();
        cart
    }

    /// Seed lines into a cart without recording a call.
    pub fn seed_lines(&self, cart: RemoteCartId, lines: impl IntoIterator<Item = RemoteLine>) {
        let mut state = self.lock();
        let entry = state.lines.entry(cart).or_default();
        for line in lines {
            entry.insert(line.product_id.clone(), line);
        }
    }

    /// The current call log.
    #[must_use]
    pub fn calls(&self) -> CallLog {
        self.lock().calls.clone()
    }

    /// Current remote lines for a cart, sorted by product id.
    #[must_use]
    pub fn lines_for(&self, cart: RemoteCartId) -> Vec<RemoteLine> {
        self.lock()
            .lines
            .get(&cart)
            .map(|lines| lines.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The cart id stored for an owner, if any.
    #[must_use]
    pub fn cart_for(&self, owner: UserId) -> Option<RemoteCartId> {
        self.lock().carts.get(&owner).copied()
    }
}

#[async_trait]
impl RemoteCartStore for RecordingRemoteStore {
    async fn find_cart(&self, owner: UserId) -> Result<Option<RemoteCartId>, RemoteStoreError> {
        self.lock().calls.find_cart += 1;
        self.check_available()?;
        Ok(self.lock().carts.get(&owner).copied())
    }

    async fn create_cart(&self, owner: UserId) -> Result<RemoteCartId, RemoteStoreError> {
        self.lock().calls.create_cart += 1;
        self.check_available()?;
        let mut state = self.lock();
        // Find-or-create, like the unique constraint in the real store
        let cart = *state
            .carts
            .entry(owner)
            .or_insert_with(RemoteCartId::generate);
        state.lines.entry(cart).or_default();
        Ok(cart)
    }

    async fn touch_cart(&self, _cart: RemoteCartId) -> Result<(), RemoteStoreError> {
        self.lock().calls.touch_cart += 1;
        self.check_available()
    }

    async fn read_lines(&self, cart: RemoteCartId) -> Result<Vec<RemoteLine>, RemoteStoreError> {
        self.lock().calls.read_lines += 1;
        self.check_available()?;
        Ok(self.lines_for(cart))
    }

    async fn upsert_lines(
        &self,
        cart: RemoteCartId,
        lines: &[RemoteLine],
    ) -> Result<(), RemoteStoreError> {
        self.lock().calls.upsert_lines.push(lines.to_vec());
        self.check_available()?;
        let mut state = self.lock();
        let entry = state.lines.entry(cart).or_default();
        for line in lines {
            entry.insert(line.product_id.clone(), line.clone());
        }
        Ok(())
    }

    async fn delete_lines(
        &self,
        cart: RemoteCartId,
        products: &[ProductId],
    ) -> Result<(), RemoteStoreError> {
        self.lock().calls.delete_lines.push(products.to_vec());
        self.check_available()?;
        let mut state = self.lock();
        if let Some(entry) = state.lines.get_mut(&cart) {
            for product in products {
                entry.remove(product);
            }
        }
        Ok(())
    }
}

/// In-memory [`LocalCartStore`]; share one across engines to simulate a
/// restart.
#[derive(Default)]
pub struct MemoryLocalStore {
    records: Mutex<HashMap<String, PersistedCart>>,
}

impl MemoryLocalStore {
    /// Read the raw persisted record for assertions.
    #[must_use]
    pub fn record(&self, key: &str) -> Option<PersistedCart> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl LocalCartStore for MemoryLocalStore {
    fn save(&self, key: &str, record: &PersistedCart) -> Result<(), LocalStoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), record.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<PersistedCart>, LocalStoreError> {
        Ok(self.record(key))
    }
}

/// Identity provider returning a fixed answer.
pub struct StaticIdentity(pub Option<UserId>);

impl IdentityProvider for StaticIdentity {
    fn current_identity(&self) -> Option<UserId> {
        self.0
    }
}
