//! The cart engine: authoritative in-memory cart state for one session.
//!
//! Mutations apply synchronously and deterministically to in-memory
//! state, write the durable subset to local storage before returning,
//! and schedule a trailing-debounced remote push for account-linked
//! sessions. Rapid mutations coalesce into one push carrying the latest
//! state; intermediate states are never individually transmitted.
//!
//! `clear` is the one mutation that pushes immediately: losing a
//! clear-cart intent to a cancelled debounce window is user-visible and
//! hard to recover from.
//!
//! The engine is a cheaply-cloneable handle (`Arc` inner); construct one
//! per session and hand clones to whatever needs it. All interior state
//! sits behind one mutex that is never held across an await.

use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument, warn};

use ramen_bae_core::{
    CartLine, CartSnapshot, ProductId, ProductRef, RemoteCartId, RemoteLine, UserId,
};

use crate::config::CartConfig;
use crate::error::Result;
use crate::store::{IdentityProvider, LocalCartStore, PersistedCart, RemoteCartStore};

/// In-process cart state holder for the current session.
#[derive(Clone)]
pub struct CartEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: CartConfig,
    local: Arc<dyn LocalCartStore>,
    remote: Arc<dyn RemoteCartStore>,
    state: Mutex<CartState>,
    /// Monotonic counter superseding pending debounced pushes. A sleeping
    /// push task fires only if no later mutation bumped the counter, so
    /// at most one pending push exists at a time.
    push_epoch: AtomicU64,
}

struct CartState {
    snapshot: CartSnapshot,
    identity: Option<UserId>,
    remote_cart_id: Option<RemoteCartId>,
    open: bool,
}

impl CartEngine {
    /// Create an engine with an empty cart.
    #[must_use]
    pub fn new(
        config: CartConfig,
        local: Arc<dyn LocalCartStore>,
        remote: Arc<dyn RemoteCartStore>,
    ) -> Self {
        Self::with_record(config, local, remote, None)
    }

    /// Create an engine seeded from the local durable store.
    ///
    /// Derived fields are recomputed from the persisted lines, never
    /// trusted across a restart boundary.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Local` if the persisted record cannot be read.
    pub fn load(
        config: CartConfig,
        local: Arc<dyn LocalCartStore>,
        remote: Arc<dyn RemoteCartStore>,
    ) -> Result<Self> {
        let record = local.load(&config.storage_key)?;
        Ok(Self::with_record(config, local, remote, record))
    }

    fn with_record(
        config: CartConfig,
        local: Arc<dyn LocalCartStore>,
        remote: Arc<dyn RemoteCartStore>,
        record: Option<PersistedCart>,
    ) -> Self {
        let mut snapshot = CartSnapshot::empty();
        let mut remote_cart_id = None;
        if let Some(record) = record {
            snapshot.lines = record.lines;
            remote_cart_id = record.remote_cart_id;
        }
        snapshot.recompute(&config.reward_tiers);

        Self {
            inner: Arc::new(EngineInner {
                config,
                local,
                remote,
                state: Mutex::new(CartState {
                    snapshot,
                    identity: None,
                    remote_cart_id,
                    open: false,
                }),
                push_epoch: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` of a product to the cart.
    ///
    /// If a line for the product already exists its quantity accumulates;
    /// the display snapshot (`name`, `unit_price`, `image_url`, `slug`)
    /// taken at first add is kept, so a mid-session price change never
    /// silently alters an already-displayed cart. Opens the cart UI.
    pub fn add_line(&self, product: &ProductRef, quantity: NonZeroU32) {
        let mut state = self.lock();
        let existing = state
            .snapshot
            .lines
            .iter()
            .position(|line| line.product_id == product.product_id);
        match existing {
            Some(index) => {
                if let Some(line) = state.snapshot.lines.get_mut(index) {
                    line.quantity = line.quantity.saturating_add(quantity.get());
                }
            }
            None => state
                .snapshot
                .lines
                .push(CartLine::new(product, quantity.get())),
        }
        state.open = true;
        self.finish_mutation(&mut state);
    }

    /// Remove the line for a product. No-op if the product is not in the
    /// cart.
    pub fn remove_line(&self, product_id: &ProductId) {
        let mut state = self.lock();
        let before = state.snapshot.lines.len();
        state
            .snapshot
            .lines
            .retain(|line| &line.product_id != product_id);
        if state.snapshot.lines.len() == before {
            return;
        }
        self.finish_mutation(&mut state);
    }

    /// Set the quantity for a product's line to exactly `quantity`.
    ///
    /// A quantity of zero removes the line. No-op if the product is not
    /// in the cart.
    pub fn update_quantity(&self, product_id: &ProductId, quantity: u32) {
        let Some(quantity) = NonZeroU32::new(quantity) else {
            self.remove_line(product_id);
            return;
        };

        let mut state = self.lock();
        let Some(line) = state
            .snapshot
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
        else {
            return;
        };
        line.quantity = quantity.get();
        self.finish_mutation(&mut state);
    }

    /// Empty the cart and push the cleared state immediately.
    ///
    /// Bypasses the debounce window: any pending push is superseded and
    /// the empty cart is pushed right away, so a page navigation cannot
    /// drop the clearing intent. Push failures are logged and swallowed
    /// like any other sync failure.
    pub async fn clear(&self) {
        {
            let mut state = self.lock();
            state.snapshot.lines.clear();
            state.snapshot.recompute(&self.inner.config.reward_tiers);
            self.persist_locked(&state);
            // Supersede any pending debounced push; the immediate push
            // below carries the cleared state.
            self.inner.push_epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.push_now().await;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The current snapshot. Pure read, no side effects.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.lock().snapshot.clone()
    }

    /// Whether the cart UI is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    /// Open or close the cart UI. Display state only; nothing is synced.
    pub fn set_open(&self, open: bool) {
        self.lock().open = open;
    }

    // =========================================================================
    // Identity and merge
    // =========================================================================

    /// Query the identity provider once and react to a login.
    ///
    /// - Guest session, no identity: nothing happens.
    /// - Identity already linked this session: nothing happens.
    /// - Fresh identity on a never-synced cart: runs the one-time guest
    ///   cart merge.
    /// - Fresh identity but a remote cart id survived a restart: this is
    ///   a returning account-linked session, not a guest cart acquiring
    ///   an owner, so the identity is relinked and a debounced push
    ///   reconciles instead of re-merging (a re-merge would double every
    ///   quantity already synced).
    ///
    /// # Errors
    ///
    /// Propagates merge failures so the caller can retry on the next
    /// login-state check.
    pub async fn refresh_identity(&self, provider: &dyn IdentityProvider) -> Result<()> {
        let Some(owner) = provider.current_identity() else {
            return Ok(());
        };

        {
            let mut state = self.lock();
            if state.identity.is_some() {
                return Ok(());
            }
            if state.remote_cart_id.is_some() {
                state.identity = Some(owner);
                self.schedule_push_locked(&state);
                return Ok(());
            }
        }

        self.merge_on_login(owner).await
    }

    /// One-time guest-to-account merge, run when a previously-anonymous
    /// session acquires an identity.
    ///
    /// Quantities from the guest cart and the account cart are summed,
    /// never one replacing the other: a guest who added items before
    /// logging in keeps them, without duplicating against items saved
    /// from another device. An empty local cart short-circuits to a
    /// plain pull-and-replace.
    ///
    /// In-memory state is replaced only after every remote step has
    /// succeeded; on failure the pre-merge state is left untouched and
    /// the error is returned for the caller to retry.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Remote` if any remote step fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn merge_on_login(&self, owner: UserId) -> Result<()> {
        let local_lines = self.lock().snapshot.lines.clone();

        let remote = Arc::clone(&self.inner.remote);
        let cart = match remote.find_cart(owner).await? {
            Some(cart) => cart,
            None => remote.create_cart(owner).await?,
        };
        let remote_lines = remote.read_lines(cart).await?;

        let merged = if local_lines.is_empty() {
            // Merging an empty set is a plain load; skip the write-back.
            remote_lines.into_iter().map(CartLine::from_remote).collect()
        } else {
            let merged = merge_lines(local_lines, remote_lines);
            let payload: Vec<RemoteLine> = merged.iter().map(RemoteLine::from).collect();
            remote.upsert_lines(cart, &payload).await?;
            merged
        };

        let mut state = self.lock();
        state.snapshot.lines = merged;
        state.identity = Some(owner);
        state.remote_cart_id = Some(cart);
        state.snapshot.recompute(&self.inner.config.reward_tiers);
        self.persist_locked(&state);
        debug!(cart = %cart, "guest cart merged into account cart");
        Ok(())
    }

    // =========================================================================
    // Persistence and sync internals
    // =========================================================================

    fn finish_mutation(&self, state: &mut CartState) {
        state.snapshot.recompute(&self.inner.config.reward_tiers);
        self.persist_locked(state);
        self.schedule_push_locked(state);
    }

    fn persist_locked(&self, state: &CartState) {
        let record = PersistedCart {
            lines: state.snapshot.lines.clone(),
            remote_cart_id: state.remote_cart_id,
        };
        if let Err(error) = self.inner.local.save(&self.inner.config.storage_key, &record) {
            // Local storage exhaustion is an environment fault, not a
            // recoverable path; the in-memory cart stays correct.
            warn!(%error, "failed to persist cart locally");
        }
    }

    /// Schedule a trailing-debounced push. Anonymous sessions never
    /// contact the remote store, so this is a no-op without an identity.
    fn schedule_push_locked(&self, state: &CartState) {
        if state.identity.is_none() {
            return;
        }

        let epoch = self.inner.push_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let engine = self.clone();
        let quiet = self.inner.config.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            // A later mutation (or a clear) superseded this push.
            if engine.inner.push_epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            engine.push_now().await;
        });
    }

    async fn push_now(&self) {
        if let Err(error) = self.try_push().await {
            // Never surfaces to the user; the next mutation's debounced
            // push retries with current state.
            warn!(%error, "cart sync failed; local state remains authoritative");
        }
    }

    async fn try_push(&self) -> Result<()> {
        let (lines, identity, cached) = {
            let state = self.lock();
            (
                state.snapshot.lines.clone(),
                state.identity,
                state.remote_cart_id,
            )
        };
        let Some(owner) = identity else {
            return Ok(());
        };

        let remote = Arc::clone(&self.inner.remote);
        let cart = match cached {
            Some(cart) => {
                remote.touch_cart(cart).await?;
                cart
            }
            None => {
                let cart = match remote.find_cart(owner).await? {
                    Some(cart) => cart,
                    None => remote.create_cart(owner).await?,
                };
                self.cache_remote_cart(cart);
                cart
            }
        };

        // Delete remote lines whose product vanished locally, in one
        // batched call; then one batched upsert of everything present.
        let present: HashSet<&ProductId> = lines.iter().map(|line| &line.product_id).collect();
        let existing = remote.read_lines(cart).await?;
        let stale: Vec<ProductId> = existing
            .iter()
            .map(|line| line.product_id.clone())
            .filter(|product| !present.contains(product))
            .collect();
        if !stale.is_empty() {
            remote.delete_lines(cart, &stale).await?;
        }
        if !lines.is_empty() {
            let payload: Vec<RemoteLine> = lines.iter().map(RemoteLine::from).collect();
            remote.upsert_lines(cart, &payload).await?;
        }
        Ok(())
    }

    /// Cache the remote cart id for the rest of the session (and persist
    /// it, so a restart reuses the same cart instead of creating one).
    fn cache_remote_cart(&self, cart: RemoteCartId) {
        let mut state = self.lock();
        state.remote_cart_id = Some(cart);
        self.persist_locked(&state);
    }
}

/// Combine a guest cart with an account cart: quantities for products in
/// both are summed; guest display snapshots win for products in both
/// (those are what the user is currently looking at); remote-only
/// products are rebuilt with fresh local line ids.
fn merge_lines(mut local: Vec<CartLine>, remote: Vec<RemoteLine>) -> Vec<CartLine> {
    for remote_line in remote {
        let existing = local
            .iter()
            .position(|line| line.product_id == remote_line.product_id);
        match existing {
            Some(index) => {
                if let Some(line) = local.get_mut(index) {
                    line.quantity = line.quantity.saturating_add(remote_line.quantity);
                }
            }
            None => local.push(CartLine::from_remote(remote_line)),
        }
    }
    local
}
