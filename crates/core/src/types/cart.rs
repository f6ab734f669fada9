//! Cart line and snapshot types.
//!
//! These are pure data types plus the derived-field recomputation that
//! keeps `item_count`, `subtotal`, and unlocked rewards consistent with
//! the underlying lines. All mutation policy (accumulation, debounce,
//! merge) lives in the `ramen-bae-cart` engine; this module only knows
//! how to describe a cart and re-derive its aggregates.

use serde::{Deserialize, Serialize};

use super::id::{LineId, ProductId, RewardId};
use super::price::{CurrencyCode, Price};
use super::reward::RewardTier;

/// Read-only view of a catalog product at add-to-cart time.
///
/// The cart copies these fields into the new [`CartLine`] and never
/// refreshes them afterwards, so a mid-session price change cannot
/// silently alter an already-displayed cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub image_url: String,
    pub slug: String,
}

/// A single product-quantity pairing within a cart.
///
/// Invariant: `quantity >= 1`. A line whose quantity would drop to zero
/// is removed by the engine, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: LineId,
    pub product_id: ProductId,
    /// Display name snapshot taken at first add.
    pub name: String,
    /// Unit price snapshot taken at first add.
    pub unit_price: Price,
    pub quantity: u32,
    pub image_url: String,
    pub slug: String,
}

impl CartLine {
    /// Create a fresh line from a product snapshot.
    #[must_use]
    pub fn new(product: &ProductRef, quantity: u32) -> Self {
        Self {
            line_id: LineId::generate(),
            product_id: product.product_id.clone(),
            name: product.name.clone(),
            unit_price: product.unit_price,
            quantity,
            image_url: product.image_url.clone(),
            slug: product.slug.clone(),
        }
    }

    /// Rebuild a line from its remote representation, generating a fresh
    /// local line ID (line IDs are never shared across devices).
    #[must_use]
    pub fn from_remote(remote: RemoteLine) -> Self {
        Self {
            line_id: LineId::generate(),
            product_id: remote.product_id,
            name: remote.name,
            unit_price: remote.unit_price,
            quantity: remote.quantity,
            image_url: remote.image_url,
            slug: remote.slug,
        }
    }

    /// The line total (`unit_price * quantity`).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A cart line as stored remotely, keyed by `(cart, product)`.
///
/// Carries the same denormalized display snapshot as [`CartLine`] so a
/// pull or merge can rebuild local state without a catalog round trip.
/// Local line IDs are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub image_url: String,
    pub slug: String,
}

impl From<&CartLine> for RemoteLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            image_url: line.image_url.clone(),
            slug: line.slug.clone(),
        }
    }
}

/// The aggregate, derived view of a cart at a point in time.
///
/// `item_count`, `subtotal`, and `unlocked_rewards` are always recomputed
/// from `lines` via [`CartSnapshot::recompute`] - never incrementally
/// patched, so they cannot drift from the source lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Lines in insertion order (stable for display; order is not part
    /// of any correctness contract).
    pub lines: Vec<CartLine>,
    /// Sum of all line quantities.
    pub item_count: u32,
    /// Sum of `unit_price * quantity` over all lines.
    pub subtotal: Price,
    /// Reward tiers whose threshold is at or below the subtotal, in
    /// tier order.
    pub unlocked_rewards: Vec<RewardId>,
}

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            item_count: 0,
            subtotal: Price::zero(CurrencyCode::USD),
            unlocked_rewards: Vec::new(),
        }
    }

    /// Recompute all derived fields from `lines`.
    ///
    /// Must be called after every mutation of `lines`. The subtotal
    /// currency follows the first line (the store prices everything in a
    /// single currency).
    pub fn recompute(&mut self, tiers: &[RewardTier]) {
        let currency = self
            .lines
            .first()
            .map_or_else(CurrencyCode::default, |line| line.unit_price.currency_code);

        self.item_count = self.lines.iter().map(|line| line.quantity).sum();
        self.subtotal = self
            .lines
            .iter()
            .fold(Price::zero(currency), |acc, line| Price {
                amount: acc.amount + line.line_total().amount,
                currency_code: currency,
            });
        self.unlocked_rewards = tiers
            .iter()
            .filter(|tier| tier.threshold <= self.subtotal.amount)
            .map(|tier| tier.id.clone())
            .collect();
    }

    /// Look up a line by product.
    #[must_use]
    pub fn line_for(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines
            .iter()
            .find(|line| &line.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for CartSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}
