//! Reward tier configuration.
//!
//! A reward tier unlocks once the cart subtotal reaches its threshold.
//! Tiers are configuration data, identical across all carts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::RewardId;

/// A subtotal threshold paired with the reward it unlocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTier {
    /// Subtotal (in the store currency) at which the reward unlocks.
    /// The comparison is inclusive: a subtotal exactly at the threshold
    /// unlocks the tier.
    pub threshold: Decimal,
    /// Identifier of the unlocked reward.
    pub id: RewardId,
}

impl RewardTier {
    /// Create a tier.
    #[must_use]
    pub fn new(threshold: Decimal, id: impl Into<RewardId>) -> Self {
        Self {
            threshold,
            id: id.into(),
        }
    }

    /// The store's standard tiers: free shipping at $40, free gift at $60.
    #[must_use]
    pub fn default_tiers() -> Vec<Self> {
        vec![
            Self::new(Decimal::from(40), RewardId::new("free-shipping")),
            Self::new(Decimal::from(60), RewardId::new("free-gift")),
        ]
    }
}
