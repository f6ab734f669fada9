//! Core types for Ramen Bae.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cart;
pub mod id;
pub mod price;
pub mod reward;

pub use cart::{CartLine, CartSnapshot, ProductRef, RemoteLine};
pub use id::*;
pub use price::{CurrencyCode, Price};
pub use reward::RewardTier;
