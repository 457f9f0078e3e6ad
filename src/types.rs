//! Re-exported types from external crates for convenience.
//!
//! These types are commonly used in this crate and are re-exported here
//! so users don't need to add these dependencies to their `Cargo.toml`.

/// Ethereum address type and the [`address!`] macro for compile-time address literals.
/// [`ChainId`] is a type alias for `u64` representing EVM chain IDs.
/// [`Signature`] represents the wallet signature produced during sign-in.
pub use alloy::primitives::{Address, ChainId, Signature, address};
/// Date and time types for timestamps in notifications and sign-in messages.
pub use chrono::{DateTime, Utc};
/// Arbitrary precision decimal type for bill amounts, tips and totals.
pub use rust_decimal::Decimal;
/// Macro for creating [`Decimal`] literals at compile time.
///
/// # Example
/// ```
/// use payverge_client::types::dec;
/// let tip = dec!(2.50);
/// ```
pub use rust_decimal_macros::dec;
