//! Client for the Payverge REST API.
//!
//! **Feature flag:** `api`
//!
//! Covers Sign-In-With-Ethereum authentication and user lookup. [`Client`] also implements
//! [`crate::session::ProfileFetcher`], so it can back a [`crate::session::SessionGate`].

pub mod client;
pub mod types;

pub use client::{Client, Config};
