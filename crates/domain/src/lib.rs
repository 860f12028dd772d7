//! Shared types for the WalletLink crates: configuration, the error type,
//! structured trace events, and the wallet/transaction/flow models that
//! cross crate boundaries.

pub mod config;
pub mod error;
pub mod state;
pub mod trace;
pub mod transaction;
pub mod wallet;

/// Chat-platform user identifier (Telegram user ids are 64-bit).
pub type UserId = i64;
