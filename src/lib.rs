//! Scratchvault: token-economy scratch-card game backend
//!
//! Account ledger and entitlement engine: balances, bearer-token
//! authentication, card purchases and prize draws, and a two-phase badge
//! mint against an external blockchain service with rollback on failure.

pub mod account;
pub mod config;
pub mod error;
pub mod game;
pub mod mint;
pub mod rate_limit;
pub mod rpc;
pub mod storage;
