//! Badge entitlements and the external mint flow

pub mod client;
pub mod coordinator;

pub use client::{BadgeMinter, HttpMinter, MintError, MintReceipt, MockMinter};
pub use coordinator::{MintCoordinator, MintOutcome, MintPhase};
