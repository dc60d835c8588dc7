//! Account ledger: types, storage contract, authentication

pub mod auth;
pub mod store;
pub mod types;

pub use store::{AccountStore, EmailPolicy, MemoryStore, StoreError};
pub use types::{Account, BadgeTier, CardTier, MintReservation, PublicAccount, ScratchVoucher};
