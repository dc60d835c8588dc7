//! Entitlement and mint coordination
//!
//! Per-attempt state machine:
//! `Eligible -> TokensReserved -> Minting -> Committed | RolledBack`.
//! The token debit is the compensable step: a reservation record is
//! persisted alongside it, and a failed or timed-out mint triggers a
//! compensating credit before the error reaches the caller.

use crate::account::store::{self, AccountStore};
use crate::account::types::{BadgeTier, MintReservation};
use crate::error::ApiError;
use crate::game::catalog::badge_config;
use crate::mint::client::BadgeMinter;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Compensating credit for a reserved amount.
fn refund(
    store: &dyn AccountStore,
    user_id: &str,
    amount: u64,
) -> Result<crate::account::types::Account, ApiError> {
    store::update(store, user_id, |account| {
        account.token_balance = account
            .token_balance
            .checked_add(amount)
            .ok_or_else(|| ApiError::Internal("refund overflowed balance".to_string()))?;
        Ok::<(), ApiError>(())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintPhase {
    Eligible,
    TokensReserved,
    Minting,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MintOutcome {
    pub transaction_hash: String,
    pub new_balance: u64,
}

#[derive(Clone)]
pub struct MintCoordinator {
    store: Arc<dyn AccountStore>,
    minter: Arc<dyn BadgeMinter>,
}

impl MintCoordinator {
    pub fn new(store: Arc<dyn AccountStore>, minter: Arc<dyn BadgeMinter>) -> Self {
        Self { store, minter }
    }

    /// Run one mint attempt to completion. The external call and its
    /// commit/rollback run on a spawned task, so a caller that
    /// disconnects mid-mint cannot strand the reservation.
    pub async fn mint_badge(&self, user_id: &str, tier: BadgeTier) -> Result<MintOutcome, ApiError> {
        let cost = badge_config(tier).token_cost;
        debug!(user = user_id, badge = %tier, phase = ?MintPhase::Eligible, "mint attempt");

        // Preconditions re-validated inside the CAS loop, first failure
        // wins: wallet, already-minted, balance.
        let reserved = store::update(&*self.store, user_id, |account| {
            if account.wallet_address.is_none() {
                return Err(ApiError::NoWallet);
            }
            if account.minted_badges.has(tier) {
                return Err(ApiError::AlreadyMinted { tier });
            }
            account.token_balance = account
                .token_balance
                .checked_sub(cost)
                .ok_or(ApiError::InsufficientBalance {
                    balance: account.token_balance,
                    required: cost,
                })?;
            Ok::<(), ApiError>(())
        })?;

        let wallet = reserved
            .wallet_address
            .clone()
            .ok_or_else(|| ApiError::Internal("wallet vanished after reservation".to_string()))?;

        let reservation = MintReservation::reserve(user_id, tier, cost);
        if let Err(store_err) = self.store.put_reservation(reservation.clone()) {
            // The debit is already committed with no reservation for
            // reconciliation to find; restore it before surfacing the fault
            if let Err(refund_err) = refund(&*self.store, user_id, cost) {
                error!(
                    user = user_id,
                    amount = cost,
                    "refund after reservation write failure also failed: {}",
                    refund_err
                );
            }
            return Err(store_err.into());
        }
        debug!(
            user = user_id,
            reservation = %reservation.id,
            phase = ?MintPhase::TokensReserved,
            "reservation persisted"
        );

        info!(
            user = user_id,
            badge = %tier,
            cost,
            phase = ?MintPhase::Minting,
            "tokens reserved, minting"
        );

        let store = self.store.clone();
        let minter = self.minter.clone();
        let user = user_id.to_string();
        let task = tokio::spawn(async move {
            match minter.mint(&wallet, tier).await {
                Ok(receipt) => {
                    // The flag is re-checked inside the commit CAS: two
                    // attempts can both pass the reservation preconditions,
                    // but only the first commit may set it. The loser
                    // refunds its own debit.
                    let commit = store::update(&*store, &user, |account| {
                        if account.minted_badges.has(tier) {
                            return Err(ApiError::AlreadyMinted { tier });
                        }
                        account.minted_badges.set(tier);
                        Ok::<(), ApiError>(())
                    });
                    match commit {
                        Ok(committed) => {
                            store.delete_reservation(&reservation.id)?;
                            info!(
                                user = %user,
                                badge = %tier,
                                tx = %receipt.transaction_hash,
                                phase = ?MintPhase::Committed,
                                "badge minted"
                            );
                            Ok(MintOutcome {
                                transaction_hash: receipt.transaction_hash,
                                new_balance: committed.token_balance,
                            })
                        }
                        Err(ApiError::AlreadyMinted { tier }) => {
                            let restored = refund(&*store, &user, reservation.amount)?;
                            store.delete_reservation(&reservation.id)?;
                            warn!(
                                user = %user,
                                badge = %tier,
                                balance = restored.token_balance,
                                phase = ?MintPhase::RolledBack,
                                "concurrent attempt already committed this badge, refunding"
                            );
                            Err(ApiError::AlreadyMinted { tier })
                        }
                        Err(e) => Err(e),
                    }
                }
                Err(mint_err) => {
                    // Compensating action: restore the pre-debit balance
                    let restored = refund(&*store, &user, reservation.amount)?;
                    store.delete_reservation(&reservation.id)?;
                    warn!(
                        user = %user,
                        badge = %tier,
                        balance = restored.token_balance,
                        phase = ?MintPhase::RolledBack,
                        "mint failed, tokens refunded: {}",
                        mint_err
                    );
                    Err(ApiError::MintFailed(mint_err.to_string()))
                }
            }
        });

        task.await
            .map_err(|e| ApiError::Internal(format!("mint task aborted: {}", e)))?
    }

    /// Startup recovery: any reservation still in the store belongs to an
    /// attempt the process did not see through. The mint outcome is
    /// unknown, so the tokens are refunded and the record dropped.
    pub fn reconcile_reservations(&self) -> Result<usize, ApiError> {
        let pending = self.store.list_reservations()?;
        let mut refunded = 0;
        for reservation in pending {
            match refund(&*self.store, &reservation.user_id, reservation.amount) {
                Ok(_) => {
                    warn!(
                        user = %reservation.user_id,
                        badge = %reservation.tier,
                        amount = reservation.amount,
                        "refunded stale mint reservation"
                    );
                }
                Err(ApiError::AccountNotFound) => {
                    warn!(
                        user = %reservation.user_id,
                        "dropping reservation for unknown account"
                    );
                }
                Err(e) => return Err(e),
            }
            self.store.delete_reservation(&reservation.id)?;
            refunded += 1;
        }
        Ok(refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::store::{MemoryStore, StoreError};
    use crate::account::types::{Account, ScratchVoucher};
    use crate::mint::client::MockMinter;
    use std::time::Duration;

    fn seeded_store(balance: u64, wallet: Option<&str>) -> (Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let mut account =
            Account::new("player@example.com".to_string(), "hash".to_string(), balance);
        account.wallet_address = wallet.map(|w| w.to_string());
        let id = account.id.clone();
        store.insert(account).unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn test_successful_mint_commits() {
        let (store, user) = seeded_store(100, Some("0xabc"));
        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::succeeding("0xhash")));

        let outcome = coordinator
            .mint_badge(&user, BadgeTier::Bronze)
            .await
            .unwrap();
        assert_eq!(outcome.transaction_hash, "0xhash");
        assert_eq!(outcome.new_balance, 90);

        let account = store.get(&user).unwrap().unwrap();
        assert_eq!(account.token_balance, 90);
        assert!(account.minted_badges.bronze);
        assert!(store.list_reservations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mint_rolls_back() {
        // Balance 10, bronze costs 10: debit hits 0, then the refund
        // restores 10 and the badge stays unminted.
        let (store, user) = seeded_store(10, Some("0xabc"));
        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::failing("chain down")));

        let err = coordinator
            .mint_badge(&user, BadgeTier::Bronze)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MintFailed(_)));

        let account = store.get(&user).unwrap().unwrap();
        assert_eq!(account.token_balance, 10);
        assert!(!account.minted_badges.bronze);
        assert!(store.list_reservations().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_mint_fails_already_minted() {
        let (store, user) = seeded_store(200, Some("0xabc"));
        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::succeeding("0xhash")));

        coordinator
            .mint_badge(&user, BadgeTier::Silver)
            .await
            .unwrap();
        let err = coordinator
            .mint_badge(&user, BadgeTier::Silver)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::AlreadyMinted {
                tier: BadgeTier::Silver
            }
        );
        // No second debit
        assert_eq!(store.get(&user).unwrap().unwrap().token_balance, 150);
    }

    #[tokio::test]
    async fn test_precondition_order_wallet_first() {
        // No wallet and no balance: NoWallet must win
        let (store, user) = seeded_store(0, None);
        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::succeeding("0xhash")));

        let err = coordinator
            .mint_badge(&user, BadgeTier::Gold)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::NoWallet);
    }

    #[tokio::test]
    async fn test_insufficient_balance_no_debit() {
        let (store, user) = seeded_store(40, Some("0xabc"));
        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::succeeding("0xhash")));

        let err = coordinator
            .mint_badge(&user, BadgeTier::Silver)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::InsufficientBalance {
                balance: 40,
                required: 50
            }
        );
        assert_eq!(store.get(&user).unwrap().unwrap().token_balance, 40);
    }

    #[tokio::test]
    async fn test_concurrent_same_tier_mints_charge_once() {
        // Both attempts pass the reservation preconditions before either
        // commits (the minter is slow); exactly one may win. The loser
        // must refund its debit and report AlreadyMinted.
        let (store, user) = seeded_store(100, Some("0xabc"));
        let minter =
            Arc::new(MockMinter::succeeding("0xhash").with_delay(Duration::from_millis(50)));
        let coordinator = MintCoordinator::new(store.clone(), minter);

        let (a, b) = tokio::join!(
            coordinator.mint_badge(&user, BadgeTier::Bronze),
            coordinator.mint_badge(&user, BadgeTier::Bronze)
        );

        let mut wins = 0;
        let mut lost_races = 0;
        for outcome in [a, b] {
            match outcome {
                Ok(_) => wins += 1,
                Err(ApiError::AlreadyMinted { .. }) => lost_races += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((wins, lost_races), (1, 1));

        // Charged exactly once
        let account = store.get(&user).unwrap().unwrap();
        assert_eq!(account.token_balance, 90);
        assert!(account.minted_badges.bronze);
        assert!(store.list_reservations().unwrap().is_empty());
    }

    /// Store whose reservation writes always fail.
    struct FlakyReservationStore {
        inner: MemoryStore,
    }

    impl AccountStore for FlakyReservationStore {
        fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
            self.inner.get(id)
        }
        fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
            self.inner.find_by_email(email)
        }
        fn insert(&self, account: Account) -> Result<(), StoreError> {
            self.inner.insert(account)
        }
        fn compare_and_swap(&self, expected: u64, account: Account) -> Result<(), StoreError> {
            self.inner.compare_and_swap(expected, account)
        }
        fn put_voucher(&self, voucher: ScratchVoucher) -> Result<(), StoreError> {
            self.inner.put_voucher(voucher)
        }
        fn take_voucher(&self, id: &str) -> Result<Option<ScratchVoucher>, StoreError> {
            self.inner.take_voucher(id)
        }
        fn put_reservation(&self, _reservation: MintReservation) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }
        fn delete_reservation(&self, id: &str) -> Result<(), StoreError> {
            self.inner.delete_reservation(id)
        }
        fn list_reservations(&self) -> Result<Vec<MintReservation>, StoreError> {
            self.inner.list_reservations()
        }
    }

    #[tokio::test]
    async fn test_reservation_write_failure_refunds_debit() {
        let store = Arc::new(FlakyReservationStore {
            inner: MemoryStore::new(),
        });
        let mut account =
            Account::new("player@example.com".to_string(), "hash".to_string(), 100);
        account.wallet_address = Some("0xabc".to_string());
        let user = account.id.clone();
        store.insert(account).unwrap();

        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::succeeding("0xhash")));
        let err = coordinator
            .mint_badge(&user, BadgeTier::Bronze)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        // The debit was compensated; nothing minted, nothing reserved
        let account = store.get(&user).unwrap().unwrap();
        assert_eq!(account.token_balance, 100);
        assert!(!account.minted_badges.bronze);
    }

    #[tokio::test]
    async fn test_reconciliation_refunds_stale_reservation() {
        // Simulate a crash between debit and resolution: the debit is
        // applied and the reservation persisted, then nothing else.
        let (store, user) = seeded_store(100, Some("0xabc"));
        store::update(&*store, &user, |account| {
            account.token_balance -= 10;
            Ok::<(), ApiError>(())
        })
        .unwrap();
        store
            .put_reservation(MintReservation::reserve(&user, BadgeTier::Bronze, 10))
            .unwrap();

        let coordinator =
            MintCoordinator::new(store.clone(), Arc::new(MockMinter::failing("unused")));
        let refunded = coordinator.reconcile_reservations().unwrap();
        assert_eq!(refunded, 1);

        let account = store.get(&user).unwrap().unwrap();
        assert_eq!(account.token_balance, 100);
        assert!(!account.minted_badges.bronze);
        assert!(store.list_reservations().unwrap().is_empty());
    }
}
