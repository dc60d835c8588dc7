//! Economy engine: card purchase, prize draw, stat accrual

use crate::account::store::{self, AccountStore};
use crate::account::types::{CardTier, ScratchVoucher};
use crate::error::ApiError;
use crate::game::catalog::{card_type, CardType};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info};

/// Win probability, identical for every card tier
pub const WIN_PROBABILITY: f64 = 0.40;

#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub new_balance: u64,
    pub voucher: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScratchOutcome {
    pub prize: u64,
    pub new_balance: u64,
}

#[derive(Clone)]
pub struct EconomyEngine {
    store: Arc<dyn AccountStore>,
}

impl EconomyEngine {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Debit the card price and issue a one-time scratch voucher. The
    /// voucher links this purchase to exactly one scratch.
    pub fn buy_card(&self, user_id: &str, tier: CardTier) -> Result<Purchase, ApiError> {
        let card = card_type(tier);
        let updated = store::update(&*self.store, user_id, |account| {
            account.token_balance = account
                .token_balance
                .checked_sub(card.price)
                .ok_or(ApiError::InsufficientBalance {
                    balance: account.token_balance,
                    required: card.price,
                })?;
            Ok::<(), ApiError>(())
        })?;

        let voucher = ScratchVoucher::issue(user_id, tier);
        self.store.put_voucher(voucher.clone())?;
        debug!(user = user_id, card = %tier, balance = updated.token_balance, "card purchased");

        Ok(Purchase {
            new_balance: updated.token_balance,
            voucher: voucher.id,
        })
    }

    /// Consume the voucher, draw the prize, and accrue stats atomically.
    pub fn scratch_card(
        &self,
        user_id: &str,
        tier: CardTier,
        voucher_id: &str,
    ) -> Result<ScratchOutcome, ApiError> {
        let voucher = self
            .store
            .take_voucher(voucher_id)?
            .ok_or(ApiError::VoucherNotFound)?;
        if voucher.user_id != user_id || voucher.card_tier != tier {
            // Not this caller's voucher; put it back before rejecting
            self.store.put_voucher(voucher)?;
            return Err(ApiError::VoucherMismatch);
        }

        let prize = draw_prize(card_type(tier), &mut rand::thread_rng());
        self.settle_scratch(user_id, prize)
    }

    /// Apply a scratch result: bump the counter unconditionally, credit
    /// winnings only when the prize is positive.
    pub(crate) fn settle_scratch(
        &self,
        user_id: &str,
        prize: u64,
    ) -> Result<ScratchOutcome, ApiError> {
        let updated = store::update(&*self.store, user_id, |account| {
            account.cards_scratched += 1;
            if prize > 0 {
                account.token_balance = account
                    .token_balance
                    .checked_add(prize)
                    .ok_or_else(|| ApiError::Internal("balance overflow".to_string()))?;
                account.total_winnings = account
                    .total_winnings
                    .checked_add(prize)
                    .ok_or_else(|| ApiError::Internal("winnings overflow".to_string()))?;
            }
            Ok::<(), ApiError>(())
        })?;

        if prize > 0 {
            info!(user = user_id, prize, balance = updated.token_balance, "scratch won");
        } else {
            debug!(user = user_id, "scratch lost");
        }

        Ok(ScratchOutcome {
            prize,
            new_balance: updated.token_balance,
        })
    }
}

/// Two independent draws: a win roll at `WIN_PROBABILITY`, then a uniform
/// prize in `[prize_min, prize_max]` inclusive. Losses pay zero.
pub fn draw_prize<R: Rng>(card: &CardType, rng: &mut R) -> u64 {
    if rng.gen_bool(WIN_PROBABILITY) {
        rng.gen_range(card.prize_min..=card.prize_max)
    } else {
        0
    }
}
