//! Account type definitions shared across the ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier - opaque UUID string
pub type UserId = String;

/// Card tiers sold in the shop
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardTier {
    Basic,
    Silver,
    Gold,
    Platinum,
}

impl CardTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "basic" => Some(Self::Basic),
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            "platinum" => Some(Self::Platinum),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl fmt::Display for CardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge tiers mintable as NFTs
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
}

impl BadgeTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bronze" => Some(Self::Bronze),
            "silver" => Some(Self::Silver),
            "gold" => Some(Self::Gold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
        }
    }
}

impl fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tier minted flags. Each flag transitions false -> true exactly once.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MintedBadges {
    pub bronze: bool,
    pub silver: bool,
    pub gold: bool,
}

impl MintedBadges {
    pub fn has(&self, tier: BadgeTier) -> bool {
        match tier {
            BadgeTier::Bronze => self.bronze,
            BadgeTier::Silver => self.silver,
            BadgeTier::Gold => self.gold,
        }
    }

    pub fn set(&mut self, tier: BadgeTier) {
        match tier {
            BadgeTier::Bronze => self.bronze = true,
            BadgeTier::Silver => self.silver = true,
            BadgeTier::Gold => self.gold = true,
        }
    }
}

/// Main account record
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Account {
    // Identity
    pub id: UserId,
    pub email: String,

    // Authentication (Argon2id PHC string, salt embedded)
    pub password_hash: String,

    // Ledger state
    pub token_balance: u64,
    pub cards_scratched: u64,
    pub total_winnings: u64,
    pub wallet_address: Option<String>,
    pub minted_badges: MintedBadges,

    // Optimistic-concurrency counter, bumped by every committed write
    pub version: u64,
    pub created_at: u64,
}

impl Account {
    pub fn new(email: String, password_hash: String, starting_balance: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            password_hash,
            token_balance: starting_balance,
            cards_scratched: 0,
            total_winnings: 0,
            wallet_address: None,
            minted_badges: MintedBadges::default(),
            version: 0,
            created_at: current_timestamp(),
        }
    }

    /// Wire view of the account. Never includes the password hash.
    pub fn public_view(&self) -> PublicAccount {
        PublicAccount {
            id: self.id.clone(),
            email: self.email.clone(),
            token_balance: self.token_balance,
            cards_scratched: self.cards_scratched,
            total_winnings: self.total_winnings,
            wallet_address: self.wallet_address.clone(),
            minted_badges: self.minted_badges,
        }
    }
}

/// What callers see on the wire
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    pub id: UserId,
    pub email: String,
    pub token_balance: u64,
    pub cards_scratched: u64,
    pub total_winnings: u64,
    pub wallet_address: Option<String>,
    pub minted_badges: MintedBadges,
}

/// One-time scratch voucher issued by buy, consumed by scratch
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScratchVoucher {
    pub id: String,
    pub user_id: UserId,
    pub card_tier: CardTier,
    pub issued_at: u64,
}

impl ScratchVoucher {
    pub fn issue(user_id: &str, card_tier: CardTier) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            card_tier,
            issued_at: current_timestamp(),
        }
    }
}

/// Durable record of tokens debited for an in-flight mint. Written before
/// the external call, deleted on commit or rollback, refunded by startup
/// reconciliation if it survives a crash.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MintReservation {
    pub id: String,
    pub user_id: UserId,
    pub tier: BadgeTier,
    pub amount: u64,
    pub created_at: u64,
}

impl MintReservation {
    pub fn reserve(user_id: &str, tier: BadgeTier, amount: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            tier,
            amount,
            created_at: current_timestamp(),
        }
    }
}

pub fn current_timestamp() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_defaults() {
        let account = Account::new("alice@example.com".to_string(), "hash".to_string(), 100);
        assert_eq!(account.token_balance, 100);
        assert_eq!(account.cards_scratched, 0);
        assert_eq!(account.total_winnings, 0);
        assert!(account.wallet_address.is_none());
        assert_eq!(account.minted_badges, MintedBadges::default());
        assert_eq!(account.version, 0);
    }

    #[test]
    fn test_public_view_has_no_hash() {
        let account = Account::new("a@b.c".to_string(), "secret-hash".to_string(), 100);
        let json = serde_json::to_string(&account.public_view()).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("tokenBalance"));
    }

    #[test]
    fn test_badge_tier_parse() {
        assert_eq!(BadgeTier::parse("bronze"), Some(BadgeTier::Bronze));
        assert_eq!(BadgeTier::parse("GOLD"), Some(BadgeTier::Gold));
        assert_eq!(BadgeTier::parse("platinum"), None);
    }

    #[test]
    fn test_minted_badges_set_once() {
        let mut badges = MintedBadges::default();
        assert!(!badges.has(BadgeTier::Silver));
        badges.set(BadgeTier::Silver);
        assert!(badges.has(BadgeTier::Silver));
        assert!(!badges.has(BadgeTier::Bronze));
    }
}
