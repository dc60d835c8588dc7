//! Static card and badge catalogs

use crate::account::types::{BadgeTier, CardTier};
use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardType {
    pub tier: CardTier,
    pub price: u64,
    pub prize_min: u64,
    pub prize_max: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeConfig {
    pub tier: BadgeTier,
    pub token_cost: u64,
}

lazy_static! {
    static ref CARD_CATALOG: HashMap<CardTier, CardType> = {
        let mut m = HashMap::new();
        for card in [
            CardType { tier: CardTier::Basic, price: 10, prize_min: 0, prize_max: 30 },
            CardType { tier: CardTier::Silver, price: 25, prize_min: 5, prize_max: 75 },
            CardType { tier: CardTier::Gold, price: 50, prize_min: 10, prize_max: 150 },
            CardType { tier: CardTier::Platinum, price: 100, prize_min: 20, prize_max: 300 },
        ] {
            m.insert(card.tier, card);
        }
        m
    };
    static ref BADGE_CATALOG: HashMap<BadgeTier, BadgeConfig> = {
        let mut m = HashMap::new();
        for badge in [
            BadgeConfig { tier: BadgeTier::Bronze, token_cost: 10 },
            BadgeConfig { tier: BadgeTier::Silver, token_cost: 50 },
            BadgeConfig { tier: BadgeTier::Gold, token_cost: 100 },
        ] {
            m.insert(badge.tier, badge);
        }
        m
    };
}

pub fn card_type(tier: CardTier) -> &'static CardType {
    CARD_CATALOG.get(&tier).expect("catalog covers every tier")
}

pub fn badge_config(tier: BadgeTier) -> &'static BadgeConfig {
    BADGE_CATALOG.get(&tier).expect("catalog covers every tier")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_prices() {
        assert_eq!(card_type(CardTier::Basic).price, 10);
        assert_eq!(card_type(CardTier::Silver).price, 25);
        assert_eq!(card_type(CardTier::Gold).price, 50);
        assert_eq!(card_type(CardTier::Platinum).price, 100);
    }

    #[test]
    fn test_prize_ranges() {
        let gold = card_type(CardTier::Gold);
        assert_eq!((gold.prize_min, gold.prize_max), (10, 150));
        let platinum = card_type(CardTier::Platinum);
        assert_eq!((platinum.prize_min, platinum.prize_max), (20, 300));
    }

    #[test]
    fn test_badge_costs() {
        assert_eq!(badge_config(BadgeTier::Bronze).token_cost, 10);
        assert_eq!(badge_config(BadgeTier::Silver).token_cost, 50);
        assert_eq!(badge_config(BadgeTier::Gold).token_cost, 100);
    }
}
