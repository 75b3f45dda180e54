//! Domain Entities for the mining economy
//!
//! Users own cards (GPUs) and stands (slots). A stand holds at most one
//! card, and a card sits in at most one stand across the whole system.

use crate::value_objects::Fuel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Store-assigned identifier for a User
pub type UserId = i64;

/// Store-assigned identifier for a Card
pub type CardId = i64;

/// Store-assigned identifier for a CardStand
pub type StandId = i64;

// =============================================================================
// Economy constants
// =============================================================================

/// Price of one stand, debited from the main balance
pub const STAND_PRICE: u64 = 2_500_000;

/// Maximum number of stands a user may own
pub const MAX_STANDS: usize = 9;

// =============================================================================
// User
// =============================================================================

/// A player and their wallets.
///
/// Created lazily on first reference with every counter at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// External chat/account id (unique)
    pub identity: String,
    pub username: Option<String>,
    pub first_name: Option<String>,

    // Wallets
    pub balance: u64,
    pub gems: u64,
    pub chests: u32,
    pub coin: u64,
    pub freeze: u32,

    // Audit
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a fresh user with zeroed counters
    pub fn new(id: UserId, identity: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            identity: identity.into(),
            username: None,
            first_name: None,
            balance: 0,
            gems: 0,
            chests: 0,
            coin: 0,
            freeze: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user can afford a stand
    pub fn can_afford_stand(&self) -> bool {
        self.balance >= STAND_PRICE
    }
}

// =============================================================================
// Card
// =============================================================================

/// A mineable card ("GPU").
///
/// Owner is fixed at creation; cards are issued outside this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub level: u32,
    pub fuel: Fuel,
    /// Mined currency waiting to be collected into the owner's coin
    pub balance: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Create a card owned by `user_id`
    pub fn new(id: CardId, user_id: UserId, level: u32, fuel: Fuel, balance: u64) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            level,
            fuel,
            balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check ownership
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Check if there is anything to collect
    pub fn has_earnings(&self) -> bool {
        self.balance > 0
    }
}

// =============================================================================
// CardStand
// =============================================================================

/// A slot that may hold one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStand {
    pub id: StandId,
    pub user_id: UserId,
    pub card_id: Option<CardId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardStand {
    /// Create an empty stand owned by `user_id`
    pub fn new(id: StandId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            card_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check ownership
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Check whether a card is mounted
    pub fn is_occupied(&self) -> bool {
        self.card_id.is_some()
    }
}

/// A stand joined with the card it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandWithCard {
    #[serde(flatten)]
    pub stand: CardStand,
    pub card: Option<Card>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_zeroed() {
        let user = User::new(1, "42");
        assert_eq!(user.identity, "42");
        assert_eq!(user.balance, 0);
        assert_eq!(user.gems, 0);
        assert_eq!(user.chests, 0);
        assert_eq!(user.coin, 0);
        assert_eq!(user.freeze, 0);
        assert!(!user.can_afford_stand());
    }

    #[test]
    fn test_stand_price_boundary() {
        let mut user = User::new(1, "42");
        user.balance = STAND_PRICE - 1;
        assert!(!user.can_afford_stand());
        user.balance = STAND_PRICE;
        assert!(user.can_afford_stand());
    }

    #[test]
    fn test_ownership_and_occupancy() {
        let card = Card::new(7, 1, 1, Fuel::FULL, 0);
        assert!(card.is_owned_by(1));
        assert!(!card.is_owned_by(2));
        assert!(!card.has_earnings());

        let mut stand = CardStand::new(3, 1);
        assert!(!stand.is_occupied());
        stand.card_id = Some(card.id);
        assert!(stand.is_occupied());
    }

    #[test]
    fn test_stand_with_card_serializes_flat() {
        let stand = CardStand::new(3, 1);
        let joined = StandWithCard { stand, card: None };
        let json = serde_json::to_value(&joined).unwrap();
        assert_eq!(json["id"], 3);
        assert!(json["card"].is_null());
    }
}
