//! Repository trait definitions (Ports)
//!
//! These traits define the storage interface for the economy.
//! Every read and write goes through a [`StoreTx`] so that a multi-step
//! operation commits as one unit or not at all.

use crate::error::StoreError;
use async_trait::async_trait;
use miner_domain::{Card, CardId, CardStand, Fuel, StandId, StandWithCard, User, UserId};

// =============================================================================
// Typed partial updates
// =============================================================================

/// Partial update of a user's wallets.
///
/// `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub balance: Option<u64>,
    pub gems: Option<u64>,
    pub chests: Option<u32>,
    pub coin: Option<u64>,
    pub freeze: Option<u32>,
}

impl UserUpdate {
    pub fn balance(mut self, value: u64) -> Self {
        self.balance = Some(value);
        self
    }

    pub fn gems(mut self, value: u64) -> Self {
        self.gems = Some(value);
        self
    }

    pub fn chests(mut self, value: u32) -> Self {
        self.chests = Some(value);
        self
    }

    pub fn coin(mut self, value: u64) -> Self {
        self.coin = Some(value);
        self
    }

    pub fn freeze(mut self, value: u32) -> Self {
        self.freeze = Some(value);
        self
    }

    /// True when no column would change
    pub fn is_empty(&self) -> bool {
        self == &UserUpdate::default()
    }

    /// Apply the update to an in-memory user
    pub fn apply_to(&self, user: &mut User) {
        if let Some(balance) = self.balance {
            user.balance = balance;
        }
        if let Some(gems) = self.gems {
            user.gems = gems;
        }
        if let Some(chests) = self.chests {
            user.chests = chests;
        }
        if let Some(coin) = self.coin {
            user.coin = coin;
        }
        if let Some(freeze) = self.freeze {
            user.freeze = freeze;
        }
    }
}

// =============================================================================
// Repositories
// =============================================================================

/// Repository for User rows
#[async_trait]
pub trait UserRepository: Send {
    /// Find the user with this identity, creating a zeroed one if absent
    async fn get_or_create(&mut self, identity: &str) -> Result<User, StoreError>;

    /// Same as `get_or_create`, and hold the row lock until the transaction ends
    async fn lock_or_create(&mut self, identity: &str) -> Result<User, StoreError>;

    /// Write the columns set in `update`
    async fn update(&mut self, user_id: UserId, update: &UserUpdate) -> Result<(), StoreError>;

    /// Decrement freeze only if it is positive. Returns whether it did.
    async fn consume_freeze(&mut self, user_id: UserId) -> Result<bool, StoreError>;
}

/// Repository for Card rows
#[async_trait]
pub trait CardRepository: Send {
    /// Find a card by ID
    async fn find(&mut self, id: CardId) -> Result<Option<Card>, StoreError>;

    /// Find a card by ID and hold its row lock
    async fn lock(&mut self, id: CardId) -> Result<Option<Card>, StoreError>;

    /// All cards owned by a user, ordered by ID
    async fn find_by_user(&mut self, user_id: UserId) -> Result<Vec<Card>, StoreError>;

    /// Set the fuel level
    async fn update_fuel(&mut self, id: CardId, fuel: Fuel) -> Result<(), StoreError>;

    /// Zero the pending balance
    async fn reset_balance(&mut self, id: CardId) -> Result<(), StoreError>;
}

/// Repository for CardStand rows
#[async_trait]
pub trait StandRepository: Send {
    /// Find a stand by ID
    async fn find(&mut self, id: StandId) -> Result<Option<CardStand>, StoreError>;

    /// Find a stand by ID and hold its row lock
    async fn lock(&mut self, id: StandId) -> Result<Option<CardStand>, StoreError>;

    /// All stands of a user joined with their cards, ordered by stand ID
    async fn find_by_user(&mut self, user_id: UserId) -> Result<Vec<StandWithCard>, StoreError>;

    /// Number of stands a user owns
    async fn count_by_user(&mut self, user_id: UserId) -> Result<usize, StoreError>;

    /// The stand currently holding a card, in any user's rig
    async fn find_by_card(&mut self, card_id: CardId) -> Result<Option<CardStand>, StoreError>;

    /// Create an empty stand
    async fn create(&mut self, user_id: UserId) -> Result<CardStand, StoreError>;

    /// Mount (`Some`) or clear (`None`) the stand's card
    async fn set_card(&mut self, id: StandId, card_id: Option<CardId>) -> Result<(), StoreError>;

    /// Whether any stand in the system references the card
    async fn is_card_mounted(&mut self, card_id: CardId) -> Result<bool, StoreError>;
}

// =============================================================================
// Unit of work
// =============================================================================

/// An open transaction.
///
/// Dropping it without `commit` discards every write made through it.
#[async_trait]
pub trait StoreTx: Send {
    /// User repository bound to this transaction
    fn users(&mut self) -> &mut dyn UserRepository;

    /// Card repository bound to this transaction
    fn cards(&mut self) -> &mut dyn CardRepository;

    /// Stand repository bound to this transaction
    fn stands(&mut self) -> &mut dyn StandRepository;

    /// Make all writes durable and release locks
    async fn commit(&mut self) -> Result<(), StoreError>;
}

/// Combined store interface
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}
