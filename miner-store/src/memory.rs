//! In-memory store implementation
//!
//! Used for testing and development without a database.
//! A transaction holds the store mutex for its whole lifetime and works on a
//! staged copy of the state, so transactions are serializable and a dropped
//! transaction leaves nothing behind.

use crate::error::StoreError;
use crate::repository::{
    CardRepository, StandRepository, Store, StoreTx, UserRepository, UserUpdate,
};
use async_trait::async_trait;
use chrono::Utc;
use miner_domain::{Card, CardId, CardStand, Fuel, StandId, StandWithCard, User, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-memory store for testing
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    identities: HashMap<String, UserId>,
    cards: BTreeMap<CardId, Card>,
    stands: BTreeMap<StandId, CardStand>,
    last_user_id: UserId,
    last_card_id: CardId,
    last_stand_id: StandId,
}

impl MemoryState {
    fn get_or_create(&mut self, identity: &str) -> User {
        if let Some(user) = self.identities.get(identity).and_then(|id| self.users.get(id)) {
            return user.clone();
        }

        self.last_user_id += 1;
        let user = User::new(self.last_user_id, identity);
        self.identities.insert(identity.to_string(), user.id);
        self.users.insert(user.id, user.clone());
        user
    }

    fn user_mut(&mut self, user_id: UserId) -> Result<&mut User, StoreError> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("user", user_id))
    }

    fn card_mut(&mut self, card_id: CardId) -> Result<&mut Card, StoreError> {
        self.cards
            .get_mut(&card_id)
            .ok_or_else(|| StoreError::not_found("card", card_id))
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Get the number of users
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Get the number of stands across all users
    pub async fn stand_count(&self) -> usize {
        self.state.lock().await.stands.len()
    }

    /// Issue a card to a user.
    ///
    /// Cards come from outside the economy; this seeds them for tests and
    /// development.
    pub async fn insert_card(&self, user_id: UserId, level: u32, fuel: Fuel, balance: u64) -> Card {
        let mut state = self.state.lock().await;
        state.last_card_id += 1;
        let card = Card::new(state.last_card_id, user_id, level, fuel, balance);
        state.cards.insert(card.id, card.clone());
        card
    }

    /// Overwrite a card's pending balance, as the external miner would.
    pub async fn set_card_balance(&self, card_id: CardId, balance: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let card = state.card_mut(card_id)?;
        card.balance = balance;
        card.updated_at = Utc::now();
        Ok(())
    }

    /// Get-or-create a user and overwrite the given wallet columns
    pub async fn seed_user(&self, identity: &str, update: &UserUpdate) -> User {
        let mut state = self.state.lock().await;
        let mut user = state.get_or_create(identity);
        update.apply_to(&mut user);
        state.users.insert(user.id, user.clone());
        user
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Transaction over a [`MemoryStore`]
pub struct MemoryTx {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    staged: MemoryState,
}

impl MemoryTx {
    fn state(&mut self) -> Result<&mut MemoryState, StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(&mut self.staged)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            staged,
        }))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }

    fn cards(&mut self) -> &mut dyn CardRepository {
        self
    }

    fn stands(&mut self) -> &mut dyn StandRepository {
        self
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}

// =============================================================================
// User Repository Implementation
// =============================================================================

#[async_trait]
impl UserRepository for MemoryTx {
    async fn get_or_create(&mut self, identity: &str) -> Result<User, StoreError> {
        Ok(self.state()?.get_or_create(identity))
    }

    async fn lock_or_create(&mut self, identity: &str) -> Result<User, StoreError> {
        // The transaction already owns the whole store.
        Ok(self.state()?.get_or_create(identity))
    }

    async fn update(&mut self, user_id: UserId, update: &UserUpdate) -> Result<(), StoreError> {
        let user = self.state()?.user_mut(user_id)?;
        update.apply_to(user);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn consume_freeze(&mut self, user_id: UserId) -> Result<bool, StoreError> {
        let user = self.state()?.user_mut(user_id)?;
        if user.freeze == 0 {
            return Ok(false);
        }
        user.freeze -= 1;
        user.updated_at = Utc::now();
        Ok(true)
    }
}

// =============================================================================
// Card Repository Implementation
// =============================================================================

#[async_trait]
impl CardRepository for MemoryTx {
    async fn find(&mut self, id: CardId) -> Result<Option<Card>, StoreError> {
        Ok(self.state()?.cards.get(&id).cloned())
    }

    async fn lock(&mut self, id: CardId) -> Result<Option<Card>, StoreError> {
        CardRepository::find(self, id).await
    }

    async fn find_by_user(&mut self, user_id: UserId) -> Result<Vec<Card>, StoreError> {
        Ok(self
            .state()?
            .cards
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_fuel(&mut self, id: CardId, fuel: Fuel) -> Result<(), StoreError> {
        let card = self.state()?.card_mut(id)?;
        card.fuel = fuel;
        card.updated_at = Utc::now();
        Ok(())
    }

    async fn reset_balance(&mut self, id: CardId) -> Result<(), StoreError> {
        let card = self.state()?.card_mut(id)?;
        card.balance = 0;
        card.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// Stand Repository Implementation
// =============================================================================

#[async_trait]
impl StandRepository for MemoryTx {
    async fn find(&mut self, id: StandId) -> Result<Option<CardStand>, StoreError> {
        Ok(self.state()?.stands.get(&id).cloned())
    }

    async fn lock(&mut self, id: StandId) -> Result<Option<CardStand>, StoreError> {
        StandRepository::find(self, id).await
    }

    async fn find_by_user(&mut self, user_id: UserId) -> Result<Vec<StandWithCard>, StoreError> {
        let state = self.state()?;
        Ok(state
            .stands
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| StandWithCard {
                stand: s.clone(),
                card: s.card_id.and_then(|id| state.cards.get(&id).cloned()),
            })
            .collect())
    }

    async fn count_by_user(&mut self, user_id: UserId) -> Result<usize, StoreError> {
        Ok(self.state()?.stands.values().filter(|s| s.user_id == user_id).count())
    }

    async fn find_by_card(&mut self, card_id: CardId) -> Result<Option<CardStand>, StoreError> {
        Ok(self
            .state()?
            .stands
            .values()
            .find(|s| s.card_id == Some(card_id))
            .cloned())
    }

    async fn create(&mut self, user_id: UserId) -> Result<CardStand, StoreError> {
        let state = self.state()?;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        state.last_stand_id += 1;
        let stand = CardStand::new(state.last_stand_id, user_id);
        state.stands.insert(stand.id, stand.clone());
        Ok(stand)
    }

    async fn set_card(&mut self, id: StandId, card_id: Option<CardId>) -> Result<(), StoreError> {
        let state = self.state()?;

        // Same guarantee as the partial unique index on card_stands(card_id).
        if let Some(card_id) = card_id {
            if state.stands.values().any(|s| s.id != id && s.card_id == Some(card_id)) {
                return Err(StoreError::duplicate("card_stands", card_id));
            }
        }

        let stand = state
            .stands
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("stand", id))?;
        stand.card_id = card_id;
        stand.updated_at = Utc::now();
        Ok(())
    }

    async fn is_card_mounted(&mut self, card_id: CardId) -> Result<bool, StoreError> {
        Ok(self.state()?.stands.values().any(|s| s.card_id == Some(card_id)))
    }
}

// =============================================================================
// Tests
// =============================================================================
