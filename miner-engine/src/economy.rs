//! Economy service: one operation per player action.
//!
//! Every operation runs in a single store transaction. Rows are locked in a
//! fixed order (user, then card, then stand) before any precondition is
//! checked, so two actions on the same user or card never interleave. A
//! rejected action drops its transaction and leaves no trace.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use miner_domain::{
    Card, CardId, CardStand, Fuel, RewardKind, StandId, StandWithCard, User, STAND_PRICE,
};
use miner_store::{Store, StoreError, UserUpdate};

use crate::error::{EconomyError, EconomyResult};
use crate::reward::RewardGenerator;
use crate::rules;

// =============================================================================
// Payloads
// =============================================================================

/// Result of opening one chest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseOpening {
    pub reward_type: RewardKind,
    pub amount: u64,
    pub chests_left: u32,
}

/// Result of mounting a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    /// The stand, now holding the card
    pub stand: CardStand,
    /// Pending card balance moved into coin
    pub coin_collected: u64,
    /// User coin after collection
    pub coin: u64,
}

/// Result of collecting a card's earnings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawn_amount: u64,
    pub coin: u64,
}

/// Result of spending a freeze token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refill {
    pub new_fuel: Fuel,
    pub freeze_remaining: u32,
}

// =============================================================================
// Economy
// =============================================================================

/// The mining-rig economy.
///
/// Stateless between calls; all durable state lives in the store.
pub struct Economy<S: Store + ?Sized> {
    store: Arc<S>,
    rewards: RewardGenerator,
}

impl<S: Store + ?Sized> Clone for Economy<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            rewards: self.rewards.clone(),
        }
    }
}

/// Log a precondition failure and hand it back.
fn rejected(identity: &str, action: &'static str, err: EconomyError) -> EconomyError {
    debug!(identity, action, code = err.code(), reason = %err, "Action rejected");
    err
}

impl<S: Store + ?Sized> Economy<S> {
    /// Create an economy over `store`, rolling case rewards with `rewards`.
    pub fn new(store: Arc<S>, rewards: RewardGenerator) -> Self {
        Self { store, rewards }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Fetch a user, creating a zeroed one on first reference.
    pub async fn get_or_create_user(&self, identity: &str) -> EconomyResult<User> {
        let mut tx = self.store.begin().await?;
        let user = tx.users().get_or_create(identity).await?;
        tx.commit().await?;
        Ok(user)
    }

    /// Spend one chest and credit a random reward.
    ///
    /// The decrement is written before the roll; both commit together.
    pub async fn open_case(&self, identity: &str) -> EconomyResult<CaseOpening> {
        let mut tx = self.store.begin().await?;
        let user = tx.users().lock_or_create(identity).await?;
        rules::check_open_case(&user).map_err(|e| rejected(identity, "open_case", e))?;

        let chests_left = user.chests - 1;
        tx.users()
            .update(user.id, &UserUpdate::default().chests(chests_left))
            .await?;

        let reward = self.rewards.roll();
        let credit = match reward.kind {
            RewardKind::Gems => {
                Some(UserUpdate::default().gems(rules::credit(user.gems, reward.amount)))
            }
            RewardKind::Balance => {
                Some(UserUpdate::default().balance(rules::credit(user.balance, reward.amount)))
            }
            RewardKind::Nothing => None,
        };
        if let Some(update) = credit {
            tx.users().update(user.id, &update).await?;
        }
        tx.commit().await?;

        info!(
            identity,
            reward = %reward.kind,
            amount = reward.amount,
            chests_left,
            "Case opened"
        );

        Ok(CaseOpening {
            reward_type: reward.kind,
            amount: reward.amount,
            chests_left,
        })
    }

    /// Buy an empty stand for [`STAND_PRICE`].
    pub async fn buy_stand(&self, identity: &str) -> EconomyResult<CardStand> {
        let mut tx = self.store.begin().await?;
        let user = tx.users().lock_or_create(identity).await?;
        let owned = tx.stands().count_by_user(user.id).await?;
        rules::check_buy_stand(&user, owned).map_err(|e| rejected(identity, "buy_stand", e))?;

        let balance = user.balance - STAND_PRICE;
        tx.users()
            .update(user.id, &UserUpdate::default().balance(balance))
            .await?;
        let stand = tx.stands().create(user.id).await?;
        tx.commit().await?;

        info!(identity, stand_id = stand.id, balance, "Stand bought");
        Ok(stand)
    }

    /// Mount a card into an empty stand, collecting its pending balance.
    pub async fn install_card(
        &self,
        identity: &str,
        stand_id: StandId,
        card_id: CardId,
    ) -> EconomyResult<Installation> {
        let reject = |e: EconomyError| rejected(identity, "install_card", e);

        let mut tx = self.store.begin().await?;
        let user = tx.users().lock_or_create(identity).await?;
        let card = tx.cards().lock(card_id).await?;
        let card = rules::owned_card(&user, card_id, card).map_err(reject)?;
        let stand = tx.stands().lock(stand_id).await?;
        let mut stand = rules::owned_stand(&user, stand_id, stand).map_err(reject)?;
        let mounted = tx.stands().is_card_mounted(card.id).await?;
        rules::check_install(&card, &stand, mounted).map_err(reject)?;

        match tx.stands().set_card(stand.id, Some(card.id)).await {
            Ok(()) => {}
            Err(StoreError::Duplicate { .. }) => {
                return Err(reject(EconomyError::CardAlreadyInstalled(card.id)));
            }
            Err(e) => return Err(e.into()),
        }

        let coin_collected = card.balance;
        let coin = rules::credit(user.coin, coin_collected);
        if coin_collected > 0 {
            tx.users()
                .update(user.id, &UserUpdate::default().coin(coin))
                .await?;
            tx.cards().reset_balance(card.id).await?;
        }
        tx.commit().await?;

        stand.card_id = Some(card.id);
        info!(identity, card_id, stand_id, coin_collected, coin, "Card installed");

        Ok(Installation {
            stand,
            coin_collected,
            coin,
        })
    }

    /// Take a card out of its stand. The card keeps its pending balance.
    pub async fn pull_card(&self, identity: &str, card_id: CardId) -> EconomyResult<CardStand> {
        let reject = |e: EconomyError| rejected(identity, "pull_card", e);

        let mut tx = self.store.begin().await?;
        let user = tx.users().lock_or_create(identity).await?;
        let card = tx.cards().lock(card_id).await?;
        let card = rules::owned_card(&user, card_id, card).map_err(reject)?;

        let holder = tx.stands().find_by_card(card.id).await?;
        let holder = holder.ok_or_else(|| reject(EconomyError::CardNotMounted(card_id)))?;
        let mut stand = tx
            .stands()
            .lock(holder.id)
            .await?
            .ok_or_else(|| reject(EconomyError::CardNotMounted(card_id)))?;

        tx.stands().set_card(stand.id, None).await?;
        tx.commit().await?;

        stand.card_id = None;
        info!(identity, card_id, stand_id = stand.id, "Card pulled");
        Ok(stand)
    }

    /// Move a card's pending balance into the user's coin.
    pub async fn withdraw_card_earnings(
        &self,
        identity: &str,
        card_id: CardId,
    ) -> EconomyResult<Withdrawal> {
        let reject = |e: EconomyError| rejected(identity, "withdraw_card_earnings", e);

        let mut tx = self.store.begin().await?;
        let user = tx.users().lock_or_create(identity).await?;
        let card = tx.cards().lock(card_id).await?;
        let card = rules::owned_card(&user, card_id, card).map_err(reject)?;
        let withdrawn_amount = rules::withdrawable(&card).map_err(reject)?;

        let coin = rules::credit(user.coin, withdrawn_amount);
        tx.users()
            .update(user.id, &UserUpdate::default().coin(coin))
            .await?;
        tx.cards().reset_balance(card.id).await?;
        tx.commit().await?;

        info!(identity, card_id, withdrawn_amount, coin, "Card earnings withdrawn");
        Ok(Withdrawal {
            withdrawn_amount,
            coin,
        })
    }

    /// Spend one freeze token to add fuel to a card.
    pub async fn refill_fuel(&self, identity: &str, card_id: CardId) -> EconomyResult<Refill> {
        let reject = |e: EconomyError| rejected(identity, "refill_fuel", e);

        let mut tx = self.store.begin().await?;
        let user = tx.users().lock_or_create(identity).await?;
        rules::check_has_freeze(&user).map_err(reject)?;
        let card = tx.cards().lock(card_id).await?;
        let card = rules::owned_card(&user, card_id, card).map_err(reject)?;
        let new_fuel = rules::refill_target(&card).map_err(reject)?;

        tx.cards().update_fuel(card.id, new_fuel).await?;
        if !tx.users().consume_freeze(user.id).await? {
            return Err(reject(EconomyError::NoFreezeTokens));
        }
        tx.commit().await?;

        let freeze_remaining = user.freeze - 1;
        info!(
            identity,
            card_id,
            fuel = new_fuel.level(),
            freeze_remaining,
            "Fuel refilled"
        );

        Ok(Refill {
            new_fuel,
            freeze_remaining,
        })
    }

    /// The user's stands with their mounted cards, by stand id.
    pub async fn list_stands(&self, identity: &str) -> EconomyResult<Vec<StandWithCard>> {
        let mut tx = self.store.begin().await?;
        let user = tx.users().get_or_create(identity).await?;
        let stands = tx.stands().find_by_user(user.id).await?;
        tx.commit().await?;
        Ok(stands)
    }

    /// The user's cards, by card id.
    pub async fn list_cards(&self, identity: &str) -> EconomyResult<Vec<Card>> {
        let mut tx = self.store.begin().await?;
        let user = tx.users().get_or_create(identity).await?;
        let cards = tx.cards().find_by_user(user.id).await?;
        tx.commit().await?;
        Ok(cards)
    }

    /// Look up any card by id.
    pub async fn get_card(&self, card_id: CardId) -> EconomyResult<Card> {
        let mut tx = self.store.begin().await?;
        let card = tx.cards().find(card_id).await?;
        tx.commit().await?;
        card.ok_or(EconomyError::CardNotFound(card_id))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use miner_domain::MAX_STANDS;
    use miner_store::MemoryStore;

    fn economy() -> (Arc<MemoryStore>, Economy<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let economy = Economy::new(Arc::clone(&store), RewardGenerator::seeded(42));
        (store, economy)
    }

    async fn user(economy: &Economy<MemoryStore>, identity: &str) -> User {
        economy.get_or_create_user(identity).await.unwrap()
    }

    async fn card(store: &MemoryStore, card_id: CardId) -> Card {
        let mut tx = store.begin().await.unwrap();
        tx.cards().find(card_id).await.unwrap().unwrap()
    }

    async fn stand(store: &MemoryStore, stand_id: StandId) -> CardStand {
        let mut tx = store.begin().await.unwrap();
        tx.stands().find(stand_id).await.unwrap().unwrap()
    }

    async fn rich_user_with_stands(
        store: &MemoryStore,
        economy: &Economy<MemoryStore>,
        identity: &str,
        count: usize,
    ) -> Vec<CardStand> {
        store
            .seed_user(identity, &UserUpdate::default().balance(STAND_PRICE * count as u64))
            .await;
        let mut stands = Vec::new();
        for _ in 0..count {
            stands.push(economy.buy_stand(identity).await.unwrap());
        }
        stands
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let (store, economy) = economy();

        let first = user(&economy, "100").await;
        let second = user(&economy, "100").await;

        assert_eq!(first, second);
        assert_eq!(first.balance, 0);
        assert_eq!(first.chests, 0);
        assert_eq!(store.user_count().await, 1);
    }

    // -------------------------------------------------------------------------
    // OpenCase
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_open_case_without_chests_changes_nothing() {
        let (_store, economy) = economy();
        let before = user(&economy, "1").await;

        let result = economy.open_case("1").await;
        assert!(matches!(result, Err(EconomyError::InsufficientChests)));

        assert_eq!(user(&economy, "1").await, before);
    }

    #[tokio::test]
    async fn test_open_case_spends_chest_and_credits_reward() {
        let (store, economy) = economy();
        store.seed_user("1", &UserUpdate::default().chests(30)).await;

        let mut expected_gems = 0;
        let mut expected_balance = 0;
        for left in (0..30).rev() {
            let opening = economy.open_case("1").await.unwrap();
            assert_eq!(opening.chests_left, left);
            match opening.reward_type {
                RewardKind::Gems => {
                    assert!((1..=10).contains(&opening.amount));
                    expected_gems += opening.amount;
                }
                RewardKind::Balance => {
                    assert!((1_000..=10_000).contains(&opening.amount));
                    expected_balance += opening.amount;
                }
                RewardKind::Nothing => assert_eq!(opening.amount, 0),
            }
        }

        let after = user(&economy, "1").await;
        assert_eq!(after.chests, 0);
        assert_eq!(after.gems, expected_gems);
        assert_eq!(after.balance, expected_balance);

        assert!(matches!(economy.open_case("1").await, Err(EconomyError::InsufficientChests)));
        assert_eq!(user(&economy, "1").await.chests, 0);
    }

    #[tokio::test]
    async fn test_open_case_is_replayable_with_a_seed() {
        let (store_a, economy_a) = economy();
        let (store_b, economy_b) = economy();
        store_a.seed_user("1", &UserUpdate::default().chests(5)).await;
        store_b.seed_user("1", &UserUpdate::default().chests(5)).await;

        for _ in 0..5 {
            assert_eq!(
                economy_a.open_case("1").await.unwrap(),
                economy_b.open_case("1").await.unwrap()
            );
        }
    }

    // -------------------------------------------------------------------------
    // BuyStand
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_buy_stand_debits_exact_price() {
        let (store, economy) = economy();
        store
            .seed_user("1", &UserUpdate::default().balance(STAND_PRICE))
            .await;

        let stand = economy.buy_stand("1").await.unwrap();
        assert!(!stand.is_occupied());
        assert_eq!(user(&economy, "1").await.balance, 0);
        assert_eq!(store.stand_count().await, 1);

        let second = economy.buy_stand("1").await;
        assert!(matches!(
            second,
            Err(EconomyError::InsufficientBalance { required: STAND_PRICE, available: 0 })
        ));
        assert_eq!(store.stand_count().await, 1);
    }

    #[tokio::test]
    async fn test_buy_stand_stops_at_max_regardless_of_balance() {
        let (store, economy) = economy();
        rich_user_with_stands(&store, &economy, "1", MAX_STANDS).await;
        store
            .seed_user("1", &UserUpdate::default().balance(STAND_PRICE * 100))
            .await;

        let result = economy.buy_stand("1").await;
        assert!(matches!(result, Err(EconomyError::MaxSlotsReached { max: 9 })));
        assert_eq!(store.stand_count().await, MAX_STANDS);
        assert_eq!(user(&economy, "1").await.balance, STAND_PRICE * 100);
    }

    // -------------------------------------------------------------------------
    // InstallCard / PullCard / Withdraw
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_install_collects_pending_balance() {
        let (store, economy) = economy();
        let stands = rich_user_with_stands(&store, &economy, "1", 1).await;
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 1, Fuel::FULL, 750).await;

        let installation = economy.install_card("1", stands[0].id, gpu.id).await.unwrap();

        assert_eq!(installation.coin_collected, 750);
        assert_eq!(installation.coin, 750);
        assert_eq!(installation.stand.card_id, Some(gpu.id));
        assert_eq!(card(&store, gpu.id).await.balance, 0);
        assert_eq!(user(&economy, "1").await.coin, 750);
        assert_eq!(stand(&store, stands[0].id).await.card_id, Some(gpu.id));
    }

    #[tokio::test]
    async fn test_install_withdraw_pull_sequence() {
        let (store, economy) = economy();
        let stands = rich_user_with_stands(&store, &economy, "1", 1).await;
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 2, Fuel::FULL, 300).await;

        economy.install_card("1", stands[0].id, gpu.id).await.unwrap();
        assert_eq!(card(&store, gpu.id).await.balance, 0);

        let withdraw = economy.withdraw_card_earnings("1", gpu.id).await;
        assert!(matches!(withdraw, Err(EconomyError::NothingToWithdraw(_))));

        let pulled = economy.pull_card("1", gpu.id).await.unwrap();
        assert_eq!(pulled.id, stands[0].id);
        assert_eq!(pulled.card_id, None);
        assert_eq!(stand(&store, stands[0].id).await.card_id, None);

        assert_eq!(card(&store, gpu.id).await.balance, 0);
        assert_eq!(user(&economy, "1").await.coin, 300);
    }

    #[tokio::test]
    async fn test_install_preconditions_in_order() {
        let (store, economy) = economy();
        let stands = rich_user_with_stands(&store, &economy, "1", 2).await;
        let others = rich_user_with_stands(&store, &economy, "2", 1).await;
        let owner = user(&economy, "1").await;
        let other = user(&economy, "2").await;
        let mine = store.insert_card(owner.id, 1, Fuel::FULL, 0).await;
        let second = store.insert_card(owner.id, 1, Fuel::FULL, 0).await;
        let theirs = store.insert_card(other.id, 1, Fuel::FULL, 0).await;

        assert!(matches!(
            economy.install_card("1", stands[0].id, 999).await,
            Err(EconomyError::CardNotFound(999))
        ));
        assert!(matches!(
            economy.install_card("1", stands[0].id, theirs.id).await,
            Err(EconomyError::CardNotOwned(_))
        ));
        assert!(matches!(
            economy.install_card("1", 999, mine.id).await,
            Err(EconomyError::StandNotFound(999))
        ));
        assert!(matches!(
            economy.install_card("1", others[0].id, mine.id).await,
            Err(EconomyError::StandNotOwned(_))
        ));

        economy.install_card("1", stands[0].id, mine.id).await.unwrap();

        assert!(matches!(
            economy.install_card("1", stands[1].id, mine.id).await,
            Err(EconomyError::CardAlreadyInstalled(_))
        ));
        assert!(matches!(
            economy.install_card("1", stands[0].id, second.id).await,
            Err(EconomyError::StandOccupied(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_install_mounts_card_once() {
        let (store, economy) = economy();
        let stands = rich_user_with_stands(&store, &economy, "1", 2).await;
        let owner = user(&economy, "1").await;
        let card_id = store.insert_card(owner.id, 1, Fuel::FULL, 500).await.id;

        let left = {
            let economy = economy.clone();
            let stand_id = stands[0].id;
            tokio::spawn(async move { economy.install_card("1", stand_id, card_id).await })
        };
        let right = {
            let economy = economy.clone();
            let stand_id = stands[1].id;
            tokio::spawn(async move { economy.install_card("1", stand_id, card_id).await })
        };

        let results = [left.await.unwrap(), right.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EconomyError::CardAlreadyInstalled(_)))));

        let mounted = economy
            .list_stands("1")
            .await
            .unwrap()
            .into_iter()
            .filter(|s| s.stand.card_id == Some(card_id))
            .count();
        assert_eq!(mounted, 1);
        assert_eq!(user(&economy, "1").await.coin, 500);
    }

    #[tokio::test]
    async fn test_pull_unmounted_card() {
        let (store, economy) = economy();
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 1, Fuel::FULL, 0).await;

        assert!(matches!(
            economy.pull_card("1", gpu.id).await,
            Err(EconomyError::CardNotMounted(_))
        ));
        assert!(matches!(
            economy.pull_card("2", gpu.id).await,
            Err(EconomyError::CardNotOwned(_))
        ));
    }

    #[tokio::test]
    async fn test_pull_keeps_pending_balance() {
        let (store, economy) = economy();
        let stands = rich_user_with_stands(&store, &economy, "1", 1).await;
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 1, Fuel::new(40).unwrap(), 0).await;
        economy.install_card("1", stands[0].id, gpu.id).await.unwrap();

        // Mined while mounted.
        store.set_card_balance(gpu.id, 1_200).await.unwrap();

        economy.pull_card("1", gpu.id).await.unwrap();
        let pulled = card(&store, gpu.id).await;
        assert_eq!(pulled.balance, 1_200);
        assert_eq!(pulled.fuel.level(), 40);
        assert_eq!(user(&economy, "1").await.coin, 0);

        let withdrawal = economy.withdraw_card_earnings("1", gpu.id).await.unwrap();
        assert_eq!(withdrawal.coin, 1_200);
    }

    #[tokio::test]
    async fn test_withdraw_moves_balance_into_coin() {
        let (store, economy) = economy();
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 3, Fuel::EMPTY, 4_321).await;

        let withdrawal = economy.withdraw_card_earnings("1", gpu.id).await.unwrap();
        assert_eq!(withdrawal, Withdrawal { withdrawn_amount: 4_321, coin: 4_321 });
        assert_eq!(card(&store, gpu.id).await.balance, 0);

        assert!(matches!(
            economy.withdraw_card_earnings("1", gpu.id).await,
            Err(EconomyError::NothingToWithdraw(_))
        ));
        assert!(matches!(
            economy.withdraw_card_earnings("1", 777).await,
            Err(EconomyError::CardNotFound(777))
        ));
    }

    // -------------------------------------------------------------------------
    // RefillFuel
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_refill_clamps_at_max() {
        let (store, economy) = economy();
        let owner = store.seed_user("1", &UserUpdate::default().freeze(2)).await;
        let gpu = store.insert_card(owner.id, 1, Fuel::new(80).unwrap(), 0).await;

        let refill = economy.refill_fuel("1", gpu.id).await.unwrap();
        assert_eq!(refill.new_fuel, Fuel::FULL);
        assert_eq!(refill.freeze_remaining, 1);
        assert_eq!(card(&store, gpu.id).await.fuel, Fuel::FULL);

        let again = economy.refill_fuel("1", gpu.id).await;
        assert!(matches!(again, Err(EconomyError::FuelAlreadyFull(_))));
        assert_eq!(user(&economy, "1").await.freeze, 1);
    }

    #[tokio::test]
    async fn test_refill_requires_freeze_token() {
        let (store, economy) = economy();
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 1, Fuel::new(20).unwrap(), 0).await;

        let result = economy.refill_fuel("1", gpu.id).await;
        assert!(matches!(result, Err(EconomyError::NoFreezeTokens)));
        assert_eq!(card(&store, gpu.id).await.fuel.level(), 20);
        assert_eq!(user(&economy, "1").await.freeze, 0);
    }

    #[tokio::test]
    async fn test_refill_checks_freeze_before_card() {
        let (_store, economy) = economy();
        assert!(matches!(
            economy.refill_fuel("1", 12345).await,
            Err(EconomyError::NoFreezeTokens)
        ));
    }

    #[tokio::test]
    async fn test_refill_adds_fifty() {
        let (store, economy) = economy();
        let owner = store.seed_user("1", &UserUpdate::default().freeze(1)).await;
        let gpu = store.insert_card(owner.id, 1, Fuel::new(10).unwrap(), 0).await;

        let refill = economy.refill_fuel("1", gpu.id).await.unwrap();
        assert_eq!(refill.new_fuel.level(), 60);
        assert_eq!(refill.freeze_remaining, 0);
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_list_stands_and_cards() {
        let (store, economy) = economy();
        assert!(economy.list_stands("1").await.unwrap().is_empty());

        let stands = rich_user_with_stands(&store, &economy, "1", 2).await;
        let owner = user(&economy, "1").await;
        let a = store.insert_card(owner.id, 1, Fuel::FULL, 0).await;
        let b = store.insert_card(owner.id, 2, Fuel::FULL, 0).await;
        economy.install_card("1", stands[1].id, b.id).await.unwrap();

        let listed = economy.list_stands("1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].card.is_none());
        assert_eq!(listed[1].card.as_ref().map(|c| c.id), Some(b.id));

        let cards = economy.list_cards("1").await.unwrap();
        assert_eq!(cards.iter().map(|c| c.id).collect::<Vec<_>>(), vec![a.id, b.id]);
        assert!(economy.list_cards("2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_card() {
        let (store, economy) = economy();
        let owner = user(&economy, "1").await;
        let gpu = store.insert_card(owner.id, 4, Fuel::FULL, 0).await;

        assert_eq!(economy.get_card(gpu.id).await.unwrap().level, 4);
        assert!(matches!(economy.get_card(404).await, Err(EconomyError::CardNotFound(404))));
    }

    #[tokio::test]
    async fn test_payload_serialization() {
        let opening = CaseOpening {
            reward_type: RewardKind::Gems,
            amount: 3,
            chests_left: 1,
        };
        let json = serde_json::to_value(&opening).unwrap();
        assert_eq!(json["reward_type"], "gems");
        assert_eq!(json["chests_left"], 1);

        let refill = Refill {
            new_fuel: Fuel::FULL,
            freeze_remaining: 0,
        };
        assert_eq!(serde_json::to_value(&refill).unwrap()["new_fuel"], 100);
    }
}
