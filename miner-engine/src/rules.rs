//! Precondition checks for player actions.
//!
//! Pure decision logic, deterministic, no I/O. The economy service loads and
//! locks rows, then asks these functions whether the action may proceed.

use miner_domain::{Card, CardId, CardStand, Fuel, StandId, User, MAX_STANDS, STAND_PRICE};

use crate::error::{EconomyError, EconomyResult};

/// A chest must be available.
pub fn check_open_case(user: &User) -> EconomyResult<()> {
    if user.chests == 0 {
        return Err(EconomyError::InsufficientChests);
    }
    Ok(())
}

/// Slot limit first, then the price.
pub fn check_buy_stand(user: &User, owned_stands: usize) -> EconomyResult<()> {
    if owned_stands >= MAX_STANDS {
        return Err(EconomyError::MaxSlotsReached { max: MAX_STANDS });
    }
    if !user.can_afford_stand() {
        return Err(EconomyError::InsufficientBalance {
            required: STAND_PRICE,
            available: user.balance,
        });
    }
    Ok(())
}

/// Resolve a looked-up card into one the user owns.
pub fn owned_card(user: &User, card_id: CardId, card: Option<Card>) -> EconomyResult<Card> {
    let card = card.ok_or(EconomyError::CardNotFound(card_id))?;
    if !card.is_owned_by(user.id) {
        return Err(EconomyError::CardNotOwned(card_id));
    }
    Ok(card)
}

/// Resolve a looked-up stand into one the user owns.
pub fn owned_stand(
    user: &User,
    stand_id: StandId,
    stand: Option<CardStand>,
) -> EconomyResult<CardStand> {
    let stand = stand.ok_or(EconomyError::StandNotFound(stand_id))?;
    if !stand.is_owned_by(user.id) {
        return Err(EconomyError::StandNotOwned(stand_id));
    }
    Ok(stand)
}

/// The card must be free system-wide and the stand empty.
pub fn check_install(card: &Card, stand: &CardStand, card_mounted: bool) -> EconomyResult<()> {
    if card_mounted {
        return Err(EconomyError::CardAlreadyInstalled(card.id));
    }
    if stand.is_occupied() {
        return Err(EconomyError::StandOccupied(stand.id));
    }
    Ok(())
}

/// Amount a withdrawal would move into the user's coin.
pub fn withdrawable(card: &Card) -> EconomyResult<u64> {
    if !card.has_earnings() {
        return Err(EconomyError::NothingToWithdraw(card.id));
    }
    Ok(card.balance)
}

/// A freeze token must be available before the card is even looked at.
pub fn check_has_freeze(user: &User) -> EconomyResult<()> {
    if user.freeze == 0 {
        return Err(EconomyError::NoFreezeTokens);
    }
    Ok(())
}

/// Fuel level after a refill, or `FuelAlreadyFull`.
pub fn refill_target(card: &Card) -> EconomyResult<Fuel> {
    if card.fuel.is_full() {
        return Err(EconomyError::FuelAlreadyFull(card.id));
    }
    Ok(card.fuel.refilled())
}

/// Credit `amount` to a wallet, saturating at the type's limit.
pub fn credit(wallet: u64, amount: u64) -> u64 {
    wallet.saturating_add(amount)
}
