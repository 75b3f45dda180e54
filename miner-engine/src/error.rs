//! Economy error types.
//!
//! Every expected rejection of a player action has its own variant so the
//! transport can render a specific message. Infrastructure failures are
//! funneled into `Repository`.

use miner_domain::{CardId, StandId};
use miner_store::StoreError;
use thiserror::Error;

/// Why an economy operation did not go through.
#[derive(Debug, Error)]
pub enum EconomyError {
    /// No chest to open
    #[error("Not enough chests")]
    InsufficientChests,

    /// Stand limit reached
    #[error("Stand limit reached: at most {max} stands")]
    MaxSlotsReached { max: usize },

    /// Main balance below the price
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    /// Card id does not exist
    #[error("Card not found: {0}")]
    CardNotFound(CardId),

    /// Stand id does not exist
    #[error("Stand not found: {0}")]
    StandNotFound(StandId),

    /// Card belongs to someone else
    #[error("Card {0} does not belong to user")]
    CardNotOwned(CardId),

    /// Stand belongs to someone else
    #[error("Stand {0} does not belong to user")]
    StandNotOwned(StandId),

    /// Card is already mounted somewhere
    #[error("Card {0} is already installed")]
    CardAlreadyInstalled(CardId),

    /// Target stand already holds a card
    #[error("Stand {0} already has a card")]
    StandOccupied(StandId),

    /// Card is not in any stand
    #[error("Card {0} is not installed")]
    CardNotMounted(CardId),

    /// Card has no pending earnings
    #[error("Card {0} has nothing to withdraw")]
    NothingToWithdraw(CardId),

    /// No freeze token left
    #[error("No freeze tokens left")]
    NoFreezeTokens,

    /// Card tank is already full
    #[error("Card {0} fuel is already full")]
    FuelAlreadyFull(CardId),

    /// Storage failed; the operation left no partial state
    #[error("Repository error: {0}")]
    Repository(#[from] StoreError),
}

impl EconomyError {
    /// Stable machine-readable reason
    pub fn code(&self) -> &'static str {
        match self {
            EconomyError::InsufficientChests => "insufficient_chests",
            EconomyError::MaxSlotsReached { .. } => "max_slots_reached",
            EconomyError::InsufficientBalance { .. } => "insufficient_balance",
            EconomyError::CardNotFound(_) => "card_not_found",
            EconomyError::StandNotFound(_) => "stand_not_found",
            EconomyError::CardNotOwned(_) => "card_not_owned",
            EconomyError::StandNotOwned(_) => "stand_not_owned",
            EconomyError::CardAlreadyInstalled(_) => "card_already_installed",
            EconomyError::StandOccupied(_) => "stand_occupied",
            EconomyError::CardNotMounted(_) => "card_not_mounted",
            EconomyError::NothingToWithdraw(_) => "nothing_to_withdraw",
            EconomyError::NoFreezeTokens => "no_freeze_tokens",
            EconomyError::FuelAlreadyFull(_) => "fuel_already_full",
            EconomyError::Repository(_) => "repository_error",
        }
    }

    /// True for expected outcomes of play, false for infrastructure failures
    pub fn is_rejection(&self) -> bool {
        !matches!(self, EconomyError::Repository(_))
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;
