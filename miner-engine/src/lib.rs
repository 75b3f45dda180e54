//! Mining economy engine
//!
//! One operation per player action, each a single atomic unit against the
//! store. Precondition checks are pure functions in [`rules`]; case rewards
//! come from a [`RewardGenerator`] with injected randomness.

#![warn(clippy::all)]

pub mod economy;
pub mod error;
pub mod reward;
pub mod rules;

pub use economy::{CaseOpening, Economy, Installation, Refill, Withdrawal};
pub use error::{EconomyError, EconomyResult};
pub use reward::{roll_reward, EntropySource, RandomSource, RewardGenerator, SeededSource};
