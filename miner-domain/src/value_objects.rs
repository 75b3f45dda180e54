//! Value Objects for the mining economy
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Fuel must stay within 0..=100
    #[error("Invalid fuel: {0}")]
    InvalidFuel(String),
}

// =============================================================================
// Fuel
// =============================================================================

/// Fuel level of a card.
///
/// # Invariants
/// - Always within `0..=Fuel::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Fuel(u8);

impl Fuel {
    /// Tank capacity
    pub const MAX: u8 = 100;

    /// Amount restored by one freeze token
    pub const REFILL: u8 = 50;

    /// A full tank
    pub const FULL: Fuel = Fuel(Self::MAX);

    /// An empty tank
    pub const EMPTY: Fuel = Fuel(0);

    /// Create a new Fuel with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFuel` if value > 100
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if value > Self::MAX {
            return Err(DomainError::InvalidFuel(format!(
                "Fuel must be at most {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying level
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Check whether the tank is full
    pub fn is_full(&self) -> bool {
        self.0 >= Self::MAX
    }

    /// Level after one freeze token, clamped to the capacity.
    pub fn refilled(self) -> Fuel {
        Fuel(self.0.saturating_add(Self::REFILL).min(Self::MAX))
    }
}

impl TryFrom<u8> for Fuel {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Fuel::new(value)
    }
}

impl From<Fuel> for u8 {
    fn from(fuel: Fuel) -> Self {
        fuel.0
    }
}

impl fmt::Display for Fuel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Rewards
// =============================================================================

/// Outcome class of a case opening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Gems, 1..=10
    Gems,
    /// Main balance, 1_000..=10_000
    Balance,
    /// Empty case
    Nothing,
}

impl RewardKind {
    /// All outcomes, in roll order
    pub const ALL: [RewardKind; 3] = [RewardKind::Gems, RewardKind::Balance, RewardKind::Nothing];

    /// Inclusive amount range for this kind
    pub fn amount_range(&self) -> (u64, u64) {
        match self {
            RewardKind::Gems => (1, 10),
            RewardKind::Balance => (1_000, 10_000),
            RewardKind::Nothing => (0, 0),
        }
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKind::Gems => "gems",
            RewardKind::Balance => "balance",
            RewardKind::Nothing => "nothing",
        }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rolled case reward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Which currency is credited
    pub kind: RewardKind,
    /// How much of it
    pub amount: u64,
}

impl Reward {
    /// Check that the amount lies inside the kind's range
    pub fn is_valid(&self) -> bool {
        let (min, max) = self.kind.amount_range();
        (min..=max).contains(&self.amount)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuel_bounds() {
        assert!(Fuel::new(0).is_ok());
        assert!(Fuel::new(100).is_ok());
        assert!(matches!(Fuel::new(101), Err(DomainError::InvalidFuel(_))));
    }

    #[test]
    fn test_fuel_refill_clamps() {
        assert_eq!(Fuel::new(80).unwrap().refilled(), Fuel::FULL);
        assert_eq!(Fuel::new(20).unwrap().refilled().level(), 70);
        assert_eq!(Fuel::EMPTY.refilled().level(), 50);
        assert_eq!(Fuel::FULL.refilled(), Fuel::FULL);
    }

    #[test]
    fn test_fuel_serde_rejects_overflow() {
        let fuel: Fuel = serde_json::from_str("42").unwrap();
        assert_eq!(fuel.level(), 42);
        assert_eq!(serde_json::to_string(&fuel).unwrap(), "42");
        assert!(serde_json::from_str::<Fuel>("150").is_err());
    }

    #[test]
    fn test_reward_kind_wire_names() {
        for kind in RewardKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
        assert!(serde_json::from_str::<RewardKind>("\"coins\"").is_err());
    }

    #[test]
    fn test_reward_validity() {
        assert!(Reward { kind: RewardKind::Gems, amount: 10 }.is_valid());
        assert!(!Reward { kind: RewardKind::Gems, amount: 11 }.is_valid());
        assert!(!Reward { kind: RewardKind::Balance, amount: 999 }.is_valid());
        assert!(Reward { kind: RewardKind::Nothing, amount: 0 }.is_valid());
    }
}
