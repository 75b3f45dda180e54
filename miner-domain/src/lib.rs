//! Mining economy domain layer
//!
//! Pure domain types with zero I/O dependencies.
//! Contains entities, value objects, and economy constants.

#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{
    Card, CardId, CardStand, StandId, StandWithCard, User, UserId, MAX_STANDS, STAND_PRICE,
};
pub use value_objects::{DomainError, Fuel, Reward, RewardKind};
