//! Mining economy storage layer
//!
//! Provides persistence for users, cards, and card stands.
//!
//! # Architecture
//!
//! - **Repository traits**: Define the storage interface (ports)
//! - **Transactions**: Every access goes through a `StoreTx` unit of work
//! - **In-memory store**: Fast implementation for testing
//! - **PostgreSQL store**: Production implementation (feature `postgres`)
//!
//! # Usage
//!
//! ```rust
//! use miner_store::{MemoryStore, Store, UserUpdate};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     let mut tx = store.begin().await.unwrap();
//!     let user = tx.users().get_or_create("100500").await.unwrap();
//!     tx.users().update(user.id, &UserUpdate::default().chests(3)).await.unwrap();
//!     tx.commit().await.unwrap();
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod memory;
#[cfg(feature = "postgres")]
mod postgres;
mod repository;

// Re-exports
pub use error::StoreError;
pub use memory::{MemoryStore, MemoryTx};
#[cfg(feature = "postgres")]
pub use postgres::{PgStore, PgStoreConfig, PgTx};
pub use repository::{
    CardRepository, StandRepository, Store, StoreTx, UserRepository, UserUpdate,
};
