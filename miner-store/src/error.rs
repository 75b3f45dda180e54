//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found
    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity (user, card, stand)
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Unique constraint violated
    #[error("Duplicate entity: {entity_type} with id {id}")]
    Duplicate {
        /// Type of entity
        entity_type: String,
        /// Entity ID
        id: String,
    },

    /// Transaction already committed or rolled back
    #[error("Transaction closed")]
    TransactionClosed,

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Lock wait, statement or pool acquire exceeded its bound
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Stored row does not fit the domain types
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] miner_domain::DomainError),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Create a duplicate error
    pub fn duplicate(entity_type: impl Into<String>, id: impl ToString) -> Self {
        Self::Duplicate {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Whether a retry by the caller may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Connection(_))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity_type: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation
                Some("23505") => StoreError::Duplicate {
                    entity_type: db_err.table().unwrap_or("unknown").to_string(),
                    id: db_err.constraint().unwrap_or("unknown").to_string(),
                },
                // lock_not_available, query_canceled (statement_timeout)
                Some("55P03") | Some("57014") => StoreError::Timeout(db_err.to_string()),
                _ => StoreError::Database(db_err.to_string()),
            },
            sqlx::Error::PoolTimedOut => StoreError::Timeout("connection pool acquire".to_string()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                StoreError::Connection(err.to_string())
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::not_found("card", 7);
        assert_eq!(err.to_string(), "Entity not found: card with id 7");
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout("lock".into()).is_transient());
        assert!(StoreError::Connection("reset".into()).is_transient());
        assert!(!StoreError::duplicate("card_stands", 1).is_transient());
        assert!(!StoreError::Database("syntax".into()).is_transient());
    }
}
