//! PostgreSQL store.
//!
//! Each [`PgTx`] wraps one `sqlx::Transaction`. Row locks are taken with
//! `SELECT ... FOR UPDATE` and held until commit or rollback, and every
//! transaction carries `lock_timeout`/`statement_timeout` bounds so that a
//! stuck peer surfaces as [`StoreError::Timeout`] instead of a hang.
//!
//! This module uses dynamic queries (sqlx::query) instead of compile-time
//! checked macros (sqlx::query!) to allow compilation without DATABASE_URL.

use crate::error::StoreError;
use crate::repository::{
    CardRepository, StandRepository, Store, StoreTx, UserRepository, UserUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miner_domain::{Card, CardId, CardStand, Fuel, StandId, StandWithCard, User, UserId};
use sqlx::postgres::{PgConnection, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::time::Duration;
use tracing::debug;

const USER_COLUMNS: &str =
    "id, chat_id, username, first_name, balance, gems, chests, coin, freeze, created_at, updated_at";

const CARD_COLUMNS: &str = "id, user_id, level, fuel, balance, created_at, updated_at";

const STAND_COLUMNS: &str = "id, user_id, card_id, created_at, updated_at";

// =============================================================================
// Configuration
// =============================================================================

/// Pool and per-transaction bounds.
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long `begin` may wait for a connection
    pub acquire_timeout: Duration,
    /// Connection recycle age
    pub max_lifetime: Duration,
    /// `SET LOCAL lock_timeout` for each transaction
    pub lock_timeout: Duration,
    /// `SET LOCAL statement_timeout` for each transaction
    pub statement_timeout: Duration,
}

impl Default for PgStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: 25,
            acquire_timeout: Duration::from_secs(5),
            max_lifetime: Duration::from_secs(300),
            lock_timeout: Duration::from_secs(3),
            statement_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
    config: PgStoreConfig,
}

impl PgStore {
    /// Connect a new pool.
    pub async fn connect(database_url: &str, config: PgStoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect: {}", e)))?;

        Ok(Self { pool, config })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, config: PgStoreConfig) -> Self {
        Self { pool, config }
    }

    /// Get a reference to the underlying pool (for testing).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; both values are integers we own.
        let bounds = format!(
            "SET LOCAL lock_timeout = {}; SET LOCAL statement_timeout = {}",
            self.config.lock_timeout.as_millis(),
            self.config.statement_timeout.as_millis()
        );
        sqlx::Executor::execute(&mut *tx, sqlx::raw_sql(&bounds)).await?;

        Ok(Box::new(PgTx { tx: Some(tx) }))
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Transaction over a [`PgStore`]. Dropping it rolls back.
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }

    async fn select_user(&mut self, identity: &str, for_update: bool) -> Result<User, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE chat_id = $1{}",
            USER_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );

        if let Some(row) = sqlx::query(&sql).bind(identity).fetch_optional(&mut *conn).await? {
            return parse_user_row(&row);
        }

        // Miss: insert, tolerating a concurrent insert of the same identity.
        sqlx::query("INSERT INTO users (chat_id) VALUES ($1) ON CONFLICT (chat_id) DO NOTHING")
            .bind(identity)
            .execute(&mut *conn)
            .await?;

        let row = sqlx::query(&sql).bind(identity).fetch_one(&mut *conn).await?;
        parse_user_row(&row)
    }

    async fn select_card(&mut self, id: CardId, for_update: bool) -> Result<Option<Card>, StoreError> {
        let sql = format!(
            "SELECT {} FROM cards WHERE id = $1{}",
            CARD_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.conn()?).await?;
        row.as_ref().map(parse_card_row).transpose()
    }

    async fn select_stand(
        &mut self,
        id: StandId,
        for_update: bool,
    ) -> Result<Option<CardStand>, StoreError> {
        let sql = format!(
            "SELECT {} FROM card_stands WHERE id = $1{}",
            STAND_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.conn()?).await?;
        row.as_ref().map(parse_stand_row).transpose()
    }
}

#[async_trait]
impl StoreTx for PgTx {
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
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// User Repository Implementation
// =============================================================================

#[async_trait]
impl UserRepository for PgTx {
    async fn get_or_create(&mut self, identity: &str) -> Result<User, StoreError> {
        self.select_user(identity, false).await
    }

    async fn lock_or_create(&mut self, identity: &str) -> Result<User, StoreError> {
        self.select_user(identity, true).await
    }

    async fn update(&mut self, user_id: UserId, update: &UserUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET updated_at = NOW()");
        if let Some(balance) = update.balance {
            qb.push(", balance = ").push_bind(to_db("balance", balance)?);
        }
        if let Some(gems) = update.gems {
            qb.push(", gems = ").push_bind(to_db("gems", gems)?);
        }
        if let Some(chests) = update.chests {
            qb.push(", chests = ").push_bind(i64::from(chests));
        }
        if let Some(coin) = update.coin {
            qb.push(", coin = ").push_bind(to_db("coin", coin)?);
        }
        if let Some(freeze) = update.freeze {
            qb.push(", freeze = ").push_bind(i64::from(freeze));
        }
        qb.push(" WHERE id = ").push_bind(user_id);

        let result = qb.build().execute(self.conn()?).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user", user_id));
        }

        debug!(user_id, ?update, "User updated");
        Ok(())
    }

    async fn consume_freeze(&mut self, user_id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET freeze = freeze - 1, updated_at = NOW() WHERE id = $1 AND freeze > 0",
        )
        .bind(user_id)
        .execute(self.conn()?)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// =============================================================================
// Card Repository Implementation
// =============================================================================

#[async_trait]
impl CardRepository for PgTx {
    async fn find(&mut self, id: CardId) -> Result<Option<Card>, StoreError> {
        self.select_card(id, false).await
    }

    async fn lock(&mut self, id: CardId) -> Result<Option<Card>, StoreError> {
        self.select_card(id, true).await
    }

    async fn find_by_user(&mut self, user_id: UserId) -> Result<Vec<Card>, StoreError> {
        let sql = format!("SELECT {} FROM cards WHERE user_id = $1 ORDER BY id", CARD_COLUMNS);
        let rows = sqlx::query(&sql).bind(user_id).fetch_all(self.conn()?).await?;
        rows.iter().map(parse_card_row).collect()
    }

    async fn update_fuel(&mut self, id: CardId, fuel: Fuel) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE cards SET fuel = $1, updated_at = NOW() WHERE id = $2")
            .bind(fuel.level() as i16)
            .bind(id)
            .execute(self.conn()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("card", id));
        }
        Ok(())
    }

    async fn reset_balance(&mut self, id: CardId) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE cards SET balance = 0, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(self.conn()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("card", id));
        }
        Ok(())
    }
}

// =============================================================================
// Stand Repository Implementation
// =============================================================================

#[async_trait]
impl StandRepository for PgTx {
    async fn find(&mut self, id: StandId) -> Result<Option<CardStand>, StoreError> {
        self.select_stand(id, false).await
    }

    async fn lock(&mut self, id: StandId) -> Result<Option<CardStand>, StoreError> {
        self.select_stand(id, true).await
    }

    async fn find_by_user(&mut self, user_id: UserId) -> Result<Vec<StandWithCard>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                s.id, s.user_id, s.card_id, s.created_at, s.updated_at,
                c.id AS card_ref_id,
                c.user_id AS card_user_id,
                c.level AS card_level,
                c.fuel AS card_fuel,
                c.balance AS card_balance,
                c.created_at AS card_created_at,
                c.updated_at AS card_updated_at
            FROM card_stands s
            LEFT JOIN cards c ON c.id = s.card_id
            WHERE s.user_id = $1
            ORDER BY s.id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.conn()?)
        .await?;

        let mut stands = Vec::with_capacity(rows.len());
        for row in &rows {
            let stand = parse_stand_row(row)?;
            let card_ref: Option<i64> = row.try_get("card_ref_id")?;
            let card = match card_ref {
                Some(card_id) => Some(card_from_parts(
                    card_id,
                    row.try_get("card_user_id")?,
                    row.try_get("card_level")?,
                    row.try_get("card_fuel")?,
                    row.try_get("card_balance")?,
                    row.try_get("card_created_at")?,
                    row.try_get("card_updated_at")?,
                )?),
                None => None,
            };
            stands.push(StandWithCard { stand, card });
        }

        Ok(stands)
    }

    async fn count_by_user(&mut self, user_id: UserId) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM card_stands WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.conn()?)
            .await?;

        usize::try_from(count)
            .map_err(|_| StoreError::Deserialization(format!("Invalid stand count: {}", count)))
    }

    async fn find_by_card(&mut self, card_id: CardId) -> Result<Option<CardStand>, StoreError> {
        let sql = format!("SELECT {} FROM card_stands WHERE card_id = $1", STAND_COLUMNS);
        let row = sqlx::query(&sql).bind(card_id).fetch_optional(self.conn()?).await?;
        row.as_ref().map(parse_stand_row).transpose()
    }

    async fn create(&mut self, user_id: UserId) -> Result<CardStand, StoreError> {
        let sql = format!(
            "INSERT INTO card_stands (user_id, card_id) VALUES ($1, NULL) RETURNING {}",
            STAND_COLUMNS
        );
        let row = sqlx::query(&sql).bind(user_id).fetch_one(self.conn()?).await?;
        parse_stand_row(&row)
    }

    async fn set_card(&mut self, id: StandId, card_id: Option<CardId>) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE card_stands SET card_id = $1, updated_at = NOW() WHERE id = $2")
                .bind(card_id)
                .bind(id)
                .execute(self.conn()?)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("stand", id));
        }
        Ok(())
    }

    async fn is_card_mounted(&mut self, card_id: CardId) -> Result<bool, StoreError> {
        let mounted: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM card_stands WHERE card_id = $1)")
                .bind(card_id)
                .fetch_one(self.conn()?)
                .await?;
        Ok(mounted)
    }
}

// =============================================================================
// Row parsing
// =============================================================================

fn to_db(column: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Database(format!("{} out of range: {}", column, value)))
}

fn from_db<T: TryFrom<i64>>(column: &str, value: i64) -> Result<T, StoreError> {
    T::try_from(value)
        .map_err(|_| StoreError::Deserialization(format!("Invalid {}: {}", column, value)))
}

fn parse_user_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        identity: row.try_get("chat_id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        balance: from_db("balance", row.try_get("balance")?)?,
        gems: from_db("gems", row.try_get("gems")?)?,
        chests: from_db("chests", row.try_get("chests")?)?,
        coin: from_db("coin", row.try_get("coin")?)?,
        freeze: from_db("freeze", row.try_get("freeze")?)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_card_row(row: &PgRow) -> Result<Card, StoreError> {
    card_from_parts(
        row.try_get("id")?,
        row.try_get("user_id")?,
        row.try_get("level")?,
        row.try_get("fuel")?,
        row.try_get("balance")?,
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    )
}

fn card_from_parts(
    id: i64,
    user_id: i64,
    level: i32,
    fuel: i16,
    balance: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Result<Card, StoreError> {
    let fuel = u8::try_from(fuel)
        .map_err(|_| StoreError::Deserialization(format!("Invalid fuel: {}", fuel)))?;

    Ok(Card {
        id,
        user_id,
        level: from_db("level", level as i64)?,
        fuel: Fuel::new(fuel)?,
        balance: from_db("card balance", balance)?,
        created_at,
        updated_at,
    })
}

fn parse_stand_row(row: &PgRow) -> Result<CardStand, StoreError> {
    Ok(CardStand {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        card_id: row.try_get("card_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
