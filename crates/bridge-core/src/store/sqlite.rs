//! # SQLite-backed store
//!
//! Persists identities and pending voicemails with sqlx. The schema is created
//! on connect, so a fresh database file is usable immediately.
//!
//! ## Tables
//!
//! - `identities`: one row per phone number. `available` keeps the platform's
//!   original meaning (true = voicemail must be bridged).
//! - `pending_voicemails`: append-only queue; `delivered` flips to 1 once the
//!   voicemail reaches the recipient. Rows are never deleted.
//!
//! ## Scanning
//!
//! [`PendingVoicemailStore::query_undelivered`] pages through undelivered rows
//! by ascending id. No connection is held between pages, so the flusher can
//! mark rows delivered while the scan is still running.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::identity::IdentityStore;
use crate::pending::PendingVoicemailStore;
use crate::types::{AccountId, Identity, NewPendingVoicemail, PendingId, PendingVoicemail};

/// Rows fetched per page by the undelivered scan
const SCAN_PAGE_SIZE: i64 = 100;

const CREATE_IDENTITIES: &str = "
    CREATE TABLE IF NOT EXISTS identities (
        phone TEXT PRIMARY KEY NOT NULL,
        account_id INTEGER,
        available BOOLEAN NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT ''
    )";

const CREATE_PENDING: &str = "
    CREATE TABLE IF NOT EXISTS pending_voicemails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_number TEXT NOT NULL,
        to_number TEXT NOT NULL,
        audio_url TEXT NOT NULL,
        delivered BOOLEAN NOT NULL DEFAULT 0
    )";

const CREATE_PENDING_INDEX: &str = "
    CREATE INDEX IF NOT EXISTS idx_pending_voicemails_delivered
        ON pending_voicemails (delivered, id)";

#[derive(sqlx::FromRow, Debug)]
struct IdentityRow {
    account_id: Option<i64>,
    available: bool,
    status: String,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Self {
            account: row.account_id.map(AccountId),
            needs_voicemail_bridge: row.available,
            status: row.status,
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
struct PendingRow {
    id: i64,
    from_number: String,
    to_number: String,
    audio_url: String,
    delivered: bool,
}

impl PendingRow {
    fn into_entry(self) -> (PendingId, PendingVoicemail) {
        (
            self.id,
            PendingVoicemail {
                from: self.from_number,
                to: self.to_number,
                audio_url: self.audio_url,
                delivered: self.delivered,
            },
        )
    }
}

/// SQLite store for identities and pending voicemails
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Opening voicemail database at {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    /// Create in-memory database for testing
    pub async fn new_in_memory() -> Result<Self> {
        // A single connection that never expires keeps the in-memory
        // database alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("Creating voicemail bridge schema");
        sqlx::query(CREATE_IDENTITIES).execute(&self.pool).await?;
        sqlx::query(CREATE_PENDING).execute(&self.pool).await?;
        sqlx::query(CREATE_PENDING_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    /// Create or replace the identity for a phone number
    pub async fn upsert_identity(&self, phone: &str, identity: &Identity) -> Result<()> {
        sqlx::query(
            "INSERT INTO identities (phone, account_id, available, status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(phone) DO UPDATE SET
                 account_id = excluded.account_id,
                 available = excluded.available,
                 status = excluded.status",
        )
        .bind(phone)
        .bind(identity.account.map(|a| a.0))
        .bind(identity.needs_voicemail_bridge)
        .bind(&identity.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get a pending voicemail regardless of its delivery state
    pub async fn get_pending(&self, id: PendingId) -> Result<Option<PendingVoicemail>> {
        let row = sqlx::query_as::<_, PendingRow>(
            "SELECT id, from_number, to_number, audio_url, delivered
             FROM pending_voicemails WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.into_entry().1))
    }

    /// Number of stored pending voicemails, delivered or not
    pub async fn count_pending(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_voicemails")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// One page of the undelivered scan plus the cursor for the next one.
    async fn next_page(
        pool: &SqlitePool,
        cursor: Option<PendingId>,
    ) -> Result<Option<(Vec<PendingRow>, Option<PendingId>)>> {
        let Some(after) = cursor else {
            return Ok(None);
        };
        let rows = Self::fetch_undelivered_page(pool, after).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let next = if (rows.len() as i64) < SCAN_PAGE_SIZE {
            None
        } else {
            rows.last().map(|row| row.id)
        };
        Ok(Some((rows, next)))
    }

    async fn fetch_undelivered_page(pool: &SqlitePool, after: PendingId) -> Result<Vec<PendingRow>> {
        let rows = sqlx::query_as::<_, PendingRow>(
            "SELECT id, from_number, to_number, audio_url, delivered
             FROM pending_voicemails
             WHERE delivered = 0 AND id > ?1
             ORDER BY id ASC
             LIMIT ?2",
        )
        .bind(after)
        .bind(SCAN_PAGE_SIZE)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn find_identity(&self, phone: &str) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT account_id, available, status FROM identities WHERE phone = ?1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }
}

#[async_trait]
impl PendingVoicemailStore for SqliteStore {
    async fn enqueue(&self, voicemail: NewPendingVoicemail) -> Result<PendingId> {
        let result = sqlx::query(
            "INSERT INTO pending_voicemails (from_number, to_number, audio_url, delivered)
             VALUES (?1, ?2, ?3, 0)",
        )
        .bind(&voicemail.from)
        .bind(&voicemail.to)
        .bind(&voicemail.audio_url)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(id, to = %voicemail.to, "Stored pending voicemail");
        Ok(id)
    }

    async fn mark_delivered(&self, id: PendingId) -> Result<()> {
        let result = sqlx::query("UPDATE pending_voicemails SET delivered = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        // SQLite counts matched rows, so a repeat call still reports one row.
        if result.rows_affected() == 0 {
            return Err(BridgeError::storage(format!("pending voicemail {} not found", id)));
        }
        Ok(())
    }

    fn query_undelivered(&self) -> BoxStream<'_, Result<(PendingId, PendingVoicemail)>> {
        let pool = self.pool.clone();
        stream::try_unfold(Some(0), move |cursor: Option<PendingId>| {
            let pool = pool.clone();
            async move { Self::next_page(&pool, cursor).await }
        })
        .map_ok(|rows| stream::iter(rows.into_iter().map(|row| Ok::<_, BridgeError>(row.into_entry()))))
        .try_flatten()
        .boxed()
    }
}
