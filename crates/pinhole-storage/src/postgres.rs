use async_trait::async_trait;
use pinhole_core::error::{Result, StorageError};
use pinhole_core::model::{ClientRecord, DeleteTask, ShortEntry};
use pinhole_core::storage::Storage;
use pinhole_core::tag::Tag;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Per-statement deadlines. Point operations are bounded in seconds,
/// liveness sub-second, and the full-record read path wider because it
/// may touch every row a client owns.
const PING_DEADLINE: Duration = Duration::from_millis(500);
const WRITE_DEADLINE: Duration = Duration::from_secs(5);
const READ_DEADLINE: Duration = Duration::from_secs(5);
const SCAN_DEADLINE: Duration = Duration::from_secs(30);

/// Name of the partial unique index enforcing active-uniqueness of
/// (long, cookie). Must match ddl/postgres/schema.sql.
const ACTIVE_UNIQUE_INDEX: &str = "urls_active_long_cookie";

/// Pool size used when the caller does not configure one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Postgres implementation of the storage contract.
///
/// Unlike the in-memory and file backends this one does not run the
/// merge algorithm: the partial unique index on (long, cookie)
/// `WHERE NOT deleted` enforces the same invariant inside the engine,
/// and a unique violation maps to the same `DuplicateUrl` condition.
/// Concurrency is delegated entirely to transaction isolation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store from an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new connection pool of the default size.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Creates a store by opening a new connection pool of `max_connections`.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the bundled DDL (idempotent).
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(include_str!("../ddl/postgres/schema.sql"))
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_) => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn map_url_insert_error(err: sqlx::Error, entry: &ShortEntry) -> StorageError {
    if is_unique_violation(&err) {
        let constraint = err.as_database_error().and_then(|db| db.constraint());
        if constraint == Some(ACTIVE_UNIQUE_INDEX) {
            return StorageError::DuplicateUrl(entry.long_url.clone());
        }
        // collision on the global `short UNIQUE` constraint; surfaced as
        // a query failure, the caller may retry with a fresh tag
        return StorageError::Query(err.to_string());
    }
    map_sqlx_error(err)
}

/// Runs `fut` under `limit`, mapping expiry to `StorageError::Timeout`.
async fn with_deadline<T, F>(limit: Duration, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, sqlx::Error>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => Err(StorageError::Timeout(format!(
            "{op} exceeded {}ms",
            limit.as_millis()
        ))),
    }
}

#[async_trait]
impl Storage for PgStore {
    async fn write(&self, record: ClientRecord) -> Result<()> {
        let fut = async {
            let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

            sqlx::query(
                r#"
                INSERT INTO ids (cookie, key)
                VALUES ($1, $2)
                ON CONFLICT (cookie) DO NOTHING
                "#,
            )
            .bind(&record.cookie)
            .bind(&record.key)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            for entry in &record.entries {
                sqlx::query(
                    r#"
                    INSERT INTO urls (short, long, cookie, deleted)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(entry.tag.as_str())
                .bind(&entry.long_url)
                .bind(&record.cookie)
                .bind(entry.deleted)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_url_insert_error(e, entry))?;
            }

            // any earlier error drops `tx`, rolling the whole write back
            tx.commit().await.map_err(map_sqlx_error)
        };

        match timeout(WRITE_DEADLINE, fut).await {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "write exceeded {}ms",
                WRITE_DEADLINE.as_millis()
            ))),
        }
    }

    async fn read_by_cookie(&self, cookie: &str) -> Result<Option<ClientRecord>> {
        let id_row = with_deadline(READ_DEADLINE, "read ids", async {
            sqlx::query("SELECT key FROM ids WHERE cookie = $1")
                .bind(cookie)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        let Some(id_row) = id_row else {
            return Ok(None);
        };
        let key: String = id_row.try_get("key").map_err(map_sqlx_error)?;

        let rows = with_deadline(SCAN_DEADLINE, "read urls", async {
            sqlx::query(
                r#"
                SELECT short, long, deleted
                FROM urls
                WHERE cookie = $1
                ORDER BY id
                "#,
            )
            .bind(cookie)
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let short: String = row.try_get("short").map_err(map_sqlx_error)?;
            let long_url: String = row.try_get("long").map_err(map_sqlx_error)?;
            let deleted: bool = row.try_get("deleted").map_err(map_sqlx_error)?;
            entries.push(ShortEntry {
                tag: Tag::new_unchecked(short),
                long_url,
                deleted,
            });
        }

        Ok(Some(ClientRecord {
            cookie: cookie.to_string(),
            key,
            entries,
        }))
    }

    async fn read_by_tag(&self, tag: &Tag) -> Result<Option<ShortEntry>> {
        let row = with_deadline(READ_DEADLINE, "read by tag", async {
            sqlx::query("SELECT long, deleted FROM urls WHERE short = $1")
                .bind(tag.as_str())
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let long_url: String = row.try_get("long").map_err(map_sqlx_error)?;
        let deleted: bool = row.try_get("deleted").map_err(map_sqlx_error)?;

        Ok(Some(ShortEntry {
            tag: tag.clone(),
            long_url,
            deleted,
        }))
    }

    async fn tag_by_url(&self, long_url: &str, cookie: &str) -> Result<Option<Tag>> {
        let row = with_deadline(READ_DEADLINE, "tag by url", async {
            sqlx::query(
                r#"
                SELECT short
                FROM urls
                WHERE long = $1 AND cookie = $2 AND NOT deleted
                LIMIT 1
                "#,
            )
            .bind(long_url)
            .bind(cookie)
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let short: String = row.try_get("short").map_err(map_sqlx_error)?;
        Ok(Some(Tag::new_unchecked(short)))
    }

    async fn ping(&self) -> Result<()> {
        with_deadline(PING_DEADLINE, "ping", async {
            sqlx::query("SELECT 1").execute(&self.pool).await
        })
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn apply_delete(&self, task: &DeleteTask) -> Result<()> {
        let tags: Vec<String> = task.tags.iter().map(|t| t.as_str().to_string()).collect();

        // one batched statement per task instead of a row-by-row scan
        with_deadline(WRITE_DEADLINE, "apply delete", async {
            sqlx::query(
                r#"
                UPDATE urls
                SET deleted = TRUE
                WHERE cookie = $1 AND short = ANY($2)
                "#,
            )
            .bind(&task.cookie)
            .bind(&tags)
            .execute(&self.pool)
            .await
        })
        .await?;
        Ok(())
    }
}
