//! `PostgreSQL` implementation of the `StorageAdapter` trait.

use std::future::Future;
use std::time::Duration;

use annals_core::error::{StorageError, StoreError};
use annals_core::event::{AggregateKey, EventRecord, PendingEvent};
use annals_core::storage::{
    AggregateIdsPage, AppendOutcome, Direction, EventsQueryOptions, ListAggregateIdsOptions,
    StorageAdapter,
};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::config::{DEFAULT_OPERATION_TIMEOUT_MS, PgConfig};
use crate::schema::{CREATE_EVENT_RECORDS_TABLE, RECORD_COLUMNS};

/// PostgreSQL-backed storage adapter.
///
/// Appends are serialized per aggregate by the unique constraint on
/// `(aggregate_type, aggregate_id, sequence_number)`: of two writers that
/// pass the version check concurrently, the second one to insert fails and
/// is reported as a concurrency conflict.
#[derive(Debug, Clone)]
pub struct PgStorageAdapter {
    pool: PgPool,
    operation_timeout: Duration,
}

impl PgStorageAdapter {
    /// Creates a new `PgStorageAdapter` over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
        }
    }

    /// Sets the deadline applied to every operation.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Opens a connection pool described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` if the database is unreachable.
    pub async fn connect(config: &PgConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.operation_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| StorageError::backend("failed to connect to PostgreSQL", e))?;
        tracing::info!(max_connections = config.max_connections, "connected to PostgreSQL");
        Ok(Self::new(pool).with_operation_timeout(config.operation_timeout))
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the event records table and its index if they are missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` if the DDL fails or times out.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        self.timed("migrate", async {
            sqlx::raw_sql(CREATE_EVENT_RECORDS_TABLE)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::backend("failed to create event store schema", e))?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        work: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        if let Ok(result) = tokio::time::timeout(self.operation_timeout, work).await {
            result
        } else {
            tracing::warn!(
                operation,
                timeout = ?self.operation_timeout,
                "storage operation timed out"
            );
            Err(StorageError::Timeout(self.operation_timeout).into())
        }
    }

    async fn append_in_transaction(
        &self,
        key: &AggregateKey,
        expected_version: i64,
        events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::backend("failed to begin transaction", e))?;

        let current: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence_number), 0) FROM event_records \
             WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(&key.aggregate_type)
        .bind(&key.aggregate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StorageError::backend("failed to read aggregate version", e))?;

        // Dropping `tx` rolls back.
        if current != expected_version {
            return Err(conflict(key, expected_version, Some(current)));
        }

        let mut records = Vec::with_capacity(events.len());
        for (sequence_number, pending) in (expected_version + 1..).zip(events) {
            let record = pending.into_record(key, sequence_number);
            sqlx::query(
                "INSERT INTO event_records \
                 (event_id, aggregate_type, aggregate_id, sequence_number, event_type, payload, metadata, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(record.event_id)
            .bind(&record.aggregate_type)
            .bind(&record.aggregate_id)
            .bind(record.sequence_number)
            .bind(&record.event_type)
            .bind(&record.payload)
            .bind(&record.metadata)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_error(key, expected_version, e))?;
            records.push(record);
        }

        tx.commit()
            .await
            .map_err(|e| insert_error(key, expected_version, e))?;

        let new_version = records
            .last()
            .map_or(expected_version, |r| r.sequence_number);
        Ok(AppendOutcome {
            new_version,
            records,
        })
    }
}

fn conflict(key: &AggregateKey, expected: i64, actual: Option<i64>) -> StoreError {
    StoreError::ConcurrencyConflict {
        aggregate_id: key.aggregate_id.clone(),
        aggregate_type: key.aggregate_type.clone(),
        expected,
        actual,
    }
}

/// Maps a unique violation (SQLSTATE 23505) to a conflict; a concurrent
/// writer took the sequence number between our version read and insert.
fn insert_error(key: &AggregateKey, expected_version: i64, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return conflict(key, expected_version, None);
        }
    }
    StorageError::backend("failed to append events", err).into()
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StorageError::Corrupt(format!("column {name}: {e}")))
}

fn decode_record(row: &PgRow) -> Result<EventRecord, StorageError> {
    let sequence_number: i64 = column(row, "sequence_number")?;
    if sequence_number < 1 {
        return Err(StorageError::Corrupt(format!(
            "sequence number {sequence_number} is not positive"
        )));
    }
    Ok(EventRecord {
        event_id: column(row, "event_id")?,
        aggregate_id: column(row, "aggregate_id")?,
        aggregate_type: column(row, "aggregate_type")?,
        sequence_number,
        event_type: column(row, "event_type")?,
        payload: column(row, "payload")?,
        metadata: column(row, "metadata")?,
        created_at: column(row, "created_at")?,
    })
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl StorageAdapter for PgStorageAdapter {
    #[tracing::instrument(
        skip(self, key, events),
        fields(aggregate = %key, event_count = events.len())
    )]
    async fn append(
        &self,
        key: &AggregateKey,
        expected_version: i64,
        events: Vec<PendingEvent>,
    ) -> Result<AppendOutcome, StoreError> {
        let outcome = self
            .timed(
                "append",
                self.append_in_transaction(key, expected_version, events),
            )
            .await?;
        tracing::debug!(new_version = outcome.new_version, "inserted event records");
        Ok(outcome)
    }

    #[tracing::instrument(skip(self, key), fields(aggregate = %key))]
    async fn query(
        &self,
        key: &AggregateKey,
        options: &EventsQueryOptions,
    ) -> Result<Vec<EventRecord>, StoreError> {
        if options.is_empty_range() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(RECORD_COLUMNS);
        builder.push(" FROM event_records WHERE aggregate_type = ");
        builder.push_bind(key.aggregate_type.clone());
        builder.push(" AND aggregate_id = ");
        builder.push_bind(key.aggregate_id.clone());
        builder.push(" AND sequence_number >= ");
        builder.push_bind(options.lower_bound());
        if let Some(to) = options.to_sequence {
            builder.push(" AND sequence_number <= ");
            builder.push_bind(to);
        }
        builder.push(match options.direction {
            Direction::Forward => " ORDER BY sequence_number ASC",
            Direction::Backward => " ORDER BY sequence_number DESC",
        });
        if let Some(limit) = options.limit {
            builder.push(" LIMIT ");
            builder.push_bind(to_sql_limit(limit));
        }

        let rows = self
            .timed("query", async {
                builder
                    .build()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| {
                        StoreError::from(StorageError::backend("failed to query events", e))
                    })
            })
            .await?;

        let records = rows
            .iter()
            .map(decode_record)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(records = records.len(), "loaded event records");
        Ok(records)
    }

    #[tracing::instrument(skip(self))]
    async fn list_aggregate_ids(
        &self,
        aggregate_type: &str,
        options: &ListAggregateIdsOptions,
    ) -> Result<AggregateIdsPage, StoreError> {
        // One extra row tells us whether another page exists.
        let fetch = options.limit.map(|limit| to_sql_limit(limit).saturating_add(1));
        let mut aggregate_ids: Vec<String> = self
            .timed("list_aggregate_ids", async {
                sqlx::query_scalar::<_, String>(
                    r#"SELECT aggregate_id FROM event_records
                       WHERE aggregate_type = $1
                         AND ($2::VARCHAR IS NULL OR aggregate_id COLLATE "C" > $2)
                       GROUP BY aggregate_id
                       ORDER BY aggregate_id COLLATE "C"
                       LIMIT $3"#,
                )
                .bind(aggregate_type)
                .bind(options.page_token.as_deref())
                .bind(fetch)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    StoreError::from(StorageError::backend("failed to list aggregate ids", e))
                })
            })
            .await?;

        let next_page_token = match options.limit {
            Some(limit) if aggregate_ids.len() > limit => {
                aggregate_ids.truncate(limit);
                aggregate_ids.last().cloned()
            }
            _ => None,
        };
        Ok(AggregateIdsPage {
            aggregate_ids,
            next_page_token,
        })
    }
}
