//! A `sqlx` implementation of the [`Adapter`] contract.
//!
//! All streams share one `event_streams` table. Metadata is stored as JSONB
//! and filtered with the `@>` containment operator, so a metadata filter is a
//! superset match exactly as the contract requires. Compile it with the
//! `postgres-storage` cargo feature.
#![allow(clippy::missing_errors_doc)]

use std::marker::PhantomData;

use crate::{
    Error, Event, Metadata, Result, StoredEvent, StreamName,
    adapter::{Adapter, AppendCondition, ExpectedVersion},
};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

/// Maps `sqlx::Error` into this crate's `Error`.
fn to_store_error(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

/// Maps `serde_json::Error` into this crate's `Error`.
fn to_serde_error(e: serde_json::Error) -> Error {
    Error::Store(e.to_string())
}

type EventRow = (i64, String, i16, serde_json::Value, serde_json::Value);

/// A `sqlx`-backed adapter for PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresAdapter<E: Event> {
    pool: PgPool,
    _phantom: PhantomData<E>,
}

impl<E: Event> PostgresAdapter<E> {
    /// Creates a new `PostgresAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _phantom: PhantomData,
        }
    }

    /// Ensures the `event_streams` table and its indexes exist.
    #[instrument(skip(self))]
    pub async fn setup(&self) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                CREATE TABLE IF NOT EXISTS event_streams (
                    no BIGSERIAL PRIMARY KEY,
                    stream_name TEXT NOT NULL,
                    version BIGINT NOT NULL,
                    event_type TEXT NOT NULL,
                    event_version SMALLINT NOT NULL,
                    metadata JSONB NOT NULL,
                    payload JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS event_streams_stream_version_idx ON event_streams (stream_name, version)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS event_streams_metadata_idx ON event_streams USING GIN (metadata jsonb_path_ops)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Opens a transaction holding the stream's advisory lock, serializing
    /// writers of the same stream until commit.
    async fn lock_stream(&self, stream: &StreamName) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(to_store_error)?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(stream.as_str())
            .execute(&mut *tx)
            .await
            .map_err(to_store_error)?;
        Ok(tx)
    }

    async fn insert(
        tx: &mut Transaction<'static, Postgres>,
        stream: &StreamName,
        events: &[StoredEvent<E>],
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let versions: Vec<i64> = events.iter().map(StoredEvent::version).collect();
        let event_types: Vec<String> = events.iter().map(|e| e.event_type().to_owned()).collect();
        let event_versions: Vec<i16> = events.iter().map(|e| e.event_version() as i16).collect();
        let metadata: Vec<serde_json::Value> = events
            .iter()
            .map(|e| serde_json::to_value(e.metadata()).map_err(to_serde_error))
            .collect::<Result<_>>()?;
        let payloads: Vec<serde_json::Value> = events
            .iter()
            .map(|e| serde_json::to_value(e.payload()).map_err(to_serde_error))
            .collect::<Result<_>>()?;

        // Bulk insert; WITH ORDINALITY keeps the batch order in `no`.
        sqlx::query(
            r#"
            INSERT INTO event_streams (stream_name, version, event_type, event_version, metadata, payload)
            SELECT $1, v, t, ev, m, p
            FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::SMALLINT[], $5::JSONB[], $6::JSONB[])
                WITH ORDINALITY AS x(v, t, ev, m, p, ord)
            ORDER BY ord
            "#,
        )
        .bind(stream.as_str())
        .bind(&versions)
        .bind(&event_types)
        .bind(&event_versions)
        .bind(&metadata)
        .bind(&payloads)
        .execute(&mut **tx)
        .await
        .map_err(to_store_error)?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl<E: Event> Adapter<E> for PostgresAdapter<E> {
    #[instrument(skip(self, events), fields(stream = %stream, count = events.len()))]
    async fn create(&self, stream: &StreamName, events: Vec<StoredEvent<E>>) -> Result<()> {
        let mut tx = self.lock_stream(stream).await?;

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM event_streams WHERE stream_name = $1)")
                .bind(stream.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(to_store_error)?;
        if exists {
            return Err(Error::StreamAlreadyExists(stream.to_string()));
        }

        Self::insert(&mut tx, stream, &events).await?;
        tx.commit().await.map_err(to_store_error)
    }

    #[instrument(skip(self, events, condition), fields(stream = %stream, count = events.len()))]
    async fn append(
        &self,
        stream: &StreamName,
        events: Vec<StoredEvent<E>>,
        condition: &AppendCondition,
    ) -> Result<()> {
        let mut tx = self.lock_stream(stream).await?;

        // Optimistic concurrency check.
        if let ExpectedVersion::Exact(_) = condition.expected_version {
            let filter = serde_json::to_value(&condition.filter).map_err(to_serde_error)?;
            let current_version: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(version) FROM event_streams WHERE stream_name = $1 AND metadata @> $2",
            )
            .bind(stream.as_str())
            .bind(filter)
            .fetch_one(&mut *tx)
            .await
            .map_err(to_store_error)?;
            condition
                .expected_version
                .check(current_version.unwrap_or(0))?;
        }

        Self::insert(&mut tx, stream, &events).await?;
        tx.commit().await.map_err(to_store_error)
    }

    #[instrument(skip(self, filter), fields(stream = %stream))]
    async fn read_by_metadata(
        &self,
        stream: &StreamName,
        filter: &Metadata,
        min_version: Option<i64>,
    ) -> Result<Vec<StoredEvent<E>>> {
        let filter = serde_json::to_value(filter).map_err(to_serde_error)?;
        let rows: Vec<EventRow> = sqlx::query_as(
            r#"
            SELECT version, event_type, event_version, metadata, payload
            FROM event_streams
            WHERE stream_name = $1 AND metadata @> $2 AND ($3::BIGINT IS NULL OR version >= $3)
            ORDER BY version, no
            "#,
        )
        .bind(stream.as_str())
        .bind(filter)
        .bind(min_version)
        .fetch_all(&self.pool)
        .await
        .map_err(to_store_error)?;

        rows.into_iter()
            .map(|(version, event_type, event_version, metadata, payload)| {
                let metadata: Metadata = serde_json::from_value(metadata).map_err(to_serde_error)?;
                let payload: E = serde_json::from_value(payload).map_err(to_serde_error)?;
                Ok(StoredEvent::new(
                    version,
                    event_type,
                    event_version as u16,
                    metadata,
                    payload,
                ))
            })
            .collect()
    }
}
