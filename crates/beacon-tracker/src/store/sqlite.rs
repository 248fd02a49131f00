// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use beacon_config::{QueueOverflowPolicy, StoreConfig};
use beacon_core::{Event, EventId, EventKind, NewEvent, SelfDescribingJson};
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Batch, BatchId, EnqueueReceipt, EventStore, Settlement, StoreCounts};
use crate::error::{Result, TrackerError};

const CREATE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    contexts TEXT NOT NULL,
    created_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    not_before_ms INTEGER,
    batch_id TEXT
)
"#;

const CREATE_BATCH_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_events_batch_id ON events(batch_id)";

type EventRow = (
	i64,
	String,
	String,
	String,
	String,
	DateTime<Utc>,
	i64,
	Option<i64>,
);

/// Durable event store backed by a SQLite database in WAL mode.
///
/// Events left in flight by a previous process are returned to pending when
/// the store is opened.
pub struct SqliteEventStore {
	pool: SqlitePool,
	capacity: usize,
	policy: QueueOverflowPolicy,
	/// Serialises every operation; `true` once the store is closed.
	closed: Mutex<bool>,
	space_freed: Notify,
}

impl SqliteEventStore {
	/// Opens (creating if missing) the database at `path`.
	#[tracing::instrument(skip(config), fields(path = %path.as_ref().display()))]
	pub async fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
		let options = SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true);
		Self::connect(options, config).await
	}

	/// Opens an in-memory database. Nothing survives the store being dropped.
	pub async fn in_memory(config: &StoreConfig) -> Result<Self> {
		Self::connect(SqliteConnectOptions::from_str("sqlite::memory:")?, config).await
	}

	async fn connect(options: SqliteConnectOptions, config: &StoreConfig) -> Result<Self> {
		let options = options
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal);

		// An in-memory database is private to its connection.
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(options)
			.await?;
		sqlx::query(CREATE_EVENTS).execute(&pool).await?;
		sqlx::query(CREATE_BATCH_INDEX).execute(&pool).await?;
		debug!("event store schema ready");

		let store = Self {
			pool,
			capacity: config.capacity,
			policy: config.overflow_policy,
			closed: Mutex::new(false),
			space_freed: Notify::new(),
		};

		let recovered = store.recover().await?;
		if recovered > 0 {
			info!(count = recovered, "recovered in-flight events from previous run");
		}
		Ok(store)
	}

	async fn count_ready(tx: &mut Transaction<'_, Sqlite>, now: DateTime<Utc>) -> Result<usize> {
		let (count,): (i64,) = sqlx::query_as(
			"SELECT COUNT(*) FROM events WHERE batch_id IS NULL AND (not_before_ms IS NULL OR not_before_ms <= ?)",
		)
		.bind(now.timestamp_millis())
		.fetch_one(&mut **tx)
		.await?;
		Ok(count as usize)
	}

	async fn count_where(tx: &mut Transaction<'_, Sqlite>, in_flight: bool) -> Result<usize> {
		let sql = if in_flight {
			"SELECT COUNT(*) FROM events WHERE batch_id IS NOT NULL"
		} else {
			"SELECT COUNT(*) FROM events WHERE batch_id IS NULL"
		};
		let (count,): (i64,) = sqlx::query_as(sql).fetch_one(&mut **tx).await?;
		Ok(count as usize)
	}
}

fn millis(at: DateTime<Utc>) -> i64 {
	at.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
	Utc.timestamp_millis_opt(ms)
		.single()
		.ok_or_else(|| TrackerError::Store(format!("invalid not_before timestamp: {ms}")))
}

fn row_to_event(row: EventRow) -> Result<Event> {
	let (id, event_id, kind, payload, contexts, created_at, attempts, not_before_ms) = row;
	Ok(Event {
		id: EventId(id as u64),
		event_id: Uuid::parse_str(&event_id)
			.map_err(|e| TrackerError::Store(format!("invalid event_id {event_id}: {e}")))?,
		kind: kind
			.parse::<EventKind>()
			.map_err(|e| TrackerError::Store(e.to_string()))?,
		payload: serde_json::from_str(&payload)?,
		contexts: serde_json::from_str::<Vec<SelfDescribingJson>>(&contexts)?,
		created_at,
		attempts: attempts as u32,
		not_before: not_before_ms.map(from_millis).transpose()?,
	})
}

#[async_trait]
impl EventStore for SqliteEventStore {
	#[tracing::instrument(skip(self, event), fields(kind = %event.kind))]
	async fn enqueue(&self, event: NewEvent) -> Result<EnqueueReceipt> {
		let payload = serde_json::to_string(&event.payload)?;
		let contexts = serde_json::to_string(&event.contexts)?;

		loop {
			let closed = self.closed.lock().await;
			if *closed {
				return Err(TrackerError::Shutdown);
			}

			let mut tx = self.pool.begin().await?;
			let total = Self::count_where(&mut tx, false).await?
				+ Self::count_where(&mut tx, true).await?;

			let mut evicted = None;
			if total >= self.capacity {
				match self.policy {
					QueueOverflowPolicy::DropNewest => {
						warn!(capacity = self.capacity, "event store full, dropping new event");
						return Err(TrackerError::StoreFull);
					}
					QueueOverflowPolicy::DropOldest => {
						let oldest: Option<(i64,)> = sqlx::query_as(
							"SELECT id FROM events WHERE batch_id IS NULL ORDER BY id LIMIT 1",
						)
						.fetch_optional(&mut *tx)
						.await?;
						let Some((oldest,)) = oldest else {
							warn!(
								capacity = self.capacity,
								"event store full and every event is in flight"
							);
							return Err(TrackerError::StoreFull);
						};
						sqlx::query("DELETE FROM events WHERE id = ?")
							.bind(oldest)
							.execute(&mut *tx)
							.await?;
						warn!(event_id = oldest, "dropped oldest event due to store overflow");
						evicted = Some(EventId(oldest as u64));
					}
					QueueOverflowPolicy::Block => {
						tx.rollback().await?;
						let freed = self.space_freed.notified();
						drop(closed);
						debug!("event store full, waiting for space");
						freed.await;
						continue;
					}
				}
			}

			let result = sqlx::query(
				r#"
                INSERT INTO events (event_id, kind, payload, contexts, created_at, attempts)
                VALUES (?, ?, ?, ?, ?, 0)
                "#,
			)
			.bind(event.event_id.to_string())
			.bind(event.kind.as_str())
			.bind(&payload)
			.bind(&contexts)
			.bind(event.created_at)
			.execute(&mut *tx)
			.await?;
			let id = EventId(result.last_insert_rowid() as u64);
			let ready = Self::count_ready(&mut tx, Utc::now()).await?;
			tx.commit().await?;

			return Ok(EnqueueReceipt { id, evicted, ready });
		}
	}

	#[tracing::instrument(skip(self))]
	async fn select_batch(&self, max_size: usize, now: DateTime<Utc>) -> Result<Option<Batch>> {
		if max_size == 0 {
			return Ok(None);
		}

		let _guard = self.closed.lock().await;
		let mut tx = self.pool.begin().await?;
		let rows = sqlx::query_as::<_, EventRow>(
			r#"
            SELECT id, event_id, kind, payload, contexts, created_at, attempts, not_before_ms
            FROM events
            WHERE batch_id IS NULL AND (not_before_ms IS NULL OR not_before_ms <= ?)
            ORDER BY id
            LIMIT ?
            "#,
		)
		.bind(millis(now))
		.bind(max_size as i64)
		.fetch_all(&mut *tx)
		.await?;

		if rows.is_empty() {
			return Ok(None);
		}

		let batch_id = BatchId::new();
		let batch_key = batch_id.to_string();
		let events = rows
			.into_iter()
			.map(row_to_event)
			.collect::<Result<Vec<_>>>()?;
		for event in &events {
			sqlx::query("UPDATE events SET batch_id = ? WHERE id = ?")
				.bind(&batch_key)
				.bind(event.id.as_u64() as i64)
				.execute(&mut *tx)
				.await?;
		}
		tx.commit().await?;

		debug!(batch_id = %batch_id, count = events.len(), "selected batch");
		Ok(Some(Batch {
			id: batch_id,
			events,
		}))
	}

	#[tracing::instrument(skip(self, settlement), fields(batch_id = %batch_id))]
	async fn settle(&self, batch_id: BatchId, settlement: Settlement) -> Result<()> {
		let _guard = self.closed.lock().await;
		let batch_key = batch_id.to_string();
		let mut tx = self.pool.begin().await?;
		let mut removed = 0;

		for id in settlement.delivered.iter().chain(&settlement.abandoned) {
			removed += sqlx::query("DELETE FROM events WHERE id = ? AND batch_id = ?")
				.bind(id.as_u64() as i64)
				.bind(&batch_key)
				.execute(&mut *tx)
				.await?
				.rows_affected();
		}

		for (id, not_before) in &settlement.retry {
			sqlx::query(
				r#"
                UPDATE events
                SET attempts = attempts + 1, not_before_ms = ?, batch_id = NULL
                WHERE id = ? AND batch_id = ?
                "#,
			)
			.bind(not_before.map(millis))
			.bind(id.as_u64() as i64)
			.bind(&batch_key)
			.execute(&mut *tx)
			.await?;
		}

		sqlx::query("UPDATE events SET batch_id = NULL WHERE batch_id = ?")
			.bind(&batch_key)
			.execute(&mut *tx)
			.await?;
		tx.commit().await?;

		if removed > 0 {
			self.space_freed.notify_waiters();
		}
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	async fn recover(&self) -> Result<usize> {
		let _guard = self.closed.lock().await;
		let result = sqlx::query("UPDATE events SET batch_id = NULL WHERE batch_id IS NOT NULL")
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected() as usize)
	}

	async fn counts(&self) -> Result<StoreCounts> {
		let _guard = self.closed.lock().await;
		let mut tx = self.pool.begin().await?;
		let counts = StoreCounts {
			pending: Self::count_where(&mut tx, false).await?,
			in_flight: Self::count_where(&mut tx, true).await?,
		};
		tx.commit().await?;
		Ok(counts)
	}

	async fn close(&self) {
		*self.closed.lock().await = true;
		self.space_freed.notify_waiters();
	}
}
