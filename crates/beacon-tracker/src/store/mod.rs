// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered buffer of events awaiting delivery.
//!
//! Every stored event is either pending or in flight. Selecting a batch moves
//! its events to in flight; settling the batch removes them (delivered or
//! abandoned) or returns them to pending with a bumped attempt count. The
//! ordering key is the [`EventId`], so requeued events keep their place
//! relative to everything enqueued after them.

mod memory;
mod sqlite;

pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;

use std::sync::Arc;

use async_trait::async_trait;
use beacon_config::StoreConfig;
use beacon_core::{Event, EventId, NewEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// Identifies one selection of in-flight events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for BatchId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for BatchId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

/// Events selected together for one delivery attempt, oldest first.
#[derive(Debug, Clone)]
pub struct Batch {
	pub id: BatchId,
	pub events: Vec<Event>,
}

impl Batch {
	pub fn event_ids(&self) -> Vec<EventId> {
		self.events.iter().map(|e| e.id).collect()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}
}

/// Result of a successful enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueReceipt {
	pub id: EventId,
	/// Pending event dropped to make room, under `DropOldest`.
	pub evicted: Option<EventId>,
	/// Pending events eligible for delivery right now, the new one included.
	/// Events waiting out a retry delay are not counted.
	pub ready: usize,
}

/// Per-event resolution of an in-flight batch.
///
/// Batch members not named here go back to pending untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settlement {
	pub delivered: Vec<EventId>,
	pub retry: Vec<(EventId, Option<DateTime<Utc>>)>,
	pub abandoned: Vec<EventId>,
}

impl Settlement {
	pub fn delivered(ids: Vec<EventId>) -> Self {
		Self {
			delivered: ids,
			..Default::default()
		}
	}

	pub fn retry_all(ids: Vec<EventId>, not_before: Option<DateTime<Utc>>) -> Self {
		Self {
			retry: ids.into_iter().map(|id| (id, not_before)).collect(),
			..Default::default()
		}
	}

	pub fn is_empty(&self) -> bool {
		self.delivered.is_empty() && self.retry.is_empty() && self.abandoned.is_empty()
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
	pub pending: usize,
	pub in_flight: usize,
}

impl StoreCounts {
	pub fn total(&self) -> usize {
		self.pending + self.in_flight
	}
}

/// Storage backend for the delivery queue.
///
/// Implementations serialise all operations; no operation performs network I/O.
#[async_trait]
pub trait EventStore: Send + Sync {
	/// Stores a new event as pending, applying the overflow policy when full.
	async fn enqueue(&self, event: NewEvent) -> Result<EnqueueReceipt>;

	/// Marks up to `max_size` of the oldest eligible pending events as in flight.
	async fn select_batch(&self, max_size: usize, now: DateTime<Utc>) -> Result<Option<Batch>>;

	/// Resolves the members of an in-flight batch.
	async fn settle(&self, batch_id: BatchId, settlement: Settlement) -> Result<()>;

	/// Returns every in-flight event to pending.
	async fn recover(&self) -> Result<usize>;

	async fn counts(&self) -> Result<StoreCounts>;

	/// Wakes enqueuers blocked on a full store; they fail with `Shutdown`.
	async fn close(&self);

	/// Removes the batch's events for good.
	async fn acknowledge(&self, batch: &Batch) -> Result<()> {
		self
			.settle(batch.id, Settlement::delivered(batch.event_ids()))
			.await
	}

	/// Returns the batch's events to pending with one more attempt recorded.
	async fn requeue(&self, batch: &Batch, not_before: Option<DateTime<Utc>>) -> Result<()> {
		self
			.settle(batch.id, Settlement::retry_all(batch.event_ids(), not_before))
			.await
	}
}

/// Opens the store described by `config`: SQLite when a database path is
/// set, in-memory otherwise.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn EventStore>> {
	match &config.database_path {
		Some(path) => Ok(Arc::new(SqliteEventStore::open(path, config).await?)),
		None => Ok(Arc::new(MemoryEventStore::new(config))),
	}
}
