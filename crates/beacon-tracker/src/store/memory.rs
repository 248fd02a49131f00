// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use async_trait::async_trait;
use beacon_config::{QueueOverflowPolicy, StoreConfig};
use beacon_core::{Event, EventId, NewEvent};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

use super::{Batch, BatchId, EnqueueReceipt, EventStore, Settlement, StoreCounts};
use crate::error::{Result, TrackerError};

struct Slot {
	event: Event,
	batch: Option<BatchId>,
}

#[derive(Default)]
struct State {
	events: BTreeMap<EventId, Slot>,
	next_id: u64,
	closed: bool,
}

impl State {
	fn counts(&self) -> StoreCounts {
		let in_flight = self.events.values().filter(|s| s.batch.is_some()).count();
		StoreCounts {
			pending: self.events.len() - in_flight,
			in_flight,
		}
	}

	fn ready(&self, now: DateTime<Utc>) -> usize {
		self
			.events
			.values()
			.filter(|s| s.batch.is_none() && s.event.is_eligible(now))
			.count()
	}

	fn oldest_pending(&self) -> Option<EventId> {
		self
			.events
			.iter()
			.find(|(_, slot)| slot.batch.is_none())
			.map(|(id, _)| *id)
	}

	fn insert(&mut self, new: NewEvent) -> EventId {
		self.next_id += 1;
		let id = EventId(self.next_id);
		self.events.insert(
			id,
			Slot {
				event: Event::from_new(id, new),
				batch: None,
			},
		);
		id
	}
}

/// In-process event store. Contents are lost when the process exits.
pub struct MemoryEventStore {
	capacity: usize,
	policy: QueueOverflowPolicy,
	state: Mutex<State>,
	space_freed: Notify,
}

impl MemoryEventStore {
	pub fn new(config: &StoreConfig) -> Self {
		Self {
			capacity: config.capacity,
			policy: config.overflow_policy,
			state: Mutex::new(State::default()),
			space_freed: Notify::new(),
		}
	}
}

#[async_trait]
impl EventStore for MemoryEventStore {
	#[tracing::instrument(skip(self, event), fields(kind = %event.kind))]
	async fn enqueue(&self, event: NewEvent) -> Result<EnqueueReceipt> {
		loop {
			let mut state = self.state.lock().await;
			if state.closed {
				return Err(TrackerError::Shutdown);
			}

			let mut evicted = None;
			if state.events.len() >= self.capacity {
				match self.policy {
					QueueOverflowPolicy::DropNewest => {
						warn!(capacity = self.capacity, "event store full, dropping new event");
						return Err(TrackerError::StoreFull);
					}
					QueueOverflowPolicy::DropOldest => {
						let Some(oldest) = state.oldest_pending() else {
							warn!(
								capacity = self.capacity,
								"event store full and every event is in flight"
							);
							return Err(TrackerError::StoreFull);
						};
						state.events.remove(&oldest);
						warn!(event_id = %oldest, "dropped oldest event due to store overflow");
						evicted = Some(oldest);
					}
					QueueOverflowPolicy::Block => {
						// Registered before the lock is released so a concurrent
						// settle cannot slip its wakeup past us.
						let freed = self.space_freed.notified();
						drop(state);
						debug!("event store full, waiting for space");
						freed.await;
						continue;
					}
				}
			}

			let id = state.insert(event);
			let ready = state.ready(Utc::now());
			return Ok(EnqueueReceipt { id, evicted, ready });
		}
	}

	#[tracing::instrument(skip(self))]
	async fn select_batch(&self, max_size: usize, now: DateTime<Utc>) -> Result<Option<Batch>> {
		if max_size == 0 {
			return Ok(None);
		}

		let mut state = self.state.lock().await;
		let batch_id = BatchId::new();
		let mut events = Vec::new();
		for slot in state.events.values_mut() {
			if events.len() >= max_size {
				break;
			}
			if slot.batch.is_none() && slot.event.is_eligible(now) {
				slot.batch = Some(batch_id);
				events.push(slot.event.clone());
			}
		}

		if events.is_empty() {
			return Ok(None);
		}

		debug!(batch_id = %batch_id, count = events.len(), "selected batch");
		Ok(Some(Batch {
			id: batch_id,
			events,
		}))
	}

	#[tracing::instrument(skip(self, settlement), fields(batch_id = %batch_id))]
	async fn settle(&self, batch_id: BatchId, settlement: Settlement) -> Result<()> {
		let mut state = self.state.lock().await;
		let in_batch = |slot: &Slot| slot.batch == Some(batch_id);
		let mut removed = 0;

		for id in settlement.delivered.iter().chain(&settlement.abandoned) {
			if state.events.get(id).is_some_and(in_batch) {
				state.events.remove(id);
				removed += 1;
			}
		}

		for (id, not_before) in &settlement.retry {
			if let Some(slot) = state.events.get_mut(id).filter(|s| in_batch(s)) {
				slot.event.attempts += 1;
				slot.event.not_before = *not_before;
				slot.batch = None;
			}
		}

		for slot in state.events.values_mut().filter(|s| s.batch == Some(batch_id)) {
			slot.batch = None;
		}

		drop(state);
		if removed > 0 {
			self.space_freed.notify_waiters();
		}
		Ok(())
	}

	#[tracing::instrument(skip(self))]
	async fn recover(&self) -> Result<usize> {
		let mut state = self.state.lock().await;
		let mut recovered = 0;
		for slot in state.events.values_mut() {
			if slot.batch.take().is_some() {
				recovered += 1;
			}
		}
		if recovered > 0 {
			debug!(count = recovered, "returned in-flight events to pending");
		}
		Ok(recovered)
	}

	async fn counts(&self) -> Result<StoreCounts> {
		Ok(self.state.lock().await.counts())
	}

	async fn close(&self) {
		self.state.lock().await.closed = true;
		self.space_freed.notify_waiters();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::conformance;
	use std::sync::Arc;
	use std::time::Duration;

	fn store() -> MemoryEventStore {
		MemoryEventStore::new(&StoreConfig::default())
	}

	fn bounded(capacity: usize, policy: QueueOverflowPolicy) -> MemoryEventStore {
		MemoryEventStore::new(&StoreConfig {
			capacity,
			overflow_policy: policy,
			database_path: None,
		})
	}

	#[tokio::test]
	async fn ids_increase_with_insertion() {
		conformance::ids_increase_with_insertion(&store()).await;
	}

	#[tokio::test]
	async fn select_takes_oldest_first() {
		conformance::select_takes_oldest_first(&store()).await;
	}

	#[tokio::test]
	async fn selections_never_overlap() {
		conformance::selections_never_overlap(&store()).await;
	}

	#[tokio::test]
	async fn zero_size_selects_nothing() {
		conformance::zero_size_selects_nothing(&store()).await;
	}

	#[tokio::test]
	async fn acknowledge_removes_events() {
		conformance::acknowledge_removes_events(&store()).await;
	}

	#[tokio::test]
	async fn requeue_keeps_fifo_and_counts_attempt() {
		conformance::requeue_keeps_fifo_and_counts_attempt(&store()).await;
	}

	#[tokio::test]
	async fn backoff_hides_event_until_due() {
		conformance::backoff_hides_event_until_due(&store()).await;
	}

	#[tokio::test]
	async fn ready_count_skips_deferred_and_in_flight() {
		conformance::ready_count_skips_deferred_and_in_flight(&store()).await;
	}

	#[tokio::test]
	async fn settle_resolves_each_member() {
		conformance::settle_resolves_each_member(&store()).await;
	}

	#[tokio::test]
	async fn settle_ignores_other_batches() {
		conformance::settle_ignores_other_batches(&store()).await;
	}

	#[tokio::test]
	async fn recover_releases_in_flight() {
		conformance::recover_releases_in_flight(&store()).await;
	}

	#[tokio::test]
	async fn drop_oldest_evicts_pending() {
		conformance::drop_oldest_evicts_pending(&bounded(3, QueueOverflowPolicy::DropOldest)).await;
	}

	#[tokio::test]
	async fn drop_oldest_rejects_when_all_in_flight() {
		conformance::drop_oldest_rejects_when_all_in_flight(&bounded(
			3,
			QueueOverflowPolicy::DropOldest,
		))
		.await;
	}

	#[tokio::test]
	async fn drop_newest_rejects() {
		conformance::drop_newest_rejects(&bounded(3, QueueOverflowPolicy::DropNewest)).await;
	}

	#[tokio::test]
	async fn block_waits_for_acknowledgement() {
		let store = Arc::new(bounded(2, QueueOverflowPolicy::Block));
		conformance::fill(store.as_ref(), 2).await;
		let batch = store.select_batch(1, Utc::now()).await.unwrap().unwrap();

		let waiter = {
			let store = Arc::clone(&store);
			tokio::spawn(async move { store.enqueue(conformance::event(2)).await })
		};
		tokio::time::sleep(Duration::from_millis(50)).await;
		assert!(!waiter.is_finished());

		store.acknowledge(&batch).await.unwrap();
		let receipt = tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap()
			.unwrap();
		assert_eq!(receipt.evicted, None);
		assert_eq!(store.counts().await.unwrap().total(), 2);
	}

	#[tokio::test]
	async fn close_releases_blocked_enqueue() {
		let store = Arc::new(bounded(1, QueueOverflowPolicy::Block));
		conformance::fill(store.as_ref(), 1).await;

		let waiter = {
			let store = Arc::clone(&store);
			tokio::spawn(async move { store.enqueue(conformance::event(1)).await })
		};
		tokio::time::sleep(Duration::from_millis(20)).await;
		store.close().await;

		let result = tokio::time::timeout(Duration::from_secs(1), waiter)
			.await
			.unwrap()
			.unwrap();
		assert!(matches!(result, Err(TrackerError::Shutdown)));
	}
}
