// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decides when buffered events are delivered.
//!
//! A flush cycle runs on the periodic timer, when an enqueue pushes the
//! pending count over the threshold, or on request. One cycle runs at a time;
//! a trigger that arrives mid-cycle is coalesced into it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_config::DeliveryConfig;
use beacon_core::{Event, EventId};
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::observer::DeliveryObserver;
use crate::retry::{AbandonReason, RetryController, RetryDecision};
use crate::sender::{NetworkSender, SendError, SendOutcome};
use crate::store::{Batch, EventStore, Settlement};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Totals for one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
	pub batches: usize,
	pub delivered: usize,
	pub retried: usize,
	pub abandoned: usize,
	/// Another cycle was already running and will pick up this request.
	pub coalesced: bool,
}

impl FlushReport {
	pub fn coalesced() -> Self {
		Self {
			coalesced: true,
			..Default::default()
		}
	}
}

struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

pub struct DeliveryScheduler {
	namespace: String,
	config: DeliveryConfig,
	store: Arc<dyn EventStore>,
	sender: Arc<dyn NetworkSender>,
	retry: RetryController,
	observer: Arc<dyn DeliveryObserver>,
	flushing: AtomicBool,
	shutdown: AtomicBool,
	wake: Notify,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryScheduler {
	pub fn new(
		namespace: impl Into<String>,
		config: DeliveryConfig,
		store: Arc<dyn EventStore>,
		sender: Arc<dyn NetworkSender>,
		retry: RetryController,
		observer: Arc<dyn DeliveryObserver>,
	) -> Self {
		Self {
			namespace: namespace.into(),
			config,
			store,
			sender,
			retry,
			observer,
			flushing: AtomicBool::new(false),
			shutdown: AtomicBool::new(false),
			wake: Notify::new(),
			task: Mutex::new(None),
		}
	}

	pub fn config(&self) -> &DeliveryConfig {
		&self.config
	}

	pub fn is_shutdown(&self) -> bool {
		self.shutdown.load(Ordering::SeqCst)
	}

	/// Starts the background delivery task.
	#[instrument(skip(self), fields(namespace = %self.namespace))]
	pub async fn start(self: &Arc<Self>) {
		let mut task = self.task.lock().await;
		if task.is_some() {
			return;
		}
		let scheduler = Arc::clone(self);
		*task = Some(tokio::spawn(async move { scheduler.run().await }));
	}

	/// Aborts the background task without a final flush. Anything in flight
	/// stays there until the store is recovered.
	pub fn abort(&self) {
		if let Ok(mut task) = self.task.try_lock() {
			if let Some(handle) = task.take() {
				handle.abort();
				debug!(namespace = %self.namespace, "delivery task aborted");
			}
		}
	}

	/// Wakes the background task for an out-of-cycle flush.
	pub fn request_flush(&self) {
		self.wake.notify_one();
	}

	/// Wakes the background task once `ready` events are eligible for
	/// delivery. Events waiting out a retry delay do not count towards the
	/// threshold.
	pub fn notify_ready(&self, ready: usize) {
		if ready >= self.config.flush_threshold {
			debug!(namespace = %self.namespace, ready, "flush threshold reached");
			self.request_flush();
		}
	}

	async fn run(&self) {
		info!(
			namespace = %self.namespace,
			flush_interval_ms = self.config.flush_interval.as_millis() as u64,
			batch_size = self.config.batch_size,
			"Starting delivery scheduler"
		);

		loop {
			tokio::select! {
				_ = tokio::time::sleep(self.config.flush_interval) => {}
				_ = self.wake.notified() => {}
			}

			if self.is_shutdown() {
				break;
			}

			if let Err(e) = self.flush().await {
				error!(namespace = %self.namespace, error = %e, "Failed to flush events");
			}
		}

		info!(namespace = %self.namespace, "Delivery scheduler stopped");
	}

	/// Delivers every eligible pending event, batch by batch.
	///
	/// Returns a coalesced report without doing anything if a cycle is
	/// already running.
	#[instrument(skip(self), fields(namespace = %self.namespace))]
	pub async fn flush(&self) -> Result<FlushReport> {
		if self
			.flushing
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			debug!("flush already running, coalescing");
			return Ok(FlushReport::coalesced());
		}
		let _guard = FlushGuard(&self.flushing);

		let mut report = FlushReport::default();
		while let Some(batch) = self
			.store
			.select_batch(self.config.batch_size, Utc::now())
			.await?
		{
			report.batches += 1;
			let outcome = match self.sender.send(&batch).await {
				Ok(outcome) => outcome,
				Err(e) => {
					warn!(batch_id = %batch.id, count = batch.len(), error = %e, "batch delivery failed");
					SendOutcome::failed(&batch, e)
				}
			};
			if let Err(e) = self.settle(&batch, outcome, &mut report).await {
				// Members not named in a settlement go back to pending as they were.
				if let Err(release) = self.store.settle(batch.id, Settlement::default()).await {
					error!(batch_id = %batch.id, error = %release, "failed to release batch after settle error");
				}
				return Err(e);
			}
		}

		if report.batches > 0 {
			info!(
				batches = report.batches,
				delivered = report.delivered,
				retried = report.retried,
				abandoned = report.abandoned,
				"flush complete"
			);
		}
		Ok(report)
	}

	async fn settle(&self, batch: &Batch, outcome: SendOutcome, report: &mut FlushReport) -> Result<()> {
		let now = Utc::now();
		let mut results = outcome.results;
		for event in &batch.events {
			if !results.iter().any(|(id, _)| *id == event.id) {
				results.push((
					event.id,
					Err(SendError::Transport("sender reported no result".into())),
				));
			}
		}

		let mut settlement = Settlement::default();
		let mut retried: Vec<(&Event, chrono::DateTime<Utc>)> = Vec::new();
		let mut abandoned: Vec<(&Event, AbandonReason)> = Vec::new();

		for (id, result) in results {
			let Some(event) = batch.events.iter().find(|e| e.id == id) else {
				continue;
			};
			match result {
				Ok(()) => settlement.delivered.push(id),
				Err(error) => match self.retry.decide(event, &error, now) {
					RetryDecision::Retry { not_before } => {
						settlement.retry.push((id, Some(not_before)));
						retried.push((event, not_before));
					}
					RetryDecision::Abandon(reason) => {
						settlement.abandoned.push(id);
						abandoned.push((event, reason));
					}
				},
			}
		}

		let delivered: Vec<EventId> = settlement.delivered.clone();
		self.store.settle(batch.id, settlement).await?;

		report.delivered += delivered.len();
		report.retried += retried.len();
		report.abandoned += abandoned.len();

		if !delivered.is_empty() {
			self.observer.on_delivered(&self.namespace, &delivered);
		}
		for (event, not_before) in retried {
			self
				.observer
				.on_retry_scheduled(&self.namespace, event.id, event.attempts + 1, not_before);
		}
		for (event, reason) in &abandoned {
			self.observer.on_abandoned(&self.namespace, event, reason);
		}
		Ok(())
	}

	/// Stops the background task, runs a final flush bounded by the shutdown
	/// timeout, then returns anything still in flight to pending.
	#[instrument(skip(self), fields(namespace = %self.namespace))]
	pub async fn shutdown(&self) -> Result<FlushReport> {
		if self.shutdown.swap(true, Ordering::SeqCst) {
			return Ok(FlushReport::default());
		}
		self.wake.notify_one();

		let mut task = self.task.lock().await.take();
		let final_flush = async {
			// Let a cycle already in progress finish first.
			if let Some(handle) = task.as_mut() {
				if let Err(e) = handle.await {
					warn!(error = %e, "delivery task ended abnormally");
				}
			}
			loop {
				let report = self.flush().await?;
				if !report.coalesced {
					return Ok::<_, crate::error::TrackerError>(report);
				}
				tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
			}
		};

		let report = match tokio::time::timeout(self.config.shutdown_timeout, final_flush).await {
			Ok(Ok(report)) => report,
			Ok(Err(e)) => {
				error!(error = %e, "final flush failed");
				FlushReport::default()
			}
			Err(_) => {
				warn!(
					timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
					"final flush timed out"
				);
				FlushReport::default()
			}
		};

		if let Some(handle) = task {
			handle.abort();
		}

		let recovered = self.store.recover().await?;
		if recovered > 0 {
			info!(count = recovered, "returned unfinished events to pending");
		}
		self.store.close().await;
		info!("Delivery scheduler shut down");
		Ok(report)
	}
}
