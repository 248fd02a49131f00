// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Public entry point for application code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_config::TrackerConfig;
use beacon_core::{
	EventId, EventKind, NewEvent, PageViewEvent, ScreenViewEvent, SelfDescribingEvent,
	SelfDescribingJson, StructuredEvent, Subject, SubjectData, TrackerEvent,
};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::context::ContextProvider;
use crate::error::{Result, TrackerError};
use crate::observer::{DeliveryObserver, TracingObserver};
use crate::retry::RetryController;
use crate::scheduler::{DeliveryScheduler, FlushReport};
use crate::sender::{HttpSender, NetworkSender};
use crate::store::{open_store, EventStore, StoreCounts};

/// Sent as `tv` with every event.
pub const TRACKER_VERSION: &str = concat!("rust-", env!("CARGO_PKG_VERSION"));

/// Builder for constructing a [`Tracker`].
///
/// Store and sender default to what the configuration describes; tests and
/// embedders can supply their own.
pub struct TrackerBuilder {
	config: TrackerConfig,
	store: Option<Arc<dyn EventStore>>,
	sender: Option<Arc<dyn NetworkSender>>,
	observer: Arc<dyn DeliveryObserver>,
	context_providers: Vec<Arc<dyn ContextProvider>>,
	subject: Subject,
	background: bool,
}

impl TrackerBuilder {
	pub fn new(config: TrackerConfig) -> Self {
		Self {
			config,
			store: None,
			sender: None,
			observer: Arc::new(TracingObserver),
			context_providers: Vec::new(),
			subject: Subject::default(),
			background: true,
		}
	}

	pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
		self.store = Some(store);
		self
	}

	pub fn sender(mut self, sender: Arc<dyn NetworkSender>) -> Self {
		self.sender = Some(sender);
		self
	}

	pub fn observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
		self.observer = observer;
		self
	}

	/// Adds a provider whose contexts are appended to every event.
	pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
		self.context_providers.push(provider);
		self
	}

	/// Initial subject, as if passed to [`Tracker::set_subject_data`].
	pub fn subject_data(mut self, data: SubjectData) -> Self {
		self.subject.apply(data);
		self
	}

	/// Whether to run the background delivery task (default: true).
	///
	/// Without it events are only delivered by explicit [`Tracker::flush`].
	pub fn background_delivery(mut self, enabled: bool) -> Self {
		self.background = enabled;
		self
	}

	pub async fn build(self) -> Result<Tracker> {
		self.config.validate()?;

		let store = match self.store {
			Some(store) => store,
			None => open_store(&self.config.store).await?,
		};
		let sender = match self.sender {
			Some(sender) => sender,
			None => Arc::new(HttpSender::new(&self.config.emitter)?),
		};

		let scheduler = Arc::new(DeliveryScheduler::new(
			self.config.identity.namespace.clone(),
			self.config.delivery.clone(),
			Arc::clone(&store),
			sender,
			RetryController::new(self.config.retry.clone()),
			Arc::clone(&self.observer),
		));
		if self.background {
			scheduler.start().await;
		}

		info!(
			namespace = %self.config.identity.namespace,
			app_id = %self.config.identity.app_id,
			collector = %self.config.emitter.collector_url(),
			durable = self.config.store.is_durable(),
			"Tracker initialized"
		);

		Ok(Tracker {
			config: self.config,
			store,
			scheduler,
			observer: self.observer,
			context_providers: self.context_providers,
			subject: RwLock::new(self.subject),
			closed: AtomicBool::new(false),
		})
	}
}

/// Accepts events from application code and hands them to the delivery queue.
///
/// Tracking returns once the event is stored; delivery happens in the
/// background and its failures never reach the caller.
///
/// Call [`Tracker::shutdown`] for a final delivery attempt. Dropping a tracker
/// without it aborts the background task and leaves undelivered events in
/// the store.
pub struct Tracker {
	config: TrackerConfig,
	store: Arc<dyn EventStore>,
	scheduler: Arc<DeliveryScheduler>,
	observer: Arc<dyn DeliveryObserver>,
	context_providers: Vec<Arc<dyn ContextProvider>>,
	subject: RwLock<Subject>,
	closed: AtomicBool,
}

impl std::fmt::Debug for Tracker {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tracker")
			.field("namespace", &self.config.identity.namespace)
			.field("collector", &self.config.emitter.collector_url())
			.field("closed", &self.is_shutdown())
			.finish_non_exhaustive()
	}
}

impl Drop for Tracker {
	fn drop(&mut self) {
		if !self.is_shutdown() {
			warn!(namespace = %self.namespace(), "tracker dropped without shutdown");
			self.scheduler.abort();
		}
	}
}

impl Tracker {
	pub fn builder(config: TrackerConfig) -> TrackerBuilder {
		TrackerBuilder::new(config)
	}

	pub fn namespace(&self) -> &str {
		&self.config.identity.namespace
	}

	pub fn config(&self) -> &TrackerConfig {
		&self.config
	}

	pub fn is_shutdown(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Tracks an event described by a loosely-typed details map.
	///
	/// The details are checked against the required fields of `kind` before
	/// anything is stored.
	pub async fn track(
		&self,
		kind: EventKind,
		details: Value,
		contexts: Vec<SelfDescribingJson>,
	) -> Result<EventId> {
		self.ensure_open()?;
		let event = TrackerEvent::from_details(kind, details)?;
		self.track_event(event, contexts).await
	}

	/// Structured event; `category` and `action` are required.
	pub async fn track_structured_event(
		&self,
		event: StructuredEvent,
		contexts: Vec<SelfDescribingJson>,
	) -> Result<EventId> {
		self.track_event(event, contexts).await
	}

	/// Screen view; `screen_name` is required.
	pub async fn track_screen_view_event(
		&self,
		event: ScreenViewEvent,
		contexts: Vec<SelfDescribingJson>,
	) -> Result<EventId> {
		self.track_event(event, contexts).await
	}

	/// Page view; `page_url` is required.
	pub async fn track_page_view_event(
		&self,
		event: PageViewEvent,
		contexts: Vec<SelfDescribingJson>,
	) -> Result<EventId> {
		self.track_event(event, contexts).await
	}

	/// Self-describing event; `schema` and `data` are required.
	pub async fn track_self_describing_event(
		&self,
		event: SelfDescribingEvent,
		contexts: Vec<SelfDescribingJson>,
	) -> Result<EventId> {
		self.track_event(event, contexts).await
	}

	#[instrument(skip_all, fields(namespace = %self.config.identity.namespace))]
	pub async fn track_event(
		&self,
		event: impl Into<TrackerEvent>,
		mut contexts: Vec<SelfDescribingJson>,
	) -> Result<EventId> {
		self.ensure_open()?;
		let event = event.into();
		let kind = event.kind();
		let identity = &self.config.identity;

		let subject = self.subject.read().await.to_payload();
		let payload = event
			.into_payload()?
			.insert("tna", identity.namespace.as_str())
			.insert("aid", identity.app_id.as_str())
			.insert("p", identity.platform.as_str())
			.insert("tv", TRACKER_VERSION)
			.merge_missing(subject);

		for provider in &self.context_providers {
			contexts.extend(provider.contexts(kind).await);
		}

		let receipt = self
			.store
			.enqueue(NewEvent::new(kind, payload.into_map(), contexts))
			.await?;
		if let Some(evicted) = receipt.evicted {
			self.observer.on_evicted(self.namespace(), evicted);
		}
		debug!(event_id = %receipt.id, kind = %kind, ready = receipt.ready, "event tracked");

		self.scheduler.notify_ready(receipt.ready);
		Ok(receipt.id)
	}

	/// Updates the subject attached to events tracked from now on.
	///
	/// Empty strings are ignored; viewport and screen size apply only when
	/// both dimensions are given.
	pub async fn set_subject_data(&self, data: SubjectData) {
		self.subject.write().await.apply(data);
	}

	pub async fn subject(&self) -> Subject {
		self.subject.read().await.clone()
	}

	/// Delivers every eligible pending event now.
	pub async fn flush(&self) -> Result<FlushReport> {
		self.ensure_open()?;
		self.scheduler.flush().await
	}

	pub async fn counts(&self) -> Result<StoreCounts> {
		self.store.counts().await
	}

	/// Stops accepting events, makes a bounded final delivery attempt and
	/// leaves anything undelivered pending in the store.
	pub async fn shutdown(&self) -> Result<FlushReport> {
		if self.closed.swap(true, Ordering::SeqCst) {
			return Ok(FlushReport::default());
		}
		info!(namespace = %self.namespace(), "Shutting down tracker");
		self.scheduler.shutdown().await
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_shutdown() {
			return Err(TrackerError::Shutdown);
		}
		Ok(())
	}
}
