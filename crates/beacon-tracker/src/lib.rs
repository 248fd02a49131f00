// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reliable delivery of analytics events to a collector.
//!
//! Application code tracks events through a [`Tracker`]. Each accepted
//! event is written to an [`EventStore`] before `track` returns; a
//! [`DeliveryScheduler`] drains the store in batches, hands them to a
//! [`NetworkSender`] and settles every event as delivered, retried later
//! or abandoned.
//!
//! ```no_run
//! use beacon_tracker::{StructuredEvent, Tracker, TrackerConfig};
//!
//! # async fn run() -> beacon_tracker::Result<()> {
//! let config = TrackerConfig::new("main", "shop", "collector.example.com");
//! let tracker = Tracker::builder(config).build().await?;
//! tracker
//! 	.track_structured_event(StructuredEvent::new("checkout", "pay"), vec![])
//! 	.await?;
//! tracker.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod observer;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod sender;
pub mod store;
pub mod tracker;
pub mod wire;

pub use context::{ContextProvider, StaticContexts};
pub use error::{Result, TrackerError};
pub use observer::{DeliveryObserver, NoopObserver, TracingObserver};
pub use registry::TrackerRegistry;
pub use retry::{AbandonReason, RetryController, RetryDecision};
pub use scheduler::{DeliveryScheduler, FlushReport};
pub use sender::{HttpSender, NetworkSender, SendError, SendOutcome};
pub use store::{
	open_store, Batch, BatchId, EnqueueReceipt, EventStore, MemoryEventStore, Settlement,
	SqliteEventStore, StoreCounts,
};
pub use tracker::{Tracker, TrackerBuilder, TRACKER_VERSION};

pub use beacon_config::{QueueOverflowPolicy, TrackerConfig};
pub use beacon_core::{
	Event, EventId, EventKind, PageViewEvent, ScreenViewEvent, SelfDescribingEvent,
	SelfDescribingJson, StructuredEvent, SubjectData,
};
