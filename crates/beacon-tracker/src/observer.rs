// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery notifications for application-side monitoring.

use beacon_core::{Event, EventId};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::retry::AbandonReason;

/// Receives delivery lifecycle notifications. Every method defaults to a no-op.
///
/// Called from the delivery task; implementations must not block.
pub trait DeliveryObserver: Send + Sync {
	fn on_delivered(&self, _namespace: &str, _events: &[EventId]) {}

	fn on_retry_scheduled(
		&self,
		_namespace: &str,
		_event: EventId,
		_attempts: u32,
		_not_before: DateTime<Utc>,
	) {
	}

	/// Called exactly once per abandoned event.
	fn on_abandoned(&self, _namespace: &str, _event: &Event, _reason: &AbandonReason) {}

	/// A pending event was dropped to make room for a new one.
	fn on_evicted(&self, _namespace: &str, _event: EventId) {}
}

#[derive(Debug, Clone, Default)]
pub struct NoopObserver;

impl DeliveryObserver for NoopObserver {}

/// Reports delivery lifecycle through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
	fn on_delivered(&self, namespace: &str, events: &[EventId]) {
		debug!(namespace, count = events.len(), "events delivered");
	}

	fn on_retry_scheduled(
		&self,
		namespace: &str,
		event: EventId,
		attempts: u32,
		not_before: DateTime<Utc>,
	) {
		debug!(namespace, event_id = %event, attempts, not_before = %not_before, "event scheduled for retry");
	}

	fn on_abandoned(&self, namespace: &str, event: &Event, reason: &AbandonReason) {
		warn!(
			namespace,
			event_id = %event.id,
			eid = %event.event_id,
			kind = %event.kind,
			attempts = event.attempts + 1,
			reason = %reason,
			"event abandoned"
		);
	}

	fn on_evicted(&self, namespace: &str, event: EventId) {
		warn!(namespace, event_id = %event, "event evicted from full store");
	}
}
