// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The event record held by the delivery queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::tracker_event::SelfDescribingJson;

/// Store-assigned identifier. Strictly increasing in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl EventId {
	pub fn as_u64(&self) -> u64 {
		self.0
	}
}

impl std::fmt::Display for EventId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The event-type tag carried by every stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	Structured,
	ScreenView,
	PageView,
	SelfDescribing,
}

impl EventKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EventKind::Structured => "structured",
			EventKind::ScreenView => "screen_view",
			EventKind::PageView => "page_view",
			EventKind::SelfDescribing => "self_describing",
		}
	}

	/// Value of the `e` field on the wire.
	pub fn protocol_code(&self) -> &'static str {
		match self {
			EventKind::Structured => "se",
			EventKind::PageView => "pv",
			EventKind::ScreenView | EventKind::SelfDescribing => "ue",
		}
	}
}

impl std::fmt::Display for EventKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for EventKind {
	type Err = CoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"structured" => Ok(EventKind::Structured),
			"screen_view" => Ok(EventKind::ScreenView),
			"page_view" => Ok(EventKind::PageView),
			"self_describing" => Ok(EventKind::SelfDescribing),
			_ => Err(CoreError::UnknownKind(s.to_string())),
		}
	}
}

/// An enriched event ready to be handed to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
	/// Sent as `eid` so the collector can deduplicate redeliveries.
	pub event_id: Uuid,
	pub kind: EventKind,
	pub payload: Map<String, Value>,
	pub contexts: Vec<SelfDescribingJson>,
	pub created_at: DateTime<Utc>,
}

impl NewEvent {
	pub fn new(
		kind: EventKind,
		payload: Map<String, Value>,
		contexts: Vec<SelfDescribingJson>,
	) -> Self {
		Self {
			event_id: Uuid::new_v4(),
			kind,
			payload,
			contexts,
			created_at: Utc::now(),
		}
	}
}

/// A stored event.
///
/// Everything except `attempts` and `not_before` is fixed at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub id: EventId,
	pub event_id: Uuid,
	pub kind: EventKind,
	pub payload: Map<String, Value>,
	pub contexts: Vec<SelfDescribingJson>,
	pub created_at: DateTime<Utc>,
	/// Failed delivery attempts so far.
	pub attempts: u32,
	/// Not eligible for selection before this instant.
	pub not_before: Option<DateTime<Utc>>,
}

impl Event {
	pub fn from_new(id: EventId, new: NewEvent) -> Self {
		Self {
			id,
			event_id: new.event_id,
			kind: new.kind,
			payload: new.payload,
			contexts: new.contexts,
			created_at: new.created_at,
			attempts: 0,
			not_before: None,
		}
	}

	pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
		self.not_before.map_or(true, |at| at <= now)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	#[test]
	fn event_kind_roundtrips_through_str() {
		for kind in [
			EventKind::Structured,
			EventKind::ScreenView,
			EventKind::PageView,
			EventKind::SelfDescribing,
		] {
			assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
		}
	}

	#[test]
	fn unknown_kind_is_rejected() {
		let err = "transaction".parse::<EventKind>().unwrap_err();
		assert_eq!(err, CoreError::UnknownKind("transaction".to_string()));
	}

	#[test]
	fn screen_view_is_sent_as_self_describing() {
		assert_eq!(EventKind::ScreenView.protocol_code(), "ue");
		assert_eq!(EventKind::Structured.protocol_code(), "se");
		assert_eq!(EventKind::PageView.protocol_code(), "pv");
	}

	#[test]
	fn from_new_starts_with_zero_attempts() {
		let new = NewEvent::new(EventKind::PageView, Map::new(), Vec::new());
		let event = Event::from_new(EventId(7), new.clone());
		assert_eq!(event.id, EventId(7));
		assert_eq!(event.event_id, new.event_id);
		assert_eq!(event.attempts, 0);
		assert!(event.not_before.is_none());
	}

	#[test]
	fn eligibility_respects_not_before() {
		let now = Utc::now();
		let mut event = Event::from_new(
			EventId(1),
			NewEvent::new(EventKind::Structured, Map::new(), Vec::new()),
		);
		assert!(event.is_eligible(now));

		event.not_before = Some(now + Duration::seconds(5));
		assert!(!event.is_eligible(now));
		assert!(event.is_eligible(now + Duration::seconds(5)));
	}
}
