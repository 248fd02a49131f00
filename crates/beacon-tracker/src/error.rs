// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the tracker SDK.

use beacon_config::ConfigError;
use beacon_core::CoreError;
use thiserror::Error;

/// Tracker errors surfaced to application code.
///
/// Delivery failures are not in here: they are retried or abandoned in the
/// background and only reach the [`DeliveryObserver`](crate::DeliveryObserver).
#[derive(Debug, Error)]
pub enum TrackerError {
	/// The event is missing a required field or has malformed details.
	#[error("invalid event: {0}")]
	Validation(#[from] CoreError),

	/// The store is at capacity and the overflow policy rejected the event.
	#[error("event store is full")]
	StoreFull,

	/// SQLite failure in the durable store.
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	/// The store holds data it cannot read back.
	#[error("store error: {0}")]
	Store(String),

	/// Serialization error.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Tracker has been shut down.
	#[error("tracker has been shut down")]
	Shutdown,

	/// A tracker with this namespace is already registered.
	#[error("tracker namespace already registered: {0}")]
	NamespaceExists(String),

	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The HTTP client could not be constructed.
	#[error("failed to build http client: {0}")]
	HttpClient(#[source] reqwest::Error),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
	use super::*;
	use beacon_core::EventKind;

	#[test]
	fn validation_error_names_field() {
		let err: TrackerError = CoreError::MissingField {
			kind: EventKind::Structured,
			field: "action",
		}
		.into();
		assert!(err.to_string().contains("action"));
	}

	#[test]
	fn namespace_exists_names_namespace() {
		let err = TrackerError::NamespaceExists("main".to_string());
		assert_eq!(err.to_string(), "tracker namespace already registered: main");
	}
}
