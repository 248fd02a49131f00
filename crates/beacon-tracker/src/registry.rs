// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Namespace-keyed lookup for trackers living in one process.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_config::TrackerConfig;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::tracker::Tracker;

/// Owns every live tracker, keyed by namespace.
///
/// Each tracker keeps its own store and delivery task; removing one never
/// touches the others.
#[derive(Default)]
pub struct TrackerRegistry {
	trackers: RwLock<HashMap<String, Arc<Tracker>>>,
}

impl TrackerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a tracker from `config` with default store and sender.
	pub async fn create(&self, config: TrackerConfig) -> Result<Arc<Tracker>> {
		if self.contains(config.namespace()).await {
			return Err(TrackerError::NamespaceExists(config.namespace().to_string()));
		}
		let tracker = Tracker::builder(config).build().await?;
		self.insert(tracker).await
	}

	/// Registers an already-built tracker under its namespace.
	///
	/// On a duplicate namespace the given tracker is shut down before the
	/// error is returned.
	pub async fn insert(&self, tracker: Tracker) -> Result<Arc<Tracker>> {
		let namespace = tracker.namespace().to_string();
		let mut trackers = self.trackers.write().await;
		if trackers.contains_key(&namespace) {
			drop(trackers);
			if let Err(e) = tracker.shutdown().await {
				warn!(namespace = %namespace, error = %e, "failed to shut down rejected tracker");
			}
			return Err(TrackerError::NamespaceExists(namespace));
		}
		let tracker = Arc::new(tracker);
		trackers.insert(namespace.clone(), Arc::clone(&tracker));
		info!(namespace = %namespace, "Tracker registered");
		Ok(tracker)
	}

	pub async fn get(&self, namespace: &str) -> Option<Arc<Tracker>> {
		self.trackers.read().await.get(namespace).cloned()
	}

	pub async fn contains(&self, namespace: &str) -> bool {
		self.trackers.read().await.contains_key(namespace)
	}

	/// Shuts down and forgets the tracker for `namespace`.
	///
	/// Returns `false` if no such tracker was registered.
	pub async fn remove(&self, namespace: &str) -> Result<bool> {
		let removed = self.trackers.write().await.remove(namespace);
		match removed {
			Some(tracker) => {
				tracker.shutdown().await?;
				info!(namespace, "Tracker removed");
				Ok(true)
			}
			None => Ok(false),
		}
	}

	/// Registered namespaces in sorted order.
	pub async fn namespaces(&self) -> Vec<String> {
		let mut namespaces: Vec<String> = self.trackers.read().await.keys().cloned().collect();
		namespaces.sort();
		namespaces
	}

	/// Shuts down every tracker. Failures are logged and do not stop the rest.
	pub async fn shutdown_all(&self) {
		let trackers: Vec<Arc<Tracker>> = self.trackers.write().await.drain().map(|(_, t)| t).collect();
		for tracker in trackers {
			if let Err(e) = tracker.shutdown().await {
				warn!(namespace = %tracker.namespace(), error = %e, "tracker shutdown failed");
			}
		}
	}
}
