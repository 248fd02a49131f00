// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Event store section: capacity, overflow policy and durability.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: usize = 1000;

/// What `enqueue` does when the store is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueOverflowPolicy {
	/// Reject the new event.
	DropNewest,
	/// Evict the oldest pending event. If every stored event is in flight
	/// the new event is rejected instead.
	#[default]
	DropOldest,
	/// Wait until delivery frees space.
	Block,
}

impl std::str::FromStr for QueueOverflowPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"drop_newest" => Ok(QueueOverflowPolicy::DropNewest),
			"drop_oldest" => Ok(QueueOverflowPolicy::DropOldest),
			"block" => Ok(QueueOverflowPolicy::Block),
			_ => Err(format!("unknown overflow policy: {s}")),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreConfigLayer {
	pub capacity: Option<usize>,
	pub overflow_policy: Option<QueueOverflowPolicy>,
	pub database_path: Option<PathBuf>,
}

impl StoreConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.capacity.is_some() {
			self.capacity = other.capacity;
		}
		if other.overflow_policy.is_some() {
			self.overflow_policy = other.overflow_policy;
		}
		if other.database_path.is_some() {
			self.database_path = other.database_path;
		}
	}

	pub fn finalize(self) -> StoreConfig {
		StoreConfig {
			capacity: self.capacity.unwrap_or(DEFAULT_CAPACITY),
			overflow_policy: self.overflow_policy.unwrap_or_default(),
			database_path: self.database_path,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
	pub capacity: usize,
	pub overflow_policy: QueueOverflowPolicy,
	/// SQLite file for a durable store; in-memory when unset.
	pub database_path: Option<PathBuf>,
}

impl StoreConfig {
	pub fn is_durable(&self) -> bool {
		self.database_path.is_some()
	}
}

impl Default for StoreConfig {
	fn default() -> Self {
		StoreConfigLayer::default().finalize()
	}
}
