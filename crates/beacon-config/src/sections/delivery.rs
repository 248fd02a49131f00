// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery section: batch size and flush triggers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10_000;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeliveryConfigLayer {
	pub batch_size: Option<usize>,
	pub flush_interval_ms: Option<u64>,
	pub flush_threshold: Option<usize>,
	pub shutdown_timeout_ms: Option<u64>,
}

impl DeliveryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.flush_interval_ms.is_some() {
			self.flush_interval_ms = other.flush_interval_ms;
		}
		if other.flush_threshold.is_some() {
			self.flush_threshold = other.flush_threshold;
		}
		if other.shutdown_timeout_ms.is_some() {
			self.shutdown_timeout_ms = other.shutdown_timeout_ms;
		}
	}

	pub fn finalize(self) -> DeliveryConfig {
		let batch_size = self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
		DeliveryConfig {
			batch_size,
			flush_interval: Duration::from_millis(
				self.flush_interval_ms.unwrap_or(DEFAULT_FLUSH_INTERVAL_MS),
			),
			// A full batch triggers a burst flush unless told otherwise.
			flush_threshold: self.flush_threshold.unwrap_or(batch_size),
			shutdown_timeout: Duration::from_millis(
				self.shutdown_timeout_ms.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS),
			),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
	/// Maximum events per POST request.
	pub batch_size: usize,
	pub flush_interval: Duration,
	/// Pending count at which an enqueue wakes the scheduler early.
	pub flush_threshold: usize,
	/// Bound on the final flush during shutdown.
	pub shutdown_timeout: Duration,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		DeliveryConfigLayer::default().finalize()
	}
}
