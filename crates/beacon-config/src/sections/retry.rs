// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry section, resolved into the shared [`RetryConfig`].

use std::time::Duration;

use beacon_common_http::RetryConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetryConfigLayer {
	pub max_attempts: Option<u32>,
	pub backoff_base_ms: Option<u64>,
	pub backoff_cap_ms: Option<u64>,
	pub jitter: Option<bool>,
}

impl RetryConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
		if other.backoff_base_ms.is_some() {
			self.backoff_base_ms = other.backoff_base_ms;
		}
		if other.backoff_cap_ms.is_some() {
			self.backoff_cap_ms = other.backoff_cap_ms;
		}
		if other.jitter.is_some() {
			self.jitter = other.jitter;
		}
	}

	pub fn finalize(self) -> RetryConfig {
		let defaults = RetryConfig::default();
		RetryConfig {
			max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
			base_delay: self
				.backoff_base_ms
				.map_or(defaults.base_delay, Duration::from_millis),
			max_delay: self
				.backoff_cap_ms
				.map_or(defaults.max_delay, Duration::from_millis),
			backoff_factor: defaults.backoff_factor,
			jitter: self.jitter.unwrap_or(defaults.jitter),
		}
	}
}
