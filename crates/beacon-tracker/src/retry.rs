// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! What happens to an event after a failed delivery attempt.

use beacon_common_http::{RetryConfig, RetryableError};
use beacon_core::Event;
use chrono::{DateTime, Utc};

use crate::sender::SendError;

/// Why an event was given up on.
#[derive(Debug, Clone, PartialEq)]
pub enum AbandonReason {
	/// The collector rejected the event; retrying will not change that.
	Permanent(SendError),
	/// Transient failures used up the attempt budget.
	Exhausted { attempts: u32, last_error: SendError },
}

impl std::fmt::Display for AbandonReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			AbandonReason::Permanent(e) => write!(f, "permanent failure: {e}"),
			AbandonReason::Exhausted {
				attempts,
				last_error,
			} => write!(f, "gave up after {attempts} attempts: {last_error}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
	/// Return to pending, eligible again from `not_before`.
	Retry { not_before: DateTime<Utc> },
	Abandon(AbandonReason),
}

/// Turns a failed attempt into a retry-or-abandon decision.
///
/// Backoff is expressed as the event's next eligibility instant; nothing
/// sleeps on behalf of a failed event.
#[derive(Debug, Clone)]
pub struct RetryController {
	config: RetryConfig,
}

impl RetryController {
	pub fn new(config: RetryConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &RetryConfig {
		&self.config
	}

	pub fn decide(&self, event: &Event, error: &SendError, now: DateTime<Utc>) -> RetryDecision {
		if !error.is_retryable() {
			return RetryDecision::Abandon(AbandonReason::Permanent(error.clone()));
		}

		let attempts = event.attempts.saturating_add(1);
		if self.config.is_exhausted(attempts) {
			return RetryDecision::Abandon(AbandonReason::Exhausted {
				attempts,
				last_error: error.clone(),
			});
		}

		let mut delay = self.config.delay_for_attempt(attempts);
		if let Some(requested) = error.retry_after() {
			delay = delay.max(requested);
		}
		let delay = chrono::Duration::milliseconds(delay.as_millis().min(i64::MAX as u128) as i64);

		RetryDecision::Retry {
			not_before: now.checked_add_signed(delay).unwrap_or(now),
		}
	}
}
