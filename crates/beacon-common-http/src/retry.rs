// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Exponential backoff settings and transient-failure classification.

use std::time::Duration;

/// Errors that know whether another attempt could succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => is_retryable_status(status.as_u16()),
			None => self.is_request() || self.is_body(),
		}
	}
}

/// Status codes worth retrying: request timeout, rate limiting and any 5xx.
pub fn is_retryable_status(status: u16) -> bool {
	matches!(status, 408 | 429) || (500..=599).contains(&status)
}

/// Backoff policy shared by Beacon clients.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
	/// Total attempts allowed, including the first.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	/// Randomise each delay into `[delay / 2, delay]`.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 5,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Delay to wait after the `attempt`-th failure (1-based).
	pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
		let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
		let scaled = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
		let capped = if scaled.is_finite() {
			scaled.min(self.max_delay.as_secs_f64())
		} else {
			self.max_delay.as_secs_f64()
		};
		let delay = Duration::from_secs_f64(capped.max(0.0));

		if self.jitter && !delay.is_zero() {
			let half = delay / 2;
			half + half.mul_f64(fastrand::f64())
		} else {
			delay
		}
	}

	/// True once `attempts` failures have used up the budget.
	pub fn is_exhausted(&self, attempts: u32) -> bool {
		attempts >= self.max_attempts
	}
}
