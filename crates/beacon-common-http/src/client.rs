// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP client with consistent User-Agent header.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

const CLIENT_NAME: &str = "beacon-tracker";

/// Creates a new HTTP client builder with the standard Beacon User-Agent header.
///
/// Use this when you need to customize the client (e.g., set timeout).
///
/// # Example
/// ```ignore
/// let client = beacon_common_http::builder()
///     .timeout(Duration::from_secs(30))
///     .build()?;
/// ```
pub fn builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Creates a new HTTP client with a request timeout and the standard User-Agent.
pub fn new_client_with_timeout(timeout: Duration) -> reqwest::Result<Client> {
	tracing::debug!(timeout_ms = timeout.as_millis() as u64, "building http client");
	builder().timeout(timeout).build()
}

/// Returns the standard Beacon User-Agent string.
///
/// Format: `beacon-tracker/{version} ({os}-{arch})`
pub fn user_agent() -> String {
	format!(
		"{}/{} ({}-{})",
		CLIENT_NAME,
		env!("CARGO_PKG_VERSION"),
		std::env::consts::OS,
		std::env::consts::ARCH
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_has_correct_format() {
		let ua = user_agent();
		assert!(ua.starts_with("beacon-tracker/"));
		assert!(ua.contains(std::env::consts::OS));
	}

	#[test]
	fn client_with_timeout_builds() {
		assert!(new_client_with_timeout(Duration::from_secs(5)).is_ok());
	}
}
