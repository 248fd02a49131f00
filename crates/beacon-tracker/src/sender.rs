// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transmission of batches to the collector.

use std::time::Duration;

use async_trait::async_trait;
use beacon_common_http::{is_retryable_status, RetryableError};
use beacon_config::{EmitterConfig, HttpMethod};
use beacon_core::EventId;
use chrono::Utc;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::store::Batch;
use crate::wire::{WireEncoder, GET_PATH, POST_PATH};

/// Why a delivery attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
	/// Connection-level failure before a response arrived.
	#[error("transport error: {0}")]
	Transport(String),

	#[error("request timed out")]
	Timeout,

	/// Collector answered 429.
	#[error("rate limited, retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	/// Collector answered with any other non-2xx status.
	#[error("collector returned {status}: {body}")]
	Status { status: u16, body: String },

	/// The event could not be encoded; retrying will not help.
	#[error("serialization error: {0}")]
	Serialization(String),

	/// The request itself is invalid, such as a malformed collector URL.
	#[error("invalid request: {0}")]
	Request(String),
}

impl SendError {
	/// Minimum wait requested by the collector, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			SendError::RateLimited {
				retry_after_secs: Some(secs),
			} => Some(Duration::from_secs(*secs)),
			_ => None,
		}
	}
}

impl RetryableError for SendError {
	fn is_retryable(&self) -> bool {
		match self {
			SendError::Transport(_) | SendError::Timeout | SendError::RateLimited { .. } => true,
			SendError::Status { status, .. } => is_retryable_status(*status),
			SendError::Serialization(_) | SendError::Request(_) => false,
		}
	}
}

impl From<reqwest::Error> for SendError {
	fn from(e: reqwest::Error) -> Self {
		if e.is_timeout() {
			SendError::Timeout
		} else if e.is_retryable() {
			SendError::Transport(e.to_string())
		} else {
			SendError::Request(e.to_string())
		}
	}
}

/// Per-event result of one delivery attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOutcome {
	pub results: Vec<(EventId, Result<(), SendError>)>,
}

impl SendOutcome {
	/// Every event in the batch was accepted.
	pub fn delivered(batch: &Batch) -> Self {
		Self {
			results: batch.events.iter().map(|e| (e.id, Ok(()))).collect(),
		}
	}

	/// Every event in the batch failed with `error`.
	pub fn failed(batch: &Batch, error: SendError) -> Self {
		Self {
			results: batch
				.events
				.iter()
				.map(|e| (e.id, Err(error.clone())))
				.collect(),
		}
	}

	pub fn delivered_count(&self) -> usize {
		self.results.iter().filter(|(_, r)| r.is_ok()).count()
	}

	pub fn is_success(&self) -> bool {
		self.results.iter().all(|(_, r)| r.is_ok())
	}
}

/// Performs delivery attempts. Implementations never touch the store.
///
/// An `Err` fails the whole batch; per-event failures go in the outcome.
#[async_trait]
pub trait NetworkSender: Send + Sync {
	async fn send(&self, batch: &Batch) -> Result<SendOutcome, SendError>;
}

/// Sends batches to a collector over HTTP.
///
/// POST carries the whole batch in one `payload_data` request; GET issues one
/// request per event with the fields as query parameters.
pub struct HttpSender {
	client: Client,
	collector_url: String,
	method: HttpMethod,
	encoder: WireEncoder,
}

impl HttpSender {
	pub fn new(config: &EmitterConfig) -> Result<Self, TrackerError> {
		let client = beacon_common_http::new_client_with_timeout(config.request_timeout)
			.map_err(TrackerError::HttpClient)?;
		Ok(Self::with_client(client, config))
	}

	pub fn with_client(client: Client, config: &EmitterConfig) -> Self {
		Self {
			client,
			collector_url: config.collector_url(),
			method: config.method,
			encoder: WireEncoder::new(config.encode_base64),
		}
	}

	pub fn collector_url(&self) -> &str {
		&self.collector_url
	}

	async fn post(&self, batch: &Batch) -> Result<SendOutcome, SendError> {
		let url = format!("{}{}", self.collector_url, POST_PATH);
		let body = self.encoder.post_body(&batch.events, Utc::now())?;

		debug!(url = %url, batch_id = %batch.id, count = batch.len(), "sending batch");
		let response = self.client.post(&url).json(&body).send().await?;
		check_response(response).await?;
		Ok(SendOutcome::delivered(batch))
	}

	async fn get(&self, batch: &Batch) -> SendOutcome {
		let url = format!("{}{}", self.collector_url, GET_PATH);
		let mut results = Vec::with_capacity(batch.len());

		for event in &batch.events {
			let result = match self.encoder.query_pairs(event, Utc::now()) {
				Ok(query) => match self.client.get(&url).query(&query).send().await {
					Ok(response) => check_response(response).await,
					Err(e) => Err(e.into()),
				},
				Err(e) => Err(e),
			};
			if let Err(e) = &result {
				debug!(event_id = %event.id, error = %e, "event request failed");
			}
			results.push((event.id, result));
		}

		SendOutcome { results }
	}
}

async fn check_response(response: reqwest::Response) -> Result<(), SendError> {
	let status = response.status();
	if status.is_success() {
		return Ok(());
	}

	if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
		let retry_after = response
			.headers()
			.get(reqwest::header::RETRY_AFTER)
			.and_then(|v| v.to_str().ok())
			.and_then(|s| s.trim().parse().ok());
		warn!(retry_after_secs = ?retry_after, "collector rate limited request");
		return Err(SendError::RateLimited {
			retry_after_secs: retry_after,
		});
	}

	let body = response.text().await.unwrap_or_default();
	Err(SendError::Status {
		status: status.as_u16(),
		body,
	})
}

#[async_trait]
impl NetworkSender for HttpSender {
	async fn send(&self, batch: &Batch) -> Result<SendOutcome, SendError> {
		match self.method {
			HttpMethod::Post => self.post(batch).await,
			HttpMethod::Get => Ok(self.get(batch).await),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::BatchId;
	use beacon_config::Protocol;
	use beacon_core::{Event, EventKind, NewEvent};
	use serde_json::{json, Value};
	use wiremock::matchers::{method, path, query_param};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn batch(n: u64) -> Batch {
		let events = (1..=n)
			.map(|i| {
				let Value::Object(payload) = json!({"e": "se", "se_ca": "shop", "se_ac": format!("a{i}")})
				else {
					unreachable!()
				};
				Event::from_new(EventId(i), NewEvent::new(EventKind::Structured, payload, vec![]))
			})
			.collect();
		Batch {
			id: BatchId::new(),
			events,
		}
	}

	fn sender(server: &MockServer, method: HttpMethod) -> HttpSender {
		let config = EmitterConfig {
			endpoint: server.uri(),
			method,
			protocol: Protocol::Http,
			encode_base64: false,
			request_timeout: Duration::from_secs(5),
		};
		HttpSender::new(&config).unwrap()
	}

	#[test]
	fn retryable_classification() {
		assert!(SendError::Timeout.is_retryable());
		assert!(SendError::Transport("reset".into()).is_retryable());
		assert!(SendError::RateLimited {
			retry_after_secs: None
		}
		.is_retryable());
		for status in [408, 429, 500, 503] {
			let err = SendError::Status {
				status,
				body: String::new(),
			};
			assert!(err.is_retryable(), "status {status} should be retryable");
		}
		for status in [400, 401, 404, 422] {
			let err = SendError::Status {
				status,
				body: String::new(),
			};
			assert!(!err.is_retryable(), "status {status} should not be retryable");
		}
		assert!(!SendError::Serialization("bad".into()).is_retryable());
		assert!(!SendError::Request("bad url".into()).is_retryable());
	}

	#[tokio::test]
	async fn unreachable_collector_is_transient() {
		let config = EmitterConfig {
			endpoint: "127.0.0.1:1".into(),
			method: HttpMethod::Post,
			protocol: Protocol::Http,
			encode_base64: false,
			request_timeout: Duration::from_secs(5),
		};
		let err = HttpSender::new(&config)
			.unwrap()
			.send(&batch(1))
			.await
			.unwrap_err();
		assert!(matches!(err, SendError::Transport(_)), "got {err:?}");
		assert!(err.is_retryable());
	}

	#[tokio::test]
	async fn malformed_collector_url_is_permanent() {
		let config = EmitterConfig {
			endpoint: "exa mple.com".into(),
			method: HttpMethod::Post,
			protocol: Protocol::Http,
			encode_base64: false,
			request_timeout: Duration::from_secs(5),
		};
		let err = HttpSender::new(&config)
			.unwrap()
			.send(&batch(1))
			.await
			.unwrap_err();
		assert!(matches!(err, SendError::Request(_)), "got {err:?}");
		assert!(!err.is_retryable());
	}

	#[tokio::test]
	async fn post_sends_one_request_per_batch() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(POST_PATH))
			.respond_with(ResponseTemplate::new(200))
			.expect(1)
			.mount(&server)
			.await;

		let outcome = sender(&server, HttpMethod::Post)
			.send(&batch(3))
			.await
			.unwrap();
		assert_eq!(outcome.delivered_count(), 3);

		let requests = server.received_requests().await.unwrap();
		let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
		assert_eq!(body["schema"], beacon_core::schema::PAYLOAD_DATA);
		assert_eq!(body["data"].as_array().unwrap().len(), 3);
		assert_eq!(body["data"][2]["se_ac"], "a3");
		assert!(body["data"][0]["stm"].is_string());
	}

	#[tokio::test]
	async fn get_sends_one_request_per_event() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(GET_PATH))
			.and(query_param("e", "se"))
			.respond_with(ResponseTemplate::new(200))
			.expect(3)
			.mount(&server)
			.await;

		let outcome = sender(&server, HttpMethod::Get)
			.send(&batch(3))
			.await
			.unwrap();
		assert!(outcome.is_success());
		assert_eq!(outcome.results.len(), 3);
	}

	#[tokio::test]
	async fn get_reports_each_event_separately() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(query_param("se_ac", "a2"))
			.respond_with(ResponseTemplate::new(400).set_body_string("bad event"))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.respond_with(ResponseTemplate::new(200))
			.mount(&server)
			.await;

		let outcome = sender(&server, HttpMethod::Get)
			.send(&batch(3))
			.await
			.unwrap();
		assert_eq!(outcome.delivered_count(), 2);
		assert_eq!(
			outcome.results[1],
			(
				EventId(2),
				Err(SendError::Status {
					status: 400,
					body: "bad event".into()
				})
			)
		);
	}

	#[tokio::test]
	async fn rate_limit_reads_retry_after() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
			.mount(&server)
			.await;

		let err = sender(&server, HttpMethod::Post)
			.send(&batch(1))
			.await
			.unwrap_err();
		assert_eq!(
			err,
			SendError::RateLimited {
				retry_after_secs: Some(30)
			}
		);
		assert_eq!(err.retry_after(), Some(Duration::from_secs(30)));
	}

	#[tokio::test]
	async fn server_error_is_transient() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;

		let err = sender(&server, HttpMethod::Post)
			.send(&batch(2))
			.await
			.unwrap_err();
		assert!(matches!(err, SendError::Status { status: 503, .. }));
		assert!(err.is_retryable());
	}

	#[tokio::test]
	async fn slow_collector_times_out() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
			.mount(&server)
			.await;

		let config = EmitterConfig {
			endpoint: server.uri(),
			method: HttpMethod::Post,
			protocol: Protocol::Http,
			encode_base64: false,
			request_timeout: Duration::from_millis(100),
		};
		let err = HttpSender::new(&config)
			.unwrap()
			.send(&batch(1))
			.await
			.unwrap_err();
		assert_eq!(err, SendError::Timeout);
	}

	#[test]
	fn collector_url_uses_configured_protocol() {
		let config = EmitterConfig {
			endpoint: "collector.example.com".into(),
			method: HttpMethod::Post,
			protocol: Protocol::Https,
			encode_base64: false,
			request_timeout: Duration::from_secs(5),
		};
		let sender = HttpSender::new(&config).unwrap();
		assert_eq!(sender.collector_url(), "https://collector.example.com");
	}
}
