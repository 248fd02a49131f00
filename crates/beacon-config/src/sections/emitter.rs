// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Emitter section: where and how events are sent.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
	Get,
	#[default]
	Post,
}

impl std::str::FromStr for HttpMethod {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"get" => Ok(HttpMethod::Get),
			"post" => Ok(HttpMethod::Post),
			_ => Err(ConfigError::InvalidValue {
				key: "method".to_string(),
				message: format!("expected 'get' or 'post', got '{s}'"),
			}),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
	Http,
	#[default]
	Https,
}

impl Protocol {
	pub fn scheme(&self) -> &'static str {
		match self {
			Protocol::Http => "http",
			Protocol::Https => "https",
		}
	}
}

impl std::str::FromStr for Protocol {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"http" => Ok(Protocol::Http),
			"https" => Ok(Protocol::Https),
			_ => Err(ConfigError::InvalidValue {
				key: "protocol".to_string(),
				message: format!("expected 'http' or 'https', got '{s}'"),
			}),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmitterConfigLayer {
	pub endpoint: Option<String>,
	pub method: Option<HttpMethod>,
	pub protocol: Option<Protocol>,
	pub encode_base64: Option<bool>,
	pub request_timeout_ms: Option<u64>,
}

impl EmitterConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.method.is_some() {
			self.method = other.method;
		}
		if other.protocol.is_some() {
			self.protocol = other.protocol;
		}
		if other.encode_base64.is_some() {
			self.encode_base64 = other.encode_base64;
		}
		if other.request_timeout_ms.is_some() {
			self.request_timeout_ms = other.request_timeout_ms;
		}
	}

	pub fn finalize(self) -> Result<EmitterConfig, ConfigError> {
		Ok(EmitterConfig {
			endpoint: self.endpoint.ok_or(ConfigError::Missing("endpoint"))?,
			method: self.method.unwrap_or_default(),
			protocol: self.protocol.unwrap_or_default(),
			encode_base64: self.encode_base64.unwrap_or(false),
			request_timeout: Duration::from_millis(
				self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
			),
		})
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmitterConfig {
	/// Collector host, optionally with a path. Any scheme given here is
	/// replaced by `protocol`.
	pub endpoint: String,
	pub method: HttpMethod,
	pub protocol: Protocol,
	pub encode_base64: bool,
	pub request_timeout: Duration,
}

impl EmitterConfig {
	/// Collector base URL with the configured scheme and no trailing slash.
	pub fn collector_url(&self) -> String {
		let host = self
			.endpoint
			.split_once("://")
			.map_or(self.endpoint.as_str(), |(_, rest)| rest)
			.trim_end_matches('/');
		format!("{}://{}", self.protocol.scheme(), host)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn emitter(endpoint: &str, protocol: Protocol) -> EmitterConfig {
		EmitterConfigLayer {
			endpoint: Some(endpoint.to_string()),
			protocol: Some(protocol),
			..Default::default()
		}
		.finalize()
		.unwrap()
	}

	#[test]
	fn defaults_to_https_post_without_base64() {
		let config = emitter("collector.example.com", Protocol::Https);
		assert_eq!(config.method, HttpMethod::Post);
		assert!(!config.encode_base64);
		assert_eq!(config.request_timeout, Duration::from_secs(30));
	}

	#[test]
	fn collector_url_applies_protocol() {
		assert_eq!(
			emitter("collector.example.com/", Protocol::Http).collector_url(),
			"http://collector.example.com"
		);
		assert_eq!(
			emitter("http://collector.example.com", Protocol::Https).collector_url(),
			"https://collector.example.com"
		);
	}

	#[test]
	fn method_parse_is_case_insensitive() {
		assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
		assert_eq!("Post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
		assert!("put".parse::<HttpMethod>().is_err());
	}

	#[test]
	fn protocol_parse_rejects_unknown() {
		assert_eq!("HTTP".parse::<Protocol>().unwrap(), Protocol::Http);
		assert!("ftp".parse::<Protocol>().is_err());
	}

	#[test]
	fn missing_endpoint_is_an_error() {
		let err = EmitterConfigLayer::default().finalize().unwrap_err();
		assert!(matches!(err, ConfigError::Missing("endpoint")));
	}
}
