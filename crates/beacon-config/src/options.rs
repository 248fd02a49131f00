// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker options as passed by host bindings at initialisation.
//!
//! The binding hands over a JSON object with camelCase keys. `endpoint`,
//! `namespace` and `appId` are required; everything else falls back to the
//! same defaults as the layered loader. Unknown keys are ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::layer::TrackerConfigLayer;
use crate::sections::{
	DeliveryConfigLayer, EmitterConfigLayer, IdentityConfigLayer, QueueOverflowPolicy,
	RetryConfigLayer, StoreConfigLayer,
};
use crate::TrackerConfig;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackerOptions {
	endpoint: Option<String>,
	namespace: Option<String>,
	app_id: Option<String>,
	platform: Option<String>,
	method: Option<String>,
	protocol: Option<String>,
	set_base64_encoded: Option<bool>,
	request_timeout_ms: Option<u64>,
	batch_size: Option<usize>,
	flush_interval_ms: Option<u64>,
	flush_threshold: Option<usize>,
	shutdown_timeout_ms: Option<u64>,
	store_capacity: Option<usize>,
	overflow_policy: Option<QueueOverflowPolicy>,
	database_path: Option<String>,
	max_attempts: Option<u32>,
	backoff_base_ms: Option<u64>,
	backoff_cap_ms: Option<u64>,
}

fn required(value: Option<String>, key: &'static str) -> Result<String, ConfigError> {
	match value {
		Some(v) if !v.trim().is_empty() => Ok(v),
		_ => Err(ConfigError::Missing(key)),
	}
}

impl TrackerOptions {
	fn into_layer(self) -> Result<TrackerConfigLayer, ConfigError> {
		let namespace = required(self.namespace, "namespace")?;
		let app_id = required(self.app_id, "appId")?;
		let endpoint = required(self.endpoint, "endpoint")?;

		Ok(TrackerConfigLayer {
			tracker: Some(IdentityConfigLayer {
				namespace: Some(namespace),
				app_id: Some(app_id),
				platform: self.platform,
			}),
			emitter: Some(EmitterConfigLayer {
				endpoint: Some(endpoint),
				method: self.method.as_deref().map(str::parse).transpose()?,
				protocol: self.protocol.as_deref().map(str::parse).transpose()?,
				encode_base64: self.set_base64_encoded,
				request_timeout_ms: self.request_timeout_ms,
			}),
			delivery: Some(DeliveryConfigLayer {
				batch_size: self.batch_size,
				flush_interval_ms: self.flush_interval_ms,
				flush_threshold: self.flush_threshold,
				shutdown_timeout_ms: self.shutdown_timeout_ms,
			}),
			store: Some(StoreConfigLayer {
				capacity: self.store_capacity,
				overflow_policy: self.overflow_policy,
				database_path: self.database_path.map(Into::into),
			}),
			retry: Some(RetryConfigLayer {
				max_attempts: self.max_attempts,
				backoff_base_ms: self.backoff_base_ms,
				backoff_cap_ms: self.backoff_cap_ms,
				jitter: None,
			}),
			logging: None,
		})
	}
}

impl TrackerConfig {
	/// Builds a validated configuration from a binding's option map.
	pub fn from_options(options: &Value) -> Result<Self, ConfigError> {
		if !options.is_object() {
			return Err(ConfigError::Options(format!(
				"expected an object, got {}",
				json_type(options)
			)));
		}
		let options = TrackerOptions::deserialize(options)
			.map_err(|e| ConfigError::Options(e.to_string()))?;
		crate::finalize(options.into_layer()?)
	}
}

fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sections::{HttpMethod, Protocol};
	use serde_json::json;

	#[test]
	fn minimal_options_use_defaults() {
		let config = TrackerConfig::from_options(&json!({
			"endpoint": "collector.example.com",
			"namespace": "main",
			"appId": "shop",
		}))
		.unwrap();

		assert_eq!(config.identity.namespace, "main");
		assert_eq!(config.identity.app_id, "shop");
		assert_eq!(config.emitter.method, HttpMethod::Post);
		assert_eq!(config.emitter.protocol, Protocol::Https);
		assert!(!config.emitter.encode_base64);
		assert_eq!(config.delivery.batch_size, 10);
	}

	#[test]
	fn binding_keys_are_honoured() {
		let config = TrackerConfig::from_options(&json!({
			"endpoint": "collector.example.com",
			"namespace": "main",
			"appId": "shop",
			"method": "get",
			"protocol": "http",
			"setBase64Encoded": true,
			"batchSize": 5,
			"storeCapacity": 50,
			"overflowPolicy": "drop_newest",
			"sessionContext": true,
		}))
		.unwrap();

		assert_eq!(config.emitter.method, HttpMethod::Get);
		assert_eq!(config.emitter.collector_url(), "http://collector.example.com");
		assert!(config.emitter.encode_base64);
		assert_eq!(config.delivery.batch_size, 5);
		assert_eq!(config.store.capacity, 50);
		assert_eq!(config.store.overflow_policy, QueueOverflowPolicy::DropNewest);
	}

	#[test]
	fn each_required_key_is_checked() {
		for (missing, options) in [
			("endpoint", json!({"namespace": "main", "appId": "shop"})),
			("namespace", json!({"endpoint": "c.example.com", "appId": "shop"})),
			("appId", json!({"endpoint": "c.example.com", "namespace": "main"})),
		] {
			match TrackerConfig::from_options(&options) {
				Err(ConfigError::Missing(key)) => assert_eq!(key, missing),
				other => panic!("expected Missing({missing}), got {other:?}"),
			}
		}
	}

	#[test]
	fn blank_required_value_counts_as_missing() {
		let err = TrackerConfig::from_options(&json!({
			"endpoint": "",
			"namespace": "main",
			"appId": "shop",
		}))
		.unwrap_err();
		assert!(matches!(err, ConfigError::Missing("endpoint")));
	}

	#[test]
	fn unknown_method_is_rejected() {
		let err = TrackerConfig::from_options(&json!({
			"endpoint": "collector.example.com",
			"namespace": "main",
			"appId": "shop",
			"method": "put",
		}))
		.unwrap_err();
		assert!(matches!(err, ConfigError::InvalidValue { .. }));
	}

	#[test]
	fn non_object_options_are_rejected() {
		let err = TrackerConfig::from_options(&json!(["main"])).unwrap_err();
		assert!(matches!(err, ConfigError::Options(_)));
	}

	#[test]
	fn wrongly_typed_option_is_rejected() {
		let err = TrackerConfig::from_options(&json!({
			"endpoint": "collector.example.com",
			"namespace": "main",
			"appId": "shop",
			"batchSize": "ten",
		}))
		.unwrap_err();
		assert!(matches!(err, ConfigError::Options(_)));
	}
}
