// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for Beacon trackers.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Parsing of the option map handed over by host bindings
//! - Cross-field validation before any tracker is built
//! - Tracing subscriber setup driven by the logging section
//!
//! # Usage
//!
//! ```ignore
//! use beacon_config::load_config;
//!
//! let config = load_config()?;
//! println!("Sending {} events per batch to {}", config.delivery.batch_size, config.emitter.collector_url());
//! ```

pub mod error;
pub mod layer;
pub mod logging;
pub mod options;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::TrackerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

pub use beacon_common_http::RetryConfig;

use tracing::{debug, info};

/// Fully resolved tracker configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
	pub identity: IdentityConfig,
	pub emitter: EmitterConfig,
	pub delivery: DeliveryConfig,
	pub store: StoreConfig,
	pub retry: RetryConfig,
	pub logging: LoggingConfig,
}

impl TrackerConfig {
	/// Configuration with defaults for everything but the three required settings.
	pub fn new(
		namespace: impl Into<String>,
		app_id: impl Into<String>,
		endpoint: impl Into<String>,
	) -> Self {
		Self {
			identity: IdentityConfig {
				namespace: namespace.into(),
				app_id: app_id.into(),
				platform: DEFAULT_PLATFORM.to_string(),
			},
			emitter: EmitterConfig {
				endpoint: endpoint.into(),
				method: HttpMethod::default(),
				protocol: Protocol::default(),
				encode_base64: false,
				request_timeout: std::time::Duration::from_secs(30),
			},
			delivery: DeliveryConfig::default(),
			store: StoreConfig::default(),
			retry: RetryConfig::default(),
			logging: LoggingConfig::default(),
		}
	}

	pub fn namespace(&self) -> &str {
		&self.identity.namespace
	}

	/// Checks cross-field rules that no single section can enforce.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.identity.namespace.trim().is_empty() {
			return Err(ConfigError::Validation("namespace must not be empty".into()));
		}
		if self.identity.app_id.trim().is_empty() {
			return Err(ConfigError::Validation("app_id must not be empty".into()));
		}
		if self.emitter.endpoint.trim().is_empty() {
			return Err(ConfigError::Validation("endpoint must not be empty".into()));
		}
		if self.delivery.batch_size == 0 {
			return Err(ConfigError::Validation("batch_size must be at least 1".into()));
		}
		if self.delivery.flush_threshold == 0 {
			return Err(ConfigError::Validation(
				"flush_threshold must be at least 1".into(),
			));
		}
		if self.delivery.flush_interval.is_zero() {
			return Err(ConfigError::Validation(
				"flush_interval must be greater than zero".into(),
			));
		}
		if self.store.capacity < self.delivery.batch_size {
			return Err(ConfigError::Validation(format!(
				"store capacity ({}) must be at least batch_size ({})",
				self.store.capacity, self.delivery.batch_size
			)));
		}
		if self.retry.max_attempts == 0 {
			return Err(ConfigError::Validation(
				"retry max_attempts must be at least 1".into(),
			));
		}
		if self.retry.base_delay > self.retry.max_delay {
			return Err(ConfigError::Validation(
				"retry backoff base must not exceed the cap".into(),
			));
		}
		Ok(())
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`BEACON_TRACKER_*`)
/// 2. User config file (`~/.config/beacon/tracker.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<TrackerConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource)];
	if let Some(user) = TomlSource::user() {
		sources.push(Box::new(user));
	}
	sources.push(Box::new(EnvSource::new()));
	load_from_sources(sources)
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<TrackerConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource::new())])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<TrackerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merges `sources` in precedence order and resolves the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<TrackerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = TrackerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: TrackerConfigLayer) -> Result<TrackerConfig, ConfigError> {
	let identity = layer.tracker.unwrap_or_default().finalize()?;
	let emitter = layer.emitter.unwrap_or_default().finalize()?;
	let delivery = layer.delivery.unwrap_or_default().finalize();
	let store = layer.store.unwrap_or_default().finalize();
	let retry = layer.retry.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	let config = TrackerConfig {
		identity,
		emitter,
		delivery,
		store,
		retry,
		logging,
	};
	config.validate()?;

	info!(
		namespace = %config.identity.namespace,
		collector = %config.emitter.collector_url(),
		method = ?config.emitter.method,
		batch_size = config.delivery.batch_size,
		capacity = config.store.capacity,
		durable = config.store.is_durable(),
		max_attempts = config.retry.max_attempts,
		"Tracker configuration loaded"
	);

	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;
	use std::time::Duration;

	fn env(vars: &[(&str, &str)]) -> Box<dyn ConfigSource> {
		let map: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		Box::new(EnvSource::with_lookup(move |name| map.get(name).cloned()))
	}

	#[test]
	fn new_config_is_valid() {
		let config = TrackerConfig::new("main", "shop", "collector.example.com");
		config.validate().unwrap();
		assert_eq!(config.namespace(), "main");
		assert_eq!(config.delivery.flush_threshold, config.delivery.batch_size);
	}

	#[test]
	fn env_overrides_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			r#"
[tracker]
namespace = "from-file"
app_id = "shop"

[emitter]
endpoint = "collector.example.com"

[delivery]
batch_size = 20
"#
		)
		.unwrap();

		let config = load_from_sources(vec![
			env(&[("BEACON_TRACKER_NAMESPACE", "from-env")]),
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.identity.namespace, "from-env");
		assert_eq!(config.identity.app_id, "shop");
		assert_eq!(config.delivery.batch_size, 20);
		assert_eq!(config.delivery.flush_threshold, 20);
	}

	#[test]
	fn missing_required_setting_fails() {
		let err = load_from_sources(vec![
			Box::new(DefaultsSource),
			env(&[("BEACON_TRACKER_NAMESPACE", "main")]),
		])
		.unwrap_err();
		assert!(matches!(err, ConfigError::Missing("app_id")));
	}

	#[test]
	fn capacity_below_batch_size_is_rejected() {
		let mut config = TrackerConfig::new("main", "shop", "collector.example.com");
		config.store.capacity = 5;
		assert!(matches!(
			config.validate(),
			Err(ConfigError::Validation(_))
		));
	}

	#[test]
	fn zero_batch_size_is_rejected() {
		let mut config = TrackerConfig::new("main", "shop", "collector.example.com");
		config.delivery.batch_size = 0;
		assert!(config.validate().is_err());
	}

	#[test]
	fn backoff_base_above_cap_is_rejected() {
		let mut config = TrackerConfig::new("main", "shop", "collector.example.com");
		config.retry.base_delay = Duration::from_secs(120);
		assert!(config.validate().is_err());
	}

	#[test]
	fn blank_namespace_is_rejected() {
		let config = TrackerConfig::new("  ", "shop", "collector.example.com");
		assert!(config.validate().is_err());
	}
}
