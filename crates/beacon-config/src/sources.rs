// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, TOML files and environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::TrackerConfigLayer;
use crate::sections::{
	DeliveryConfigLayer, EmitterConfigLayer, IdentityConfigLayer, LoggingConfigLayer,
	QueueOverflowPolicy, RetryConfigLayer, StoreConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<TrackerConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(TrackerConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `$XDG_CONFIG_HOME/beacon/tracker.toml` when a config dir is known.
	pub fn user() -> Option<Self> {
		dirs::config_dir().map(|dir| Self::new(dir.join("beacon").join("tracker.toml")))
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(TrackerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: TrackerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable source.
///
/// Convention: BEACON_TRACKER_<FIELD>
pub struct EnvSource {
	lookup: Lookup,
}

impl EnvSource {
	pub fn new() -> Self {
		Self::with_lookup(|name| std::env::var(name).ok())
	}

	/// Reads variables through `lookup` instead of the process environment.
	pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self
			.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parsed<T>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
		T::Err: std::fmt::Display,
	{
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid value '{v}': {e}"),
			}),
			None => Ok(None),
		}
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<TrackerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(TrackerConfigLayer {
			tracker: Some(IdentityConfigLayer {
				namespace: self.var("BEACON_TRACKER_NAMESPACE"),
				app_id: self.var("BEACON_TRACKER_APP_ID"),
				platform: self.var("BEACON_TRACKER_PLATFORM"),
			}),
			emitter: Some(EmitterConfigLayer {
				endpoint: self.var("BEACON_TRACKER_ENDPOINT"),
				method: self.parsed("BEACON_TRACKER_METHOD")?,
				protocol: self.parsed("BEACON_TRACKER_PROTOCOL")?,
				encode_base64: self.bool("BEACON_TRACKER_BASE64"),
				request_timeout_ms: self.parsed("BEACON_TRACKER_REQUEST_TIMEOUT_MS")?,
			}),
			delivery: Some(DeliveryConfigLayer {
				batch_size: self.parsed("BEACON_TRACKER_BATCH_SIZE")?,
				flush_interval_ms: self.parsed("BEACON_TRACKER_FLUSH_INTERVAL_MS")?,
				flush_threshold: self.parsed("BEACON_TRACKER_FLUSH_THRESHOLD")?,
				shutdown_timeout_ms: self.parsed("BEACON_TRACKER_SHUTDOWN_TIMEOUT_MS")?,
			}),
			store: Some(StoreConfigLayer {
				capacity: self.parsed("BEACON_TRACKER_STORE_CAPACITY")?,
				overflow_policy: self.parsed::<QueueOverflowPolicy>("BEACON_TRACKER_STORE_OVERFLOW_POLICY")?,
				database_path: self.var("BEACON_TRACKER_STORE_PATH").map(PathBuf::from),
			}),
			retry: Some(RetryConfigLayer {
				max_attempts: self.parsed("BEACON_TRACKER_RETRY_MAX_ATTEMPTS")?,
				backoff_base_ms: self.parsed("BEACON_TRACKER_RETRY_BASE_MS")?,
				backoff_cap_ms: self.parsed("BEACON_TRACKER_RETRY_CAP_MS")?,
				jitter: self.bool("BEACON_TRACKER_RETRY_JITTER"),
			}),
			logging: Some(LoggingConfigLayer {
				level: self.var("BEACON_TRACKER_LOG_LEVEL"),
				json: self.bool("BEACON_TRACKER_LOG_JSON"),
			}),
		})
	}
}
