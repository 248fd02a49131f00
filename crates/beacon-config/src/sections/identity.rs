// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracker identity section: namespace, app id and platform.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PLATFORM: &str = "mob";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfigLayer {
	pub namespace: Option<String>,
	pub app_id: Option<String>,
	pub platform: Option<String>,
}

impl IdentityConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.namespace.is_some() {
			self.namespace = other.namespace;
		}
		if other.app_id.is_some() {
			self.app_id = other.app_id;
		}
		if other.platform.is_some() {
			self.platform = other.platform;
		}
	}

	pub fn finalize(self) -> Result<IdentityConfig, ConfigError> {
		Ok(IdentityConfig {
			namespace: self.namespace.ok_or(ConfigError::Missing("namespace"))?,
			app_id: self.app_id.ok_or(ConfigError::Missing("app_id"))?,
			platform: self
				.platform
				.unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfig {
	/// Distinguishes independent trackers in one process.
	pub namespace: String,
	pub app_id: String,
	pub platform: String,
}
