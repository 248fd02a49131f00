// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builder for protocol key/value maps.

use serde_json::{Map, Value};

/// An event payload under construction.
///
/// Keys are protocol field names (`se_ca`, `url`, `uid`, ...). Optional
/// fields are skipped rather than written as `null`.
///
/// # Example
///
/// ```
/// use beacon_core::Payload;
///
/// let payload = Payload::new()
///     .insert("se_ca", "checkout")
///     .insert_opt("se_la", None::<String>)
///     .insert("se_va", 12.5);
/// assert_eq!(payload.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
	inner: Map<String, Value>,
}

impl Payload {
	pub fn new() -> Self {
		Self { inner: Map::new() }
	}

	pub fn insert<K, V>(mut self, key: K, value: V) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		self.inner.insert(key.into(), value.into());
		self
	}

	/// Inserts the value only when present.
	pub fn insert_opt<K, V>(self, key: K, value: Option<V>) -> Self
	where
		K: Into<String>,
		V: Into<Value>,
	{
		match value {
			Some(v) => self.insert(key, v),
			None => self,
		}
	}

	/// Merges another payload into this one. Keys already present are kept,
	/// so event fields cannot be overwritten by ambient fields.
	pub fn merge_missing(mut self, other: Payload) -> Self {
		for (k, v) in other.inner {
			self.inner.entry(k).or_insert(v);
		}
		self
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.inner.get(key)
	}

	pub fn into_map(self) -> Map<String, Value> {
		self.inner
	}
}

impl From<Payload> for Map<String, Value> {
	fn from(payload: Payload) -> Self {
		payload.into_map()
	}
}

impl From<Map<String, Value>> for Payload {
	fn from(map: Map<String, Value>) -> Self {
		Self { inner: map }
	}
}
