// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Collector wire format.
//!
//! Stored payloads keep structured values (`ue_pr` is an object, `se_va` a
//! number). On the wire every field is a string; self-describing fields are
//! JSON text, or URL-safe base64 under the `*_px` / `cx` keys when base64
//! encoding is enabled.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use beacon_core::{schema, Event};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::sender::SendError;

/// Collector path for batched POST requests.
pub const POST_PATH: &str = "/com.snowplowanalytics.snowplow/tp2";
/// Collector path for single-event GET requests.
pub const GET_PATH: &str = "/i";

const UNSTRUCT_JSON: &str = "ue_pr";
const UNSTRUCT_BASE64: &str = "ue_px";
const CONTEXTS_JSON: &str = "co";
const CONTEXTS_BASE64: &str = "cx";

#[derive(Debug, Clone, Copy, Default)]
pub struct WireEncoder {
	encode_base64: bool,
}

impl WireEncoder {
	pub fn new(encode_base64: bool) -> Self {
		Self { encode_base64 }
	}

	/// Flattens one event into string fields, stamping `stm` with `sent_at`.
	pub fn encode(
		&self,
		event: &Event,
		sent_at: DateTime<Utc>,
	) -> Result<Map<String, Value>, SendError> {
		let mut fields = Map::new();
		for (key, value) in &event.payload {
			if key == UNSTRUCT_JSON {
				let (key, text) = self.self_describing(UNSTRUCT_JSON, UNSTRUCT_BASE64, value)?;
				fields.insert(key.to_string(), Value::String(text));
				continue;
			}
			if let Some(text) = stringify(value)? {
				fields.insert(key.clone(), Value::String(text));
			}
		}

		if !event.contexts.is_empty() {
			let envelope = json!({
				"schema": schema::CONTEXTS,
				"data": event.contexts.iter().map(|c| c.to_value()).collect::<Vec<_>>(),
			});
			let (key, text) = self.self_describing(CONTEXTS_JSON, CONTEXTS_BASE64, &envelope)?;
			fields.insert(key.to_string(), Value::String(text));
		}

		fields.insert("eid".into(), Value::String(event.event_id.to_string()));
		fields.insert(
			"dtm".into(),
			Value::String(event.created_at.timestamp_millis().to_string()),
		);
		fields.insert(
			"stm".into(),
			Value::String(sent_at.timestamp_millis().to_string()),
		);
		Ok(fields)
	}

	/// `payload_data` envelope carrying every event of a POST request.
	pub fn post_body(&self, events: &[Event], sent_at: DateTime<Utc>) -> Result<Value, SendError> {
		let data = events
			.iter()
			.map(|e| self.encode(e, sent_at).map(Value::Object))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(json!({ "schema": schema::PAYLOAD_DATA, "data": data }))
	}

	/// Query parameters for a GET request.
	pub fn query_pairs(
		&self,
		event: &Event,
		sent_at: DateTime<Utc>,
	) -> Result<Vec<(String, String)>, SendError> {
		Ok(self
			.encode(event, sent_at)?
			.into_iter()
			.filter_map(|(k, v)| match v {
				Value::String(s) => Some((k, s)),
				_ => None,
			})
			.collect())
	}

	fn self_describing(
		&self,
		json_key: &'static str,
		base64_key: &'static str,
		value: &Value,
	) -> Result<(&'static str, String), SendError> {
		let text = match value {
			Value::String(s) => s.clone(),
			other => serde_json::to_string(other)
				.map_err(|e| SendError::Serialization(e.to_string()))?,
		};
		if self.encode_base64 {
			Ok((base64_key, URL_SAFE_NO_PAD.encode(text)))
		} else {
			Ok((json_key, text))
		}
	}
}

fn stringify(value: &Value) -> Result<Option<String>, SendError> {
	Ok(match value {
		Value::Null => None,
		Value::String(s) => Some(s.clone()),
		Value::Bool(b) => Some(b.to_string()),
		Value::Number(n) => Some(n.to_string()),
		nested => Some(
			serde_json::to_string(nested).map_err(|e| SendError::Serialization(e.to_string()))?,
		),
	})
}
