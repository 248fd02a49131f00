// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ambient user and device fields attached to every tracked event.

use serde::{Deserialize, Serialize};

use crate::payload::Payload;

/// A partial update to the subject, as received from application code.
///
/// Absent fields leave the current value untouched. Empty strings are
/// ignored, and dimension pairs only apply when both halves are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectData {
	pub user_id: Option<String>,
	pub viewport_width: Option<u32>,
	pub viewport_height: Option<u32>,
	pub screen_width: Option<u32>,
	pub screen_height: Option<u32>,
	pub color_depth: Option<u32>,
	pub timezone: Option<String>,
	pub language: Option<String>,
	pub ip_address: Option<String>,
	#[serde(rename = "useragent")]
	pub user_agent: Option<String>,
	pub network_user_id: Option<String>,
	pub domain_user_id: Option<String>,
}

/// Current subject state for one tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
	pub user_id: Option<String>,
	pub viewport: Option<(u32, u32)>,
	pub screen_resolution: Option<(u32, u32)>,
	pub color_depth: Option<u32>,
	pub timezone: Option<String>,
	pub language: Option<String>,
	pub ip_address: Option<String>,
	pub user_agent: Option<String>,
	pub network_user_id: Option<String>,
	pub domain_user_id: Option<String>,
}

impl Subject {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn apply(&mut self, data: SubjectData) {
		set_non_empty(&mut self.user_id, data.user_id);
		if let (Some(w), Some(h)) = (data.viewport_width, data.viewport_height) {
			self.viewport = Some((w, h));
		}
		if let (Some(w), Some(h)) = (data.screen_width, data.screen_height) {
			self.screen_resolution = Some((w, h));
		}
		if data.color_depth.is_some() {
			self.color_depth = data.color_depth;
		}
		set_non_empty(&mut self.timezone, data.timezone);
		set_non_empty(&mut self.language, data.language);
		set_non_empty(&mut self.ip_address, data.ip_address);
		set_non_empty(&mut self.user_agent, data.user_agent);
		set_non_empty(&mut self.network_user_id, data.network_user_id);
		set_non_empty(&mut self.domain_user_id, data.domain_user_id);
	}

	/// Protocol fields for the subject.
	pub fn to_payload(&self) -> Payload {
		Payload::new()
			.insert_opt("uid", self.user_id.clone())
			.insert_opt("vp", self.viewport.map(dimensions))
			.insert_opt("res", self.screen_resolution.map(dimensions))
			.insert_opt("cd", self.color_depth)
			.insert_opt("tz", self.timezone.clone())
			.insert_opt("lang", self.language.clone())
			.insert_opt("ip", self.ip_address.clone())
			.insert_opt("ua", self.user_agent.clone())
			.insert_opt("tnuid", self.network_user_id.clone())
			.insert_opt("duid", self.domain_user_id.clone())
	}
}

fn set_non_empty(slot: &mut Option<String>, value: Option<String>) {
	if let Some(v) = value.filter(|v| !v.is_empty()) {
		*slot = Some(v);
	}
}

fn dimensions((w, h): (u32, u32)) -> String {
	format!("{w}x{h}")
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn apply_ignores_empty_strings() {
		let mut subject = Subject::new();
		subject.apply(SubjectData {
			user_id: Some("user-1".into()),
			..Default::default()
		});
		subject.apply(SubjectData {
			user_id: Some(String::new()),
			..Default::default()
		});
		assert_eq!(subject.user_id.as_deref(), Some("user-1"));
	}

	#[test]
	fn dimensions_need_both_halves() {
		let mut subject = Subject::new();
		subject.apply(SubjectData {
			viewport_width: Some(320),
			screen_width: Some(1080),
			screen_height: Some(1920),
			..Default::default()
		});
		assert!(subject.viewport.is_none());
		assert_eq!(subject.screen_resolution, Some((1080, 1920)));
	}

	#[test]
	fn subject_data_reads_binding_keys() {
		let data: SubjectData = serde_json::from_value(json!({
			"userId": "u",
			"useragent": "Mozilla/5.0",
			"networkUserId": "n",
			"colorDepth": 24
		}))
		.unwrap();
		assert_eq!(data.user_id.as_deref(), Some("u"));
		assert_eq!(data.user_agent.as_deref(), Some("Mozilla/5.0"));
		assert_eq!(data.network_user_id.as_deref(), Some("n"));
		assert_eq!(data.color_depth, Some(24));
	}

	#[test]
	fn to_payload_uses_protocol_keys() {
		let mut subject = Subject::new();
		subject.apply(SubjectData {
			user_id: Some("u".into()),
			screen_width: Some(1080),
			screen_height: Some(1920),
			timezone: Some("Europe/London".into()),
			..Default::default()
		});
		let payload = subject.to_payload();
		assert_eq!(payload.len(), 3);
		assert_eq!(payload.get("uid"), Some(&json!("u")));
		assert_eq!(payload.get("res"), Some(&json!("1080x1920")));
		assert_eq!(payload.get("tz"), Some(&json!("Europe/London")));
	}
}
