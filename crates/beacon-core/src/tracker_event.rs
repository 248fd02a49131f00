// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed tracker events and their required-field checks.
//!
//! Each event can be built directly or read from the loosely-typed details
//! map an application binding receives (`{"category": "shop", ...}`). A
//! missing or empty required field is a [`CoreError::MissingField`]; the
//! event never reaches a store.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::event::EventKind;
use crate::payload::Payload;
use crate::schema;

/// A JSON document tagged with the schema that describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfDescribingJson {
	pub schema: String,
	pub data: Value,
}

impl SelfDescribingJson {
	pub fn new(schema: impl Into<String>, data: Value) -> Self {
		Self {
			schema: schema.into(),
			data,
		}
	}

	pub fn to_value(&self) -> Value {
		json!({ "schema": self.schema, "data": self.data })
	}
}

/// Structured event. `category` and `action` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredEvent {
	#[serde(default)]
	pub category: String,
	#[serde(default)]
	pub action: String,
	pub label: Option<String>,
	pub property: Option<String>,
	pub value: Option<f64>,
}

impl StructuredEvent {
	pub fn new(category: impl Into<String>, action: impl Into<String>) -> Self {
		Self {
			category: category.into(),
			action: action.into(),
			..Default::default()
		}
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn with_property(mut self, property: impl Into<String>) -> Self {
		self.property = Some(property.into());
		self
	}

	pub fn with_value(mut self, value: f64) -> Self {
		self.value = Some(value);
		self
	}

	pub fn validate(&self) -> Result<()> {
		require(EventKind::Structured, "category", &self.category)?;
		require(EventKind::Structured, "action", &self.action)
	}

	fn payload(self) -> Payload {
		Payload::new()
			.insert("se_ca", self.category)
			.insert("se_ac", self.action)
			.insert_opt("se_la", self.label)
			.insert_opt("se_pr", self.property)
			.insert_opt("se_va", self.value)
	}
}

/// Mobile screen view. `screen_name` is required; a missing id is generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenViewEvent {
	#[serde(default)]
	pub screen_name: String,
	pub screen_id: Option<String>,
	pub screen_type: Option<String>,
	pub previous_screen_name: Option<String>,
	pub previous_screen_id: Option<String>,
	pub previous_screen_type: Option<String>,
	pub transition_type: Option<String>,
}

impl ScreenViewEvent {
	pub fn new(screen_name: impl Into<String>) -> Self {
		Self {
			screen_name: screen_name.into(),
			..Default::default()
		}
	}

	pub fn with_screen_id(mut self, id: impl Into<String>) -> Self {
		self.screen_id = Some(id.into());
		self
	}

	pub fn with_screen_type(mut self, screen_type: impl Into<String>) -> Self {
		self.screen_type = Some(screen_type.into());
		self
	}

	pub fn validate(&self) -> Result<()> {
		require(EventKind::ScreenView, "screenName", &self.screen_name)
	}

	fn payload(self) -> Payload {
		let id = self
			.screen_id
			.unwrap_or_else(|| Uuid::new_v4().to_string());
		let data = Payload::new()
			.insert("name", self.screen_name)
			.insert("id", id)
			.insert_opt("type", self.screen_type)
			.insert_opt("previousName", self.previous_screen_name)
			.insert_opt("previousId", self.previous_screen_id)
			.insert_opt("previousType", self.previous_screen_type)
			.insert_opt("transitionType", self.transition_type);
		let inner = SelfDescribingJson::new(schema::SCREEN_VIEW, Value::Object(data.into_map()));
		Payload::new().insert("ue_pr", unstruct_envelope(&inner))
	}
}

/// Page view. `page_url` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewEvent {
	#[serde(default)]
	pub page_url: String,
	pub page_title: Option<String>,
	pub page_referrer: Option<String>,
}

impl PageViewEvent {
	pub fn new(page_url: impl Into<String>) -> Self {
		Self {
			page_url: page_url.into(),
			..Default::default()
		}
	}

	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.page_title = Some(title.into());
		self
	}

	pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
		self.page_referrer = Some(referrer.into());
		self
	}

	pub fn validate(&self) -> Result<()> {
		require(EventKind::PageView, "pageUrl", &self.page_url)
	}

	fn payload(self) -> Payload {
		Payload::new()
			.insert("url", self.page_url)
			.insert_opt("page", self.page_title)
			.insert_opt("refr", self.page_referrer)
	}
}

/// Self-describing (custom) event. Both `schema` and `data` are required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelfDescribingEvent {
	#[serde(default)]
	pub schema: String,
	#[serde(default)]
	pub data: Value,
}

impl SelfDescribingEvent {
	pub fn new(schema: impl Into<String>, data: Value) -> Self {
		Self {
			schema: schema.into(),
			data,
		}
	}

	pub fn validate(&self) -> Result<()> {
		require(EventKind::SelfDescribing, "schema", &self.schema)?;
		if self.data.is_null() {
			return Err(CoreError::MissingField {
				kind: EventKind::SelfDescribing,
				field: "data",
			});
		}
		Ok(())
	}

	fn payload(self) -> Payload {
		let inner = SelfDescribingJson::new(self.schema, self.data);
		Payload::new().insert("ue_pr", unstruct_envelope(&inner))
	}
}

/// Any event the tracker accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
	Structured(StructuredEvent),
	ScreenView(ScreenViewEvent),
	PageView(PageViewEvent),
	SelfDescribing(SelfDescribingEvent),
}

impl TrackerEvent {
	/// Reads a details map as the event type named by `kind`.
	pub fn from_details(kind: EventKind, details: Value) -> Result<Self> {
		let event = match kind {
			EventKind::Structured => TrackerEvent::Structured(parse(kind, details)?),
			EventKind::ScreenView => TrackerEvent::ScreenView(parse(kind, details)?),
			EventKind::PageView => TrackerEvent::PageView(parse(kind, details)?),
			EventKind::SelfDescribing => TrackerEvent::SelfDescribing(parse(kind, details)?),
		};
		event.validate()?;
		Ok(event)
	}

	pub fn kind(&self) -> EventKind {
		match self {
			TrackerEvent::Structured(_) => EventKind::Structured,
			TrackerEvent::ScreenView(_) => EventKind::ScreenView,
			TrackerEvent::PageView(_) => EventKind::PageView,
			TrackerEvent::SelfDescribing(_) => EventKind::SelfDescribing,
		}
	}

	pub fn validate(&self) -> Result<()> {
		match self {
			TrackerEvent::Structured(e) => e.validate(),
			TrackerEvent::ScreenView(e) => e.validate(),
			TrackerEvent::PageView(e) => e.validate(),
			TrackerEvent::SelfDescribing(e) => e.validate(),
		}
	}

	/// Validates the event and converts it into its protocol fields,
	/// including the `e` event code.
	pub fn into_payload(self) -> Result<Payload> {
		self.validate()?;
		let code = self.kind().protocol_code();
		let fields = match self {
			TrackerEvent::Structured(e) => e.payload(),
			TrackerEvent::ScreenView(e) => e.payload(),
			TrackerEvent::PageView(e) => e.payload(),
			TrackerEvent::SelfDescribing(e) => e.payload(),
		};
		Ok(fields.insert("e", code))
	}
}

impl From<StructuredEvent> for TrackerEvent {
	fn from(event: StructuredEvent) -> Self {
		TrackerEvent::Structured(event)
	}
}

impl From<ScreenViewEvent> for TrackerEvent {
	fn from(event: ScreenViewEvent) -> Self {
		TrackerEvent::ScreenView(event)
	}
}

impl From<PageViewEvent> for TrackerEvent {
	fn from(event: PageViewEvent) -> Self {
		TrackerEvent::PageView(event)
	}
}

impl From<SelfDescribingEvent> for TrackerEvent {
	fn from(event: SelfDescribingEvent) -> Self {
		TrackerEvent::SelfDescribing(event)
	}
}

fn require(kind: EventKind, field: &'static str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(CoreError::MissingField { kind, field });
	}
	Ok(())
}

fn parse<T: DeserializeOwned>(kind: EventKind, details: Value) -> Result<T> {
	serde_json::from_value(details).map_err(|e| CoreError::InvalidDetails {
		kind,
		message: e.to_string(),
	})
}

fn unstruct_envelope(inner: &SelfDescribingJson) -> Value {
	json!({ "schema": schema::UNSTRUCT_EVENT, "data": inner.to_value() })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn structured_from_details_reads_optional_fields() {
		let event = TrackerEvent::from_details(
			EventKind::Structured,
			json!({"category": "shop", "action": "add", "label": "sku-1", "value": 2.5}),
		)
		.unwrap();

		let payload = event.into_payload().unwrap();
		assert_eq!(payload.get("e"), Some(&json!("se")));
		assert_eq!(payload.get("se_ca"), Some(&json!("shop")));
		assert_eq!(payload.get("se_ac"), Some(&json!("add")));
		assert_eq!(payload.get("se_la"), Some(&json!("sku-1")));
		assert_eq!(payload.get("se_va"), Some(&json!(2.5)));
		assert!(payload.get("se_pr").is_none());
	}

	#[test]
	fn structured_requires_category_and_action() {
		let err = TrackerEvent::from_details(EventKind::Structured, json!({"action": "add"}))
			.unwrap_err();
		assert_eq!(
			err,
			CoreError::MissingField {
				kind: EventKind::Structured,
				field: "category"
			}
		);

		let err = StructuredEvent::new("shop", "  ").validate().unwrap_err();
		assert_eq!(
			err,
			CoreError::MissingField {
				kind: EventKind::Structured,
				field: "action"
			}
		);
	}

	#[test]
	fn screen_view_requires_name() {
		let err = TrackerEvent::from_details(EventKind::ScreenView, json!({"screenId": "abc"}))
			.unwrap_err();
		assert!(matches!(
			err,
			CoreError::MissingField {
				field: "screenName",
				..
			}
		));
	}

	#[test]
	fn screen_view_generates_id_when_missing() {
		let payload = TrackerEvent::from(ScreenViewEvent::new("home"))
			.into_payload()
			.unwrap();
		let inner = &payload.get("ue_pr").unwrap()["data"];
		assert_eq!(inner["schema"], schema::SCREEN_VIEW);
		assert_eq!(inner["data"]["name"], "home");
		let id = inner["data"]["id"].as_str().unwrap();
		assert!(Uuid::parse_str(id).is_ok());
	}

	#[test]
	fn page_view_maps_fields() {
		let event = TrackerEvent::from_details(
			EventKind::PageView,
			json!({"pageUrl": "https://example.com", "pageTitle": "Home", "pageReferrer": "https://ref"}),
		)
		.unwrap();
		let payload = event.into_payload().unwrap();
		assert_eq!(payload.get("e"), Some(&json!("pv")));
		assert_eq!(payload.get("url"), Some(&json!("https://example.com")));
		assert_eq!(payload.get("page"), Some(&json!("Home")));
		assert_eq!(payload.get("refr"), Some(&json!("https://ref")));
	}

	#[test]
	fn page_view_requires_url() {
		let err = PageViewEvent::default().validate().unwrap_err();
		assert!(matches!(err, CoreError::MissingField { field: "pageUrl", .. }));
	}

	#[test]
	fn self_describing_requires_data() {
		let err = TrackerEvent::from_details(
			EventKind::SelfDescribing,
			json!({"schema": "iglu:com.acme/button/jsonschema/1-0-0"}),
		)
		.unwrap_err();
		assert!(matches!(err, CoreError::MissingField { field: "data", .. }));
	}

	#[test]
	fn self_describing_wraps_in_unstruct_envelope() {
		let payload = TrackerEvent::from(SelfDescribingEvent::new(
			"iglu:com.acme/button/jsonschema/1-0-0",
			json!({"id": "buy"}),
		))
		.into_payload()
		.unwrap();
		let ue = payload.get("ue_pr").unwrap();
		assert_eq!(ue["schema"], schema::UNSTRUCT_EVENT);
		assert_eq!(ue["data"]["schema"], "iglu:com.acme/button/jsonschema/1-0-0");
		assert_eq!(ue["data"]["data"]["id"], "buy");
	}

	#[test]
	fn wrong_field_type_is_invalid_details() {
		let err = TrackerEvent::from_details(
			EventKind::Structured,
			json!({"category": 5, "action": "add"}),
		)
		.unwrap_err();
		assert!(matches!(err, CoreError::InvalidDetails { .. }));
	}
}
