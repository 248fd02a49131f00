// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::sections::{
	DeliveryConfigLayer, EmitterConfigLayer, IdentityConfigLayer, LoggingConfigLayer,
	RetryConfigLayer, StoreConfigLayer,
};

/// One partially specified configuration, as read from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfigLayer {
	pub tracker: Option<IdentityConfigLayer>,
	pub emitter: Option<EmitterConfigLayer>,
	pub delivery: Option<DeliveryConfigLayer>,
	pub store: Option<StoreConfigLayer>,
	pub retry: Option<RetryConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

impl TrackerConfigLayer {
	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.tracker, other.tracker, IdentityConfigLayer::merge);
		merge_section(&mut self.emitter, other.emitter, EmitterConfigLayer::merge);
		merge_section(&mut self.delivery, other.delivery, DeliveryConfigLayer::merge);
		merge_section(&mut self.store, other.store, StoreConfigLayer::merge);
		merge_section(&mut self.retry, other.retry, RetryConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(slot: &mut Option<T>, incoming: Option<T>, merge: impl FnOnce(&mut T, T)) {
	let Some(incoming) = incoming else {
		return;
	};
	if let Some(existing) = slot.as_mut() {
		merge(existing, incoming);
	} else {
		*slot = Some(incoming);
	}
}
