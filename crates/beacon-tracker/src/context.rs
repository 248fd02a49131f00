// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use beacon_core::{EventKind, SelfDescribingJson};

/// Supplies ambient contexts (session, device, app state) attached to every
/// tracked event after the caller's own contexts.
#[async_trait]
pub trait ContextProvider: Send + Sync {
	async fn contexts(&self, kind: EventKind) -> Vec<SelfDescribingJson>;
}

/// Attaches the same contexts to every event.
#[derive(Debug, Clone, Default)]
pub struct StaticContexts {
	contexts: Vec<SelfDescribingJson>,
}

impl StaticContexts {
	pub fn new(contexts: Vec<SelfDescribingJson>) -> Self {
		Self { contexts }
	}
}

#[async_trait]
impl ContextProvider for StaticContexts {
	async fn contexts(&self, _kind: EventKind) -> Vec<SelfDescribingJson> {
		self.contexts.clone()
	}
}
