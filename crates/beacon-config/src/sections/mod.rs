// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod delivery;
mod emitter;
mod identity;
mod logging;
mod retry;
mod store;

pub use delivery::{DeliveryConfig, DeliveryConfigLayer, DEFAULT_BATCH_SIZE};
pub use emitter::{EmitterConfig, EmitterConfigLayer, HttpMethod, Protocol};
pub use identity::{IdentityConfig, IdentityConfigLayer, DEFAULT_PLATFORM};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use retry::RetryConfigLayer;
pub use store::{QueueOverflowPolicy, StoreConfig, StoreConfigLayer};
