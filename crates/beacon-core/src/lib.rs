// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Beacon analytics delivery.
//!
//! This crate provides:
//! - [`Event`] and [`NewEvent`]: the record the delivery queue stores
//! - Typed tracker events ([`StructuredEvent`], [`ScreenViewEvent`],
//!   [`PageViewEvent`], [`SelfDescribingEvent`]) with required-field checks
//! - [`Subject`]: ambient user/device fields merged into every event
//! - [`Payload`]: a small builder for protocol key/value maps

pub mod error;
pub mod event;
pub mod payload;
pub mod schema;
pub mod subject;
pub mod tracker_event;

pub use error::{CoreError, Result};
pub use event::{Event, EventId, EventKind, NewEvent};
pub use payload::Payload;
pub use subject::{Subject, SubjectData};
pub use tracker_event::{
	PageViewEvent, ScreenViewEvent, SelfDescribingEvent, SelfDescribingJson, StructuredEvent,
	TrackerEvent,
};
