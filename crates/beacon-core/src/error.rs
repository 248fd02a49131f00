// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::event::EventKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
	/// A required field was absent or empty.
	#[error("{kind} event requires {field} to be set")]
	MissingField { kind: EventKind, field: &'static str },

	/// The details map could not be read as the given event kind.
	#[error("invalid {kind} event details: {message}")]
	InvalidDetails { kind: EventKind, message: String },

	#[error("unknown event kind: {0}")]
	UnknownKind(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
