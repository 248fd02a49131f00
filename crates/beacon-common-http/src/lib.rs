// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Beacon.
//!
//! This crate provides:
//! - A pre-configured HTTP client with consistent User-Agent header
//! - Exponential backoff configuration and transient-failure classification

mod client;
mod retry;

pub use client::{builder, new_client_with_timeout, user_agent};
pub use retry::{is_retryable_status, RetryConfig, RetryableError};
