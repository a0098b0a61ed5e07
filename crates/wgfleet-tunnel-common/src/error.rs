// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors raised when decoding stored or user supplied model values.
#[derive(Debug, Error)]
pub enum ModelError {
	#[error("invalid plan tier: {0}")]
	InvalidPlanTier(String),

	#[error("invalid role: {0}")]
	InvalidRole(String),

	#[error("invalid session duration: {0}")]
	InvalidSessionDuration(String),

	#[error("session expiry out of range: {0}")]
	ExpiryOutOfRange(String),
}
