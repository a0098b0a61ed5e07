// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#[derive(Debug, thiserror::Error)]
pub enum DbError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Internal: {0}")]
	Internal(String),

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl From<wgfleet_tunnel_common::ModelError> for DbError {
	fn from(e: wgfleet_tunnel_common::ModelError) -> Self {
		DbError::Internal(format!("invalid stored value: {e}"))
	}
}

impl From<wgfleet_tunnel_common::KeyError> for DbError {
	fn from(e: wgfleet_tunnel_common::KeyError) -> Self {
		DbError::Internal(format!("invalid stored key: {e}"))
	}
}

/// True when `e` is a UNIQUE or PRIMARY KEY violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
	matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub type Result<T> = std::result::Result<T, DbError>;
