// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;
use uuid::Uuid;
use wgfleet_server_db::DbError;
use wgfleet_server_remote::{ExtractionError, RemoteError};
use wgfleet_tunnel_common::{IpPoolError, SubnetPrefix};

#[derive(Error, Debug)]
pub enum TunnelError {
	/// Unknown, disabled or misconfigured region.
	#[error("invalid region: {0}")]
	InvalidRegion(String),

	#[error("region not found: {0}")]
	RegionNotFound(String),

	#[error("active peer limit of {limit} reached")]
	QuotaExceeded { limit: u32 },

	#[error("no free addresses left in {0}.0/24")]
	PoolExhausted(SubnetPrefix),

	#[error("cannot reach {host}: {reason}")]
	RemoteConnect { host: String, reason: String },

	#[error("remote command failed (code={exit_code:?}): {output}")]
	RemoteCommandFailed {
		exit_code: Option<i32>,
		output: String,
	},

	/// Carried as a warning in a bootstrap outcome, never returned as an error
	/// from a successful bootstrap.
	#[error("could not read node identity from bootstrap output: {0}")]
	BootstrapExtractionFailed(#[from] ExtractionError),

	#[error("invalid webhook secret")]
	InvalidWebhookSecret,

	#[error("peer not found")]
	PeerNotFound,

	#[error("user not found: {0}")]
	UserNotFound(Uuid),

	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("database error: {0}")]
	Database(DbError),

	#[error("internal error: {0}")]
	Internal(String),
}

impl TunnelError {
	/// Only transport failures are worth retrying; a command that ran and
	/// failed will fail the same way again.
	pub fn is_retryable(&self) -> bool {
		matches!(self, TunnelError::RemoteConnect { .. })
	}
}

impl From<DbError> for TunnelError {
	fn from(e: DbError) -> Self {
		match e {
			DbError::Conflict(msg) => TunnelError::Conflict(msg),
			other => TunnelError::Database(other),
		}
	}
}

impl From<RemoteError> for TunnelError {
	fn from(e: RemoteError) -> Self {
		match e {
			RemoteError::Connect { host, reason } => TunnelError::RemoteConnect { host, reason },
			RemoteError::CommandFailed { exit_code, output } => {
				TunnelError::RemoteCommandFailed { exit_code, output }
			}
			RemoteError::Spawn(e) => TunnelError::Internal(format!("failed to start ssh: {e}")),
		}
	}
}

impl From<IpPoolError> for TunnelError {
	fn from(e: IpPoolError) -> Self {
		match e {
			IpPoolError::PoolExhausted(prefix) => TunnelError::PoolExhausted(prefix),
			IpPoolError::InvalidPrefix(prefix) => {
				TunnelError::InvalidRegion(format!("unusable subnet prefix '{prefix}'"))
			}
		}
	}
}

pub type Result<T> = std::result::Result<T, TunnelError>;
