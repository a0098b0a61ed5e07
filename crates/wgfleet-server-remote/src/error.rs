// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
	/// The session never came up: DNS, refused, auth, connect timeout.
	#[error("failed to connect to {host}: {reason}")]
	Connect { host: String, reason: String },

	/// The remote command ran and failed, or hit the overall timeout
	/// (`exit_code` is `None` then).
	#[error("remote command failed (code={}): {output}", exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
	CommandFailed {
		exit_code: Option<i32>,
		output: String,
	},

	/// The local ssh process could not be started or waited on.
	#[error("failed to run ssh: {0}")]
	Spawn(#[source] std::io::Error),
}

impl RemoteError {
	pub fn is_connect(&self) -> bool {
		matches!(self, RemoteError::Connect { .. })
	}
}

pub type Result<T> = std::result::Result<T, RemoteError>;
