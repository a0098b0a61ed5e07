// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use wgfleet_common_config::SecretString;

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone, Default)]
pub struct SshCredentials {
	pub private_key: Option<PathBuf>,
	pub password: Option<SecretString>,
}

/// The credential that will actually be used.
#[derive(Debug, Clone, Copy)]
pub enum SshAuth<'a> {
	Key(&'a Path),
	Password(&'a SecretString),
}

impl SshCredentials {
	/// Key wins when both are present.
	pub fn auth(&self) -> Option<SshAuth<'_>> {
		if let Some(key) = &self.private_key {
			return Some(SshAuth::Key(key));
		}
		self.password.as_ref().map(SshAuth::Password)
	}
}

/// Where and as whom to run a command.
#[derive(Debug, Clone)]
pub struct SshTarget {
	pub host: String,
	pub port: u16,
	pub username: String,
	pub credentials: SshCredentials,
}

impl SshTarget {
	pub fn new(host: impl Into<String>, username: impl Into<String>, credentials: SshCredentials) -> Self {
		Self {
			host: host.into(),
			port: DEFAULT_SSH_PORT,
			username: username.into(),
			credentials,
		}
	}

	pub fn with_port(mut self, port: u16) -> Self {
		self.port = port;
		self
	}

	pub fn destination(&self) -> String {
		format!("{}@{}", self.username, self.host)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_takes_priority_over_password() {
		let creds = SshCredentials {
			private_key: Some(PathBuf::from("/etc/wgfleet/id_ed25519")),
			password: Some(SecretString::new("hunter2".to_string())),
		};
		assert!(matches!(creds.auth(), Some(SshAuth::Key(_))));
	}

	#[test]
	fn password_used_without_key() {
		let creds = SshCredentials {
			private_key: None,
			password: Some(SecretString::new("hunter2".to_string())),
		};
		assert!(matches!(creds.auth(), Some(SshAuth::Password(_))));
		assert!(SshCredentials::default().auth().is_none());
	}

	#[test]
	fn destination_format() {
		let target = SshTarget::new("203.0.113.9", "root", SshCredentials::default()).with_port(2222);
		assert_eq!(target.destination(), "root@203.0.113.9");
		assert_eq!(target.port, 2222);
	}
}
