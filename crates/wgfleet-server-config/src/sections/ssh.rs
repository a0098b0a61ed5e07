// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SSH access to edge nodes.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use wgfleet_common_config::SecretString;

pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_KEEPALIVE_COUNT: u32 = 3;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 15 * 60;
pub const DEFAULT_PEER_SCRIPT: &str = "sudo /usr/local/bin/wgfleet-peer";

#[derive(Debug, Clone)]
pub struct SshConfig {
	pub user: String,
	pub port: u16,
	pub private_key_path: Option<PathBuf>,
	/// Only read from the environment.
	pub password: Option<SecretString>,
	pub connect_timeout: Duration,
	pub keepalive_interval: Duration,
	pub keepalive_count: u32,
	pub command_timeout: Duration,
	pub peer_script: String,
	pub strict_host_keys: bool,
	pub known_hosts_file: Option<PathBuf>,
}

impl Default for SshConfig {
	fn default() -> Self {
		SshConfigLayer::default().finalize(None)
	}
}

impl SshConfig {
	pub fn has_credentials(&self) -> bool {
		self.private_key_path.is_some() || self.password.is_some()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshConfigLayer {
	#[serde(default)]
	pub user: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub private_key_path: Option<PathBuf>,
	#[serde(default)]
	pub connect_timeout_secs: Option<u64>,
	#[serde(default)]
	pub keepalive_interval_secs: Option<u64>,
	#[serde(default)]
	pub keepalive_count: Option<u32>,
	#[serde(default)]
	pub command_timeout_secs: Option<u64>,
	#[serde(default)]
	pub peer_script: Option<String>,
	#[serde(default)]
	pub strict_host_keys: Option<bool>,
	#[serde(default)]
	pub known_hosts_file: Option<PathBuf>,
}

impl SshConfigLayer {
	pub fn merge(&mut self, other: SshConfigLayer) {
		if other.user.is_some() {
			self.user = other.user;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.private_key_path.is_some() {
			self.private_key_path = other.private_key_path;
		}
		if other.connect_timeout_secs.is_some() {
			self.connect_timeout_secs = other.connect_timeout_secs;
		}
		if other.keepalive_interval_secs.is_some() {
			self.keepalive_interval_secs = other.keepalive_interval_secs;
		}
		if other.keepalive_count.is_some() {
			self.keepalive_count = other.keepalive_count;
		}
		if other.command_timeout_secs.is_some() {
			self.command_timeout_secs = other.command_timeout_secs;
		}
		if other.peer_script.is_some() {
			self.peer_script = other.peer_script;
		}
		if other.strict_host_keys.is_some() {
			self.strict_host_keys = other.strict_host_keys;
		}
		if other.known_hosts_file.is_some() {
			self.known_hosts_file = other.known_hosts_file;
		}
	}

	pub fn finalize(self, password: Option<SecretString>) -> SshConfig {
		SshConfig {
			user: self.user.unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
			port: self.port.unwrap_or(DEFAULT_SSH_PORT),
			private_key_path: self.private_key_path,
			password,
			connect_timeout: Duration::from_secs(
				self.connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
			),
			keepalive_interval: Duration::from_secs(
				self
					.keepalive_interval_secs
					.unwrap_or(DEFAULT_KEEPALIVE_INTERVAL_SECS),
			),
			keepalive_count: self.keepalive_count.unwrap_or(DEFAULT_KEEPALIVE_COUNT),
			command_timeout: Duration::from_secs(
				self.command_timeout_secs.unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
			),
			peer_script: self
				.peer_script
				.unwrap_or_else(|| DEFAULT_PEER_SCRIPT.to_string()),
			strict_host_keys: self.strict_host_keys.unwrap_or(false),
			known_hosts_file: self.known_hosts_file,
		}
	}
}
