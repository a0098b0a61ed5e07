// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node bootstrap settings.

use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_SCRIPT_PATH: &str = "/etc/wgfleet/bootstrap.sh";
pub const DEFAULT_REMOTE_PATH: &str = "/tmp/wgfleet-bootstrap.sh";
pub const DEFAULT_LISTEN_PORT: u16 = 51820;
pub const DEFAULT_REGION_DNS: &str = "1.1.1.1";

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
	/// Local script shipped to nodes.
	pub script_path: PathBuf,
	pub remote_path: String,
	/// WireGuard port the script configures; used to build the endpoint.
	pub listen_port: u16,
	pub default_dns: String,
}

impl Default for BootstrapConfig {
	fn default() -> Self {
		BootstrapConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BootstrapConfigLayer {
	#[serde(default)]
	pub script_path: Option<PathBuf>,
	#[serde(default)]
	pub remote_path: Option<String>,
	#[serde(default)]
	pub listen_port: Option<u16>,
	#[serde(default)]
	pub default_dns: Option<String>,
}

impl BootstrapConfigLayer {
	pub fn merge(&mut self, other: BootstrapConfigLayer) {
		if other.script_path.is_some() {
			self.script_path = other.script_path;
		}
		if other.remote_path.is_some() {
			self.remote_path = other.remote_path;
		}
		if other.listen_port.is_some() {
			self.listen_port = other.listen_port;
		}
		if other.default_dns.is_some() {
			self.default_dns = other.default_dns;
		}
	}

	pub fn finalize(self) -> BootstrapConfig {
		BootstrapConfig {
			script_path: self
				.script_path
				.unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_PATH)),
			remote_path: self
				.remote_path
				.unwrap_or_else(|| DEFAULT_REMOTE_PATH.to_string()),
			listen_port: self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT),
			default_dns: self
				.default_dns
				.unwrap_or_else(|| DEFAULT_REGION_DNS.to_string()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = BootstrapConfig::default();
		assert_eq!(config.listen_port, 51820);
		assert_eq!(config.remote_path, "/tmp/wgfleet-bootstrap.sh");
		assert_eq!(config.default_dns, "1.1.1.1");
	}
}
