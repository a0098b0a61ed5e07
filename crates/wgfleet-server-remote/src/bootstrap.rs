// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Node bootstrap: ship the setup script over the session, run it and read
//! the node's identity back out of its output.

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;
use thiserror::Error;
use wgfleet_tunnel_common::{SubnetPrefix, WgPublicKey};

use crate::shell::shell_quote;

pub const DEFAULT_REMOTE_SCRIPT_PATH: &str = "/tmp/wgfleet-bootstrap.sh";

static ANSI_ESCAPE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap());

static SERVER_PUBKEY: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"Server Pubkey:\s*(\S+)").unwrap());

static PUBLIC_IP: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"Public IP:\s*(\d{1,3}(?:\.\d{1,3}){3})").unwrap());

/// Arguments passed positionally to the bootstrap script.
#[derive(Debug, Clone, Copy)]
pub struct BootstrapArgs<'a> {
	pub subnet_prefix: SubnetPrefix,
	pub region_id: &'a str,
	pub callback_url: &'a str,
	pub secret: &'a str,
}

/// Build a single command that decodes `script` to `remote_path`, runs it
/// as root with `args` and removes it again, preserving the exit status.
///
/// The result embeds the shared secret; treat it as sensitive.
pub fn bootstrap_command(script: &[u8], remote_path: &str, args: BootstrapArgs<'_>) -> String {
	let encoded = STANDARD.encode(script);
	let path = shell_quote(remote_path);
	format!(
		"echo '{encoded}' | base64 -d > {path} && chmod +x {path} && sudo bash {path} {} {} {} {}; status=$?; rm -f {path}; exit $status",
		shell_quote(&args.subnet_prefix.to_string()),
		shell_quote(args.region_id),
		shell_quote(args.callback_url),
		shell_quote(args.secret),
	)
}

/// Identity a freshly bootstrapped node reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
	pub server_public_key: WgPublicKey,
	pub public_ip: Ipv4Addr,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
	#[error("bootstrap output has no server public key")]
	MissingPublicKey,

	#[error("bootstrap output has an invalid server public key: {0}")]
	InvalidPublicKey(String),

	#[error("bootstrap output has no public IP")]
	MissingPublicIp,

	#[error("bootstrap output has an invalid public IP: {0}")]
	InvalidPublicIp(String),
}

pub fn extract_report(output: &str) -> Result<BootstrapReport, ExtractionError> {
	let clean = ANSI_ESCAPE.replace_all(output, "");

	let key = SERVER_PUBKEY
		.captures(&clean)
		.and_then(|c| c.get(1))
		.ok_or(ExtractionError::MissingPublicKey)?
		.as_str();
	let server_public_key = WgPublicKey::from_base64(key)
		.map_err(|_| ExtractionError::InvalidPublicKey(key.to_string()))?;

	let ip = PUBLIC_IP
		.captures(&clean)
		.and_then(|c| c.get(1))
		.ok_or(ExtractionError::MissingPublicIp)?
		.as_str();
	let public_ip = ip
		.parse::<Ipv4Addr>()
		.map_err(|_| ExtractionError::InvalidPublicIp(ip.to_string()))?;

	Ok(BootstrapReport {
		server_public_key,
		public_ip,
	})
}
