// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Build information for wgfleet-server.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
	pub version: &'static str,
	pub git_sha: &'static str,
	pub platform: &'static str,
}

impl BuildInfo {
	pub fn current() -> Self {
		Self {
			version: env!("CARGO_PKG_VERSION"),
			git_sha: option_env!("WGFLEET_GIT_SHA").unwrap_or("unknown"),
			platform: std::env::consts::OS,
		}
	}
}

pub fn format_version_info() -> String {
	let info = BuildInfo::current();
	format!(
		"wgfleet-server version: {}\n\
		 Git SHA:                {}\n\
		 Platform:               {}",
		info.version, info.git_sha, info.platform,
	)
}
