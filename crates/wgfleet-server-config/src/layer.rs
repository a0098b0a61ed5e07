// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	BootstrapConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LoggingConfigLayer,
	SessionsConfigLayer, SshConfigLayer,
};

/// One source's partial view of the server configuration.
///
/// Mirrors the TOML file layout: one table per section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub ssh: Option<SshConfigLayer>,
	#[serde(default)]
	pub sessions: Option<SessionsConfigLayer>,
	#[serde(default)]
	pub bootstrap: Option<BootstrapConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	match (base.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge(existing, incoming),
		(None, Some(incoming)) => *base = Some(incoming),
		(_, None) => {}
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.ssh, other.ssh, SshConfigLayer::merge);
		merge_section(&mut self.sessions, other.sessions, SessionsConfigLayer::merge);
		merge_section(&mut self.bootstrap, other.bootstrap, BootstrapConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
