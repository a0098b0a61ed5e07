// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared secret for edge node callbacks.
//!
//! The secret itself is never read from TOML; set
//! `WGFLEET_SERVER_WEBHOOK_SECRET` or `WGFLEET_SERVER_WEBHOOK_SECRET_FILE`.

use wgfleet_common_config::SecretString;

#[derive(Debug, Clone, Default)]
pub struct WebhookConfig {
	/// `None` means every callback is rejected.
	pub secret: Option<SecretString>,
}

impl WebhookConfig {
	pub fn new(secret: Option<SecretString>) -> Self {
		Self {
			secret: secret.filter(|s| !s.expose().is_empty()),
		}
	}

	pub fn is_configured(&self) -> bool {
		self.secret.is_some()
	}
}
