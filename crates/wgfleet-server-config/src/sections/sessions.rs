// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-tier session length and quota.

use std::num::NonZeroU32;

use serde::Deserialize;

pub const DEFAULT_FREE_SESSION_MINUTES: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);
pub const DEFAULT_PAID_SESSION_MINUTES: NonZeroU32 = NonZeroU32::MIN.saturating_add(59);
pub const DEFAULT_FREE_MAX_REGIONS: u32 = 2;
pub const DEFAULT_FILTERING_DNS: &str = "94.140.14.14";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionsConfig {
	/// Zero is rejected at parse time; unlimited is only a per-peer override.
	pub free_minutes: NonZeroU32,
	pub paid_minutes: NonZeroU32,
	/// Maximum simultaneously active peers for a free user.
	pub free_max_regions: u32,
	/// Resolver handed out when content filtering is on.
	pub filtering_dns: String,
}

impl Default for SessionsConfig {
	fn default() -> Self {
		SessionsConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionsConfigLayer {
	#[serde(default)]
	pub free_minutes: Option<NonZeroU32>,
	#[serde(default)]
	pub paid_minutes: Option<NonZeroU32>,
	#[serde(default)]
	pub free_max_regions: Option<u32>,
	#[serde(default)]
	pub filtering_dns: Option<String>,
}

impl SessionsConfigLayer {
	pub fn merge(&mut self, other: SessionsConfigLayer) {
		if other.free_minutes.is_some() {
			self.free_minutes = other.free_minutes;
		}
		if other.paid_minutes.is_some() {
			self.paid_minutes = other.paid_minutes;
		}
		if other.free_max_regions.is_some() {
			self.free_max_regions = other.free_max_regions;
		}
		if other.filtering_dns.is_some() {
			self.filtering_dns = other.filtering_dns;
		}
	}

	pub fn finalize(self) -> SessionsConfig {
		SessionsConfig {
			free_minutes: self.free_minutes.unwrap_or(DEFAULT_FREE_SESSION_MINUTES),
			paid_minutes: self.paid_minutes.unwrap_or(DEFAULT_PAID_SESSION_MINUTES),
			free_max_regions: self.free_max_regions.unwrap_or(DEFAULT_FREE_MAX_REGIONS),
			filtering_dns: self
				.filtering_dns
				.unwrap_or_else(|| DEFAULT_FILTERING_DNS.to_string()),
		}
	}
}
