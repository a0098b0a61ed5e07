// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::num::NonZeroU32;

use wgfleet_server_config::SessionsConfig;
use wgfleet_tunnel_common::{PlanTier, SessionDuration};

/// Per-tier session length and active peer quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
	pub free_minutes: NonZeroU32,
	pub paid_minutes: NonZeroU32,
	pub free_max_active: u32,
}

impl Default for SessionPolicy {
	fn default() -> Self {
		Self::from(&SessionsConfig::default())
	}
}

impl From<&SessionsConfig> for SessionPolicy {
	fn from(config: &SessionsConfig) -> Self {
		Self {
			free_minutes: config.free_minutes,
			paid_minutes: config.paid_minutes,
			free_max_active: config.free_max_regions,
		}
	}
}

impl SessionPolicy {
	/// The per-peer override wins over the plan.
	pub fn session_duration(&self, plan: PlanTier, overridden: Option<SessionDuration>) -> SessionDuration {
		overridden.unwrap_or(match plan {
			PlanTier::Free => SessionDuration::Minutes(self.free_minutes),
			PlanTier::Paid => SessionDuration::Minutes(self.paid_minutes),
		})
	}

	/// `None` is unlimited.
	pub fn max_active_peers(&self, plan: PlanTier) -> Option<u32> {
		match plan {
			PlanTier::Free => Some(self.free_max_active),
			PlanTier::Paid => None,
		}
	}
}
