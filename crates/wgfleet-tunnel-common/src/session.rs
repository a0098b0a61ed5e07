// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session timing: how long a peer may stay connected and where it is in
//! that window.

use std::num::NonZeroU32;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// 9999-12-31T23:59:59Z. Later instants render with a five digit year, which
/// RFC 3339 text columns cannot round-trip.
pub const LATEST_TIMESTAMP_SECS: i64 = 253_402_300_799;

/// Lifecycle position of an active peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// Provisioned, never connected. No timer is running.
	Pending,
	/// Connected at least once and either unlimited or not yet expired.
	Active,
	Expired,
}

impl SessionState {
	pub fn classify(
		first_handshake_at: Option<DateTime<Utc>>,
		expires_at: Option<DateTime<Utc>>,
		now: DateTime<Utc>,
	) -> Self {
		match (first_handshake_at, expires_at) {
			(None, _) => SessionState::Pending,
			(Some(_), Some(expires_at)) if expires_at <= now => SessionState::Expired,
			(Some(_), _) => SessionState::Active,
		}
	}
}

impl std::fmt::Display for SessionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SessionState::Pending => write!(f, "pending"),
			SessionState::Active => write!(f, "active"),
			SessionState::Expired => write!(f, "expired"),
		}
	}
}

/// Per-peer session length override.
///
/// A zero minute count is unrepresentable: `0` is the storage encoding of
/// [`SessionDuration::Unlimited`], and `{"minutes": 0}` fails to deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionDuration {
	Minutes(NonZeroU32),
	/// No expiry is ever recorded.
	Unlimited,
}

impl SessionDuration {
	/// `None` for zero.
	pub fn from_minutes(minutes: u32) -> Option<Self> {
		NonZeroU32::new(minutes).map(SessionDuration::Minutes)
	}

	/// Column encoding: `0` is unlimited, anything else a minute count.
	pub fn to_storage(self) -> i64 {
		match self {
			SessionDuration::Minutes(m) => i64::from(m.get()),
			SessionDuration::Unlimited => 0,
		}
	}

	pub fn from_storage(value: i64) -> Result<Self, ModelError> {
		if value == 0 {
			return Ok(SessionDuration::Unlimited);
		}
		u32::try_from(value)
			.ok()
			.and_then(SessionDuration::from_minutes)
			.ok_or_else(|| ModelError::InvalidSessionDuration(value.to_string()))
	}

	pub fn minutes(self) -> Option<u32> {
		match self {
			SessionDuration::Minutes(m) => Some(m.get()),
			SessionDuration::Unlimited => None,
		}
	}

	/// Expiry for a session whose first handshake happened at `start`.
	///
	/// `Ok(None)` for unlimited sessions. Fails when the expiry would land
	/// after [`LATEST_TIMESTAMP_SECS`].
	pub fn expiry_from(self, start: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ModelError> {
		let Some(minutes) = self.minutes() else {
			return Ok(None);
		};
		start
			.checked_add_signed(Duration::minutes(i64::from(minutes)))
			.filter(|expiry| expiry.timestamp() <= LATEST_TIMESTAMP_SECS)
			.map(Some)
			.ok_or_else(|| ModelError::ExpiryOutOfRange(format!("{start} + {minutes}m")))
	}
}
