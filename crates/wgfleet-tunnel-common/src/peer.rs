// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioned tunnel identities. One row per user and region.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use uuid::Uuid;

use crate::keys::{WgKeyPair, WgPrivateKey, WgPublicKey};
use crate::session::{SessionDuration, SessionState};

/// Optional behaviour toggled per peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerFeatures {
	/// Hand out the filtering resolver instead of the region DNS.
	pub content_filter: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
	pub id: Uuid,
	pub user_id: Uuid,
	pub region_id: String,
	pub public_key: WgPublicKey,
	pub private_key: WgPrivateKey,
	pub address: Ipv4Addr,
	pub is_active: bool,
	pub first_handshake_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
	pub session_override: Option<SessionDuration>,
	pub features: PeerFeatures,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Peer {
	pub fn session_state(&self, now: DateTime<Utc>) -> SessionState {
		SessionState::classify(self.first_handshake_at, self.expires_at, now)
	}
}

/// Values written when a peer is (re)provisioned.
///
/// Upserting always clears the handshake and expiry so the peer starts
/// over as pending.
#[derive(Debug, Clone)]
pub struct PeerRecord {
	pub user_id: Uuid,
	pub region_id: String,
	pub keypair: WgKeyPair,
	pub address: Ipv4Addr,
	pub session_override: Option<SessionDuration>,
	pub features: PeerFeatures,
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;

	fn peer() -> Peer {
		let keypair = WgKeyPair::generate();
		let now = Utc::now();
		Peer {
			id: Uuid::new_v4(),
			user_id: Uuid::new_v4(),
			region_id: "in-mumbai".to_string(),
			public_key: *keypair.public_key(),
			private_key: keypair.private_key().clone(),
			address: Ipv4Addr::new(10, 66, 10, 2),
			is_active: true,
			first_handshake_at: None,
			expires_at: None,
			session_override: None,
			features: PeerFeatures::default(),
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn state_follows_timestamps() {
		let now = Utc::now();
		let mut p = peer();
		assert_eq!(p.session_state(now), SessionState::Pending);

		p.first_handshake_at = Some(now - Duration::minutes(2));
		p.expires_at = Some(now + Duration::minutes(3));
		assert_eq!(p.session_state(now), SessionState::Active);

		p.expires_at = Some(now - Duration::seconds(5));
		assert_eq!(p.session_state(now), SessionState::Expired);
	}

	#[test]
	fn serialized_peer_redacts_private_key() {
		let p = peer();
		let json = serde_json::to_string(&p).unwrap();
		assert!(json.contains("[REDACTED]"));
		assert!(!json.contains(p.private_key.to_base64().expose()));
	}
}
