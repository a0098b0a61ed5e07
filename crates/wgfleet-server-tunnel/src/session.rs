// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session timers driven by edge node callbacks.
//!
//! A peer's timer starts at its first observed handshake and never restarts
//! until the peer is reprovisioned. Nodes poll for expired keys, remove them
//! locally, then report each removal back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use wgfleet_server_db::{PeerStore, UserStore};
use wgfleet_tunnel_common::Peer;

use crate::error::{Result, TunnelError};
use crate::notifier::{SessionEvent, SessionNotifier};
use crate::policy::SessionPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
	pub expires_at: Option<DateTime<Utc>>,
	pub session_minutes: Option<u32>,
	/// An earlier handshake already started the timer; nothing was written.
	pub already_tracked: bool,
}

impl HandshakeOutcome {
	fn stored(peer: &Peer) -> Self {
		let session_minutes = match (peer.first_handshake_at, peer.expires_at) {
			(Some(start), Some(end)) => u32::try_from((end - start).num_minutes()).ok(),
			_ => None,
		};
		Self {
			expires_at: peer.expires_at,
			session_minutes,
			already_tracked: true,
		}
	}
}

/// First 8 characters of an untrusted key, for logs.
pub(crate) fn key_prefix(public_key: &str) -> String {
	public_key.chars().take(8).collect()
}

#[derive(Clone)]
pub struct SessionService {
	peers: Arc<dyn PeerStore>,
	users: Arc<dyn UserStore>,
	policy: SessionPolicy,
	notifier: Arc<SessionNotifier>,
}

impl SessionService {
	pub fn new(
		peers: Arc<dyn PeerStore>,
		users: Arc<dyn UserStore>,
		policy: SessionPolicy,
		notifier: Arc<SessionNotifier>,
	) -> Self {
		Self {
			peers,
			users,
			policy,
			notifier,
		}
	}

	/// Start the session timer for the active peer holding `public_key`.
	///
	/// Only the first handshake is recorded; later calls, including ones that
	/// lose a concurrent race, return what is stored.
	#[instrument(skip(self, public_key), fields(%region_id, public_key = %key_prefix(public_key)))]
	pub async fn handshake(
		&self,
		region_id: &str,
		public_key: &str,
		at: DateTime<Utc>,
	) -> Result<HandshakeOutcome> {
		let peer = self
			.peers
			.find_active_by_public_key(region_id, public_key)
			.await?
			.ok_or(TunnelError::PeerNotFound)?;

		if peer.first_handshake_at.is_some() {
			debug!(peer_id = %peer.id, "handshake already tracked");
			return Ok(HandshakeOutcome::stored(&peer));
		}

		let user = self
			.users
			.get_user(peer.user_id)
			.await?
			.ok_or(TunnelError::UserNotFound(peer.user_id))?;

		let duration = self.policy.session_duration(user.plan, peer.session_override);
		let expires_at = duration
			.expiry_from(at)
			.map_err(|e| TunnelError::InvalidRequest(e.to_string()))?;

		let recorded = self
			.peers
			.record_first_handshake(peer.id, at, expires_at)
			.await?;
		if !recorded {
			debug!(peer_id = %peer.id, "lost first-handshake race");
			let current = self
				.peers
				.find_active_by_public_key(region_id, public_key)
				.await?
				.ok_or(TunnelError::PeerNotFound)?;
			return Ok(HandshakeOutcome::stored(&current));
		}

		info!(
			peer_id = %peer.id,
			user_id = %peer.user_id,
			expires_at = ?expires_at,
			"session timer started"
		);

		if let (Some(expires_at), Some(session_minutes)) = (expires_at, duration.minutes()) {
			self
				.notifier
				.notify(
					peer.user_id,
					SessionEvent::TimerStarted {
						region_id: region_id.to_string(),
						expires_at,
						session_minutes,
					},
				)
				.await;
		}

		Ok(HandshakeOutcome {
			expires_at,
			session_minutes: duration.minutes(),
			already_tracked: false,
		})
	}

	/// Public keys in `region_id` whose session ended at or before `now`.
	#[instrument(skip(self), fields(%region_id))]
	pub async fn check_expiry(&self, region_id: &str, now: DateTime<Utc>) -> Result<Vec<String>> {
		let keys = self.peers.list_expired_public_keys(region_id, now).await?;
		debug!(count = keys.len(), "expired peers listed");
		Ok(keys)
	}

	/// Record that the node removed `public_key`. Unknown keys are ignored.
	#[instrument(skip(self, public_key), fields(%region_id, public_key = %key_prefix(public_key)))]
	pub async fn expired(&self, region_id: &str, public_key: &str, now: DateTime<Utc>) -> Result<usize> {
		let peers = self
			.peers
			.mark_inactive_by_public_key(region_id, public_key, now)
			.await?;

		for peer in &peers {
			info!(peer_id = %peer.id, user_id = %peer.user_id, "peer expired");
			self
				.notifier
				.notify(
					peer.user_id,
					SessionEvent::TimerExpired {
						region_id: region_id.to_string(),
					},
				)
				.await;
		}

		Ok(peers.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::Harness;
	use async_trait::async_trait;
	use chrono::Duration;
	use std::sync::Mutex;
	use uuid::Uuid;
	use wgfleet_server_db::{PeerRepository, Result as DbResult, UserRepository};
	use wgfleet_tunnel_common::{PlanTier, PeerRecord, SessionDuration};

	fn at(s: &str) -> DateTime<Utc> {
		DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
	}

	/// Answers the next key lookup with a snapshot taken before another
	/// handshake was recorded, then reads through.
	struct StaleLookup {
		inner: PeerRepository,
		snapshot: Mutex<Option<Peer>>,
	}

	#[async_trait]
	impl PeerStore for StaleLookup {
		async fn find_peer(&self, user_id: Uuid, region_id: &str) -> DbResult<Option<Peer>> {
			self.inner.find_peer(user_id, region_id).await
		}

		async fn find_active_peer(
			&self,
			user_id: Uuid,
			region_id: &str,
		) -> DbResult<Option<Peer>> {
			self.inner.find_active_peer(user_id, region_id).await
		}

		async fn find_active_by_public_key(
			&self,
			region_id: &str,
			public_key: &str,
		) -> DbResult<Option<Peer>> {
			let snapshot = self.snapshot.lock().unwrap().take();
			match snapshot {
				Some(peer) => Ok(Some(peer)),
				None => self.inner.find_active_by_public_key(region_id, public_key).await,
			}
		}

		async fn upsert_peer(&self, record: &PeerRecord, now: DateTime<Utc>) -> DbResult<Peer> {
			self.inner.upsert_peer(record, now).await
		}

		async fn mark_inactive(&self, peer_id: Uuid, now: DateTime<Utc>) -> DbResult<bool> {
			self.inner.mark_inactive(peer_id, now).await
		}

		async fn mark_inactive_by_public_key(
			&self,
			region_id: &str,
			public_key: &str,
			now: DateTime<Utc>,
		) -> DbResult<Vec<Peer>> {
			self.inner.mark_inactive_by_public_key(region_id, public_key, now).await
		}

		async fn count_active_peers(&self, user_id: Uuid) -> DbResult<i64> {
			self.inner.count_active_peers(user_id).await
		}

		async fn record_first_handshake(
			&self,
			peer_id: Uuid,
			at: DateTime<Utc>,
			expires_at: Option<DateTime<Utc>>,
		) -> DbResult<bool> {
			self.inner.record_first_handshake(peer_id, at, expires_at).await
		}

		async fn list_expired_public_keys(
			&self,
			region_id: &str,
			now: DateTime<Utc>,
		) -> DbResult<Vec<String>> {
			self.inner.list_expired_public_keys(region_id, now).await
		}

		async fn list_peers_for_user(&self, user_id: Uuid) -> DbResult<Vec<Peer>> {
			self.inner.list_peers_for_user(user_id).await
		}
	}

	#[tokio::test]
	async fn first_handshake_starts_plan_timer() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let peer = h.peer(user, "fra-1", None).await;
		let mut events = h.notifier.subscribe(user).await;

		let start = at("2025-03-01T12:00:00Z");
		let outcome = h
			.sessions
			.handshake("fra-1", &peer.public_key.to_base64(), start)
			.await
			.unwrap();

		assert!(!outcome.already_tracked);
		assert_eq!(outcome.session_minutes, Some(5));
		assert_eq!(outcome.expires_at, Some(start + Duration::minutes(5)));

		match events.recv().await.unwrap() {
			SessionEvent::TimerStarted {
				region_id,
				session_minutes,
				..
			} => {
				assert_eq!(region_id, "fra-1");
				assert_eq!(session_minutes, 5);
			}
			other => panic!("unexpected event {other:?}"),
		}
	}

	#[tokio::test]
	async fn second_handshake_returns_stored_values() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Paid).await;
		let peer = h.peer(user, "fra-1", None).await;
		let key = peer.public_key.to_base64();

		let first = h
			.sessions
			.handshake("fra-1", &key, at("2025-03-01T12:00:00Z"))
			.await
			.unwrap();
		let second = h
			.sessions
			.handshake("fra-1", &key, at("2025-03-01T12:30:00Z"))
			.await
			.unwrap();

		assert_eq!(first.expires_at, second.expires_at);
		assert_eq!(second.session_minutes, Some(60));
		assert!(second.already_tracked);
	}

	#[tokio::test]
	async fn losing_the_record_race_returns_the_winner() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let pending = h.peer(user, "fra-1", None).await;
		let key = pending.public_key.to_base64();

		let winner_start = at("2025-03-01T12:00:00Z");
		let winner = h.sessions.handshake("fra-1", &key, winner_start).await.unwrap();
		assert!(!winner.already_tracked);

		let late = SessionService::new(
			Arc::new(StaleLookup {
				inner: h.peers.clone(),
				snapshot: Mutex::new(Some(pending)),
			}),
			Arc::new(UserRepository::new(h.pool.clone())),
			SessionPolicy::default(),
			h.notifier.clone(),
		);
		let mut events = h.notifier.subscribe(user).await;

		let loser = late
			.handshake("fra-1", &key, at("2025-03-01T12:03:00Z"))
			.await
			.unwrap();
		assert!(loser.already_tracked);
		assert_eq!(loser.expires_at, Some(winner_start + Duration::minutes(5)));
		assert_eq!(loser.session_minutes, Some(5));
		assert!(events.try_recv().is_err(), "loser must not restart the timer");

		let stored = h.peer_row(user, "fra-1").await;
		assert_eq!(stored.first_handshake_at, Some(winner_start));
		assert_eq!(stored.expires_at, winner.expires_at);
	}

	#[tokio::test]
	async fn concurrent_handshakes_record_once() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let peer = h.peer(user, "fra-1", None).await;
		let key = peer.public_key.to_base64();
		let mut events = h.notifier.subscribe(user).await;

		let (a, b) = tokio::join!(
			h.sessions.handshake("fra-1", &key, at("2025-03-01T12:00:00Z")),
			h.sessions.handshake("fra-1", &key, at("2025-03-01T12:02:00Z")),
		);
		let (a, b) = (a.unwrap(), b.unwrap());

		assert_eq!(a.expires_at, b.expires_at);
		assert_eq!(
			[a.already_tracked, b.already_tracked].iter().filter(|t| !**t).count(),
			1
		);
		let stored = h.peer_row(user, "fra-1").await;
		assert_eq!(stored.expires_at, a.expires_at);

		assert!(matches!(events.recv().await.unwrap(), SessionEvent::TimerStarted { .. }));
		assert!(events.try_recv().is_err());
	}

	#[tokio::test]
	async fn unlimited_override_sets_no_expiry() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let peer = h.peer(user, "fra-1", Some(SessionDuration::Unlimited)).await;

		let outcome = h
			.sessions
			.handshake("fra-1", &peer.public_key.to_base64(), Utc::now())
			.await
			.unwrap();
		assert_eq!(outcome.expires_at, None);
		assert_eq!(outcome.session_minutes, None);

		let stored = h.peer_row(user, "fra-1").await;
		assert!(stored.first_handshake_at.is_some());
		assert!(stored.expires_at.is_none());
	}

	#[tokio::test]
	async fn unknown_key_is_peer_not_found() {
		let h = Harness::new().await;
		let err = h
			.sessions
			.handshake("fra-1", "bm9wZQ==", Utc::now())
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::PeerNotFound));
	}

	#[tokio::test]
	async fn check_expiry_includes_boundary() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let peer = h.peer(user, "fra-1", None).await;
		let key = peer.public_key.to_base64();

		let start = at("2025-03-01T12:00:00Z");
		h.sessions.handshake("fra-1", &key, start).await.unwrap();

		let before = h
			.sessions
			.check_expiry("fra-1", start + Duration::minutes(4))
			.await
			.unwrap();
		assert!(before.is_empty());

		let boundary = h
			.sessions
			.check_expiry("fra-1", start + Duration::minutes(5))
			.await
			.unwrap();
		assert_eq!(boundary, vec![key]);
	}

	#[tokio::test]
	async fn expired_marks_inactive_and_ignores_unknown() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let peer = h.peer(user, "fra-1", None).await;
		let mut events = h.notifier.subscribe(user).await;

		assert_eq!(
			h.sessions.expired("fra-1", "bm9wZQ==", Utc::now()).await.unwrap(),
			0
		);
		assert_eq!(
			h.sessions
				.expired("fra-1", &peer.public_key.to_base64(), Utc::now())
				.await
				.unwrap(),
			1
		);
		assert!(!h.peer_row(user, "fra-1").await.is_active);
		assert_eq!(
			events.recv().await.unwrap(),
			SessionEvent::TimerExpired {
				region_id: "fra-1".to_string()
			}
		);
	}

	#[test]
	fn key_prefix_handles_short_and_multibyte() {
		assert_eq!(key_prefix("hSDwCYkwp1R0i33c"), "hSDwCYkw");
		assert_eq!(key_prefix("abc"), "abc");
		assert_eq!(key_prefix("ééééééééé"), "éééééééé");
	}
}
