// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer provisioning: reuse a live peer, or mint a new one on the node.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use wgfleet_common_config::SecretString;
use wgfleet_server_db::{PeerStore, RegionStore, UserStore};
use wgfleet_server_remote::PeerCommand;
use wgfleet_tunnel_common::{
	allocate, config_filename, ConfigRenderer, KeyGenerator, Peer, PeerFeatures, PeerRecord, Region,
	SessionDuration, SessionState, SubnetPrefix, User, WgPublicKey,
};

use crate::error::{Result, TunnelError};
use crate::node::NodeAccess;
use crate::policy::SessionPolicy;
use crate::region_lock::RegionLocks;

/// Per-peer settings chosen by an administrator. Authorization happens
/// before these reach the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisionOptions {
	pub session_override: Option<SessionDuration>,
	pub features: PeerFeatures,
}

#[derive(Debug, Clone)]
pub struct ProvisionedConfig {
	pub region_id: String,
	/// Suggested download name.
	pub filename: String,
	pub address: Ipv4Addr,
	pub public_key: WgPublicKey,
	/// Rendered client config. Holds the client private key.
	pub config: SecretString,
	/// An existing peer was rendered again; the node was not touched.
	pub reused: bool,
}

/// A user's peer as shown in their dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerListing {
	pub region_id: String,
	pub region_name: Option<String>,
	pub address: Ipv4Addr,
	pub public_key: WgPublicKey,
	pub is_active: bool,
	pub session_state: SessionState,
	pub first_handshake_at: Option<DateTime<Utc>>,
	pub expires_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ProvisioningService {
	peers: Arc<dyn PeerStore>,
	regions: Arc<dyn RegionStore>,
	users: Arc<dyn UserStore>,
	node: NodeAccess,
	keys: Arc<dyn KeyGenerator>,
	renderer: Arc<ConfigRenderer>,
	policy: SessionPolicy,
	locks: Arc<RegionLocks>,
}

impl ProvisioningService {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		peers: Arc<dyn PeerStore>,
		regions: Arc<dyn RegionStore>,
		users: Arc<dyn UserStore>,
		node: NodeAccess,
		keys: Arc<dyn KeyGenerator>,
		renderer: Arc<ConfigRenderer>,
		policy: SessionPolicy,
		locks: Arc<RegionLocks>,
	) -> Self {
		Self {
			peers,
			regions,
			users,
			node,
			keys,
			renderer,
			policy,
			locks,
		}
	}

	/// Return a client config for `user_id` in `region_id`.
	///
	/// A live (pending or running) peer is rendered as is. Otherwise a new
	/// keypair and address are installed on the node and persisted. Once past
	/// the quota check the work runs on its own task, so dropping the caller
	/// does not abandon a half-applied node change.
	#[instrument(skip(self, options), fields(%user_id, %region_id))]
	pub async fn provision(
		&self,
		user_id: Uuid,
		region_id: &str,
		options: ProvisionOptions,
	) -> Result<ProvisionedConfig> {
		let region = self.active_region(region_id).await?;
		let prefix = region.subnet_prefix()?;

		let user = self
			.users
			.get_user(user_id)
			.await?
			.ok_or(TunnelError::UserNotFound(user_id))?;

		let now = Utc::now();
		match self.peers.find_active_peer(user_id, region_id).await? {
			Some(peer) if peer.session_state(now) != SessionState::Expired => {
				debug!(peer_id = %peer.id, "reusing live peer");
				return Ok(self.rendered(&peer, &region, true));
			}
			Some(peer) => {
				info!(peer_id = %peer.id, "retiring expired peer");
				self.peers.mark_inactive(peer.id, now).await?;
			}
			None => self.enforce_quota(&user).await?,
		}

		let this = self.clone();
		tokio::spawn(async move { this.install_peer(user_id, region, prefix, options).await })
			.await
			.map_err(|e| TunnelError::Internal(format!("provisioning task failed: {e}")))?
	}

	async fn active_region(&self, region_id: &str) -> Result<Region> {
		match self.regions.get_region(region_id).await? {
			Some(region) if region.is_active => Ok(region),
			Some(_) => Err(TunnelError::InvalidRegion(format!("{region_id} is disabled"))),
			None => Err(TunnelError::InvalidRegion(format!("{region_id} does not exist"))),
		}
	}

	async fn enforce_quota(&self, user: &User) -> Result<()> {
		let Some(limit) = self.policy.max_active_peers(user.plan) else {
			return Ok(());
		};
		let active = self.peers.count_active_peers(user.id).await?;
		if active >= i64::from(limit) {
			info!(user_id = %user.id, active, limit, "active peer quota reached");
			return Err(TunnelError::QuotaExceeded { limit });
		}
		Ok(())
	}

	/// Dump, allocate and add under the region lock, then persist.
	async fn install_peer(
		&self,
		user_id: Uuid,
		region: Region,
		prefix: SubnetPrefix,
		options: ProvisionOptions,
	) -> Result<ProvisionedConfig> {
		let _guard = self.locks.lock(&region.id).await;

		// A concurrent request for the same user may have won the lock first.
		let now = Utc::now();
		if let Some(peer) = self.peers.find_active_peer(user_id, &region.id).await? {
			if peer.session_state(now) != SessionState::Expired {
				debug!(peer_id = %peer.id, "peer provisioned by concurrent request");
				return Ok(self.rendered(&peer, &region, true));
			}
			self.peers.mark_inactive(peer.id, now).await?;
		}

		let keypair = self.keys.generate();
		let public_key = *keypair.public_key();

		let dump = self
			.node
			.run_peer_command(&region.host, &PeerCommand::Dump)
			.await?;
		let address = allocate(&prefix, &dump)?;

		self
			.node
			.run_peer_command(
				&region.host,
				&PeerCommand::AddPeer {
					public_key,
					address,
				},
			)
			.await?;

		let record = PeerRecord {
			user_id,
			region_id: region.id.clone(),
			keypair,
			address,
			session_override: options.session_override,
			features: options.features,
		};

		let peer = match self.peers.upsert_peer(&record, Utc::now()).await {
			Ok(peer) => peer,
			Err(e) => {
				warn!(error = %e, public_key = %public_key.short(), "failed to persist peer, removing it from node");
				if let Err(cleanup) = self
					.node
					.run_peer_command(&region.host, &PeerCommand::RemovePeer { public_key })
					.await
				{
					warn!(error = %cleanup, "node cleanup failed; peer left orphaned");
				}
				return Err(e.into());
			}
		};

		info!(
			peer_id = %peer.id,
			%address,
			public_key = %public_key.short(),
			"peer provisioned"
		);
		Ok(self.rendered(&peer, &region, false))
	}

	fn rendered(&self, peer: &Peer, region: &Region, reused: bool) -> ProvisionedConfig {
		ProvisionedConfig {
			region_id: region.id.clone(),
			filename: config_filename(&region.id),
			address: peer.address,
			public_key: peer.public_key,
			config: SecretString::new(self.renderer.render_peer(peer, region)),
			reused,
		}
	}

	/// Every peer row the user owns, active or not, oldest first.
	#[instrument(skip(self), fields(%user_id))]
	pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<PeerListing>> {
		let peers = self.peers.list_peers_for_user(user_id).await?;
		let names: HashMap<String, String> = self
			.regions
			.list_regions()
			.await?
			.into_iter()
			.map(|r| (r.id, r.name))
			.collect();

		let now = Utc::now();
		Ok(peers
			.into_iter()
			.map(|peer| PeerListing {
				region_name: names.get(&peer.region_id).cloned(),
				session_state: peer.session_state(now),
				region_id: peer.region_id,
				address: peer.address,
				public_key: peer.public_key,
				is_active: peer.is_active,
				first_handshake_at: peer.first_handshake_at,
				expires_at: peer.expires_at,
				created_at: peer.created_at,
			})
			.collect())
	}

	/// Deactivate the user's peer in `region_id`, then ask the node to drop
	/// it. The row is the source of truth; a failed node call is only logged.
	#[instrument(skip(self), fields(%user_id, %region_id))]
	pub async fn revoke(&self, user_id: Uuid, region_id: &str) -> Result<()> {
		let peer = self
			.peers
			.find_peer(user_id, region_id)
			.await?
			.ok_or(TunnelError::PeerNotFound)?;
		self.peers.mark_inactive(peer.id, Utc::now()).await?;
		info!(peer_id = %peer.id, "peer revoked");

		if let Some(region) = self.regions.get_region(region_id).await? {
			let _guard = self.locks.lock(&region.id).await;
			let command = PeerCommand::RemovePeer {
				public_key: peer.public_key,
			};
			if let Err(e) = self.node.run_peer_command(&region.host, &command).await {
				warn!(error = %e, peer_id = %peer.id, "failed to remove revoked peer from node");
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{Harness, DUMP_HEADER};
	use wgfleet_server_remote::testing::Scripted;
	use wgfleet_tunnel_common::{PlanTier, RegionUpdate};

	#[tokio::test]
	async fn new_peer_gets_lowest_free_address() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		h.executor.on(
			"dump",
			Scripted::Output(format!(
				"{DUMP_HEADER}\nwg0\tpk\tpsk\t10.66.10.2/32,10.66.10.3/32\t0\t0\t0\toff"
			)),
		);

		let cfg = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap();

		assert!(!cfg.reused);
		assert_eq!(cfg.address, Ipv4Addr::new(10, 66, 10, 4));
		assert_eq!(cfg.filename, "wgfleet-fra-1.conf");
		assert!(cfg.config.expose().contains("Address = 10.66.10.4/32"));

		let commands = h.executor.commands();
		assert_eq!(commands.len(), 2);
		assert!(commands[0].ends_with(" dump"));
		assert!(commands[1].contains(&format!(
			"add-peer {} 10.66.10.4/32",
			cfg.public_key.to_base64()
		)));

		let row = h.peer_row(user, "fra-1").await;
		assert!(row.is_active);
		assert_eq!(row.address, cfg.address);
	}

	#[tokio::test]
	async fn live_peer_is_reused_without_remote_calls() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let first = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap();
		let calls_after_first = h.executor.calls().len();

		let second = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap();

		assert!(second.reused);
		assert_eq!(second.address, first.address);
		assert_eq!(second.public_key, first.public_key);
		assert_eq!(second.config.expose(), first.config.expose());
		assert_eq!(h.executor.calls().len(), calls_after_first);
	}

	#[tokio::test]
	async fn expired_peer_is_regenerated_in_place() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let first = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap();

		let past = Utc::now() - chrono::Duration::hours(1);
		h.sessions
			.handshake("fra-1", &first.public_key.to_base64(), past)
			.await
			.unwrap();

		let second = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap();
		assert!(!second.reused);
		assert_ne!(second.public_key, first.public_key);

		let row = h.peer_row(user, "fra-1").await;
		assert!(row.is_active);
		assert!(row.first_handshake_at.is_none());
		assert!(row.expires_at.is_none());
	}

	#[tokio::test]
	async fn free_tier_quota_is_enforced() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		for region in ["fra-1", "sgp-1"] {
			h.provisioning
				.provision(user, region, ProvisionOptions::default())
				.await
				.unwrap();
		}

		let calls = h.executor.calls().len();
		let err = h
			.provisioning
			.provision(user, "nyc-1", ProvisionOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::QuotaExceeded { limit: 2 }));
		assert_eq!(h.executor.calls().len(), calls);
	}

	#[tokio::test]
	async fn paid_tier_has_no_quota() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Paid).await;
		for region in ["fra-1", "sgp-1", "nyc-1"] {
			h.provisioning
				.provision(user, region, ProvisionOptions::default())
				.await
				.unwrap();
		}
	}

	#[tokio::test]
	async fn disabled_or_unknown_region_is_invalid() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Paid).await;

		let err = h
			.provisioning
			.provision(user, "atlantis", ProvisionOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::InvalidRegion(_)));

		h.region_repo
			.update_region(
				"fra-1",
				&RegionUpdate {
					is_active: Some(false),
					..Default::default()
				},
			)
			.await
			.unwrap();
		let err = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::InvalidRegion(_)));
	}

	#[tokio::test]
	async fn failed_add_peer_persists_nothing() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		h.executor.on(
			"add-peer",
			Scripted::Fail {
				exit_code: Some(1),
				output: "wg: Invalid argument".to_string(),
			},
		);

		let err = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			TunnelError::RemoteCommandFailed {
				exit_code: Some(1),
				..
			}
		));
		assert!(h.peers.find_peer(user, "fra-1").await.unwrap().is_none());
	}

	#[tokio::test]
	async fn revoke_survives_unreachable_node() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		h.peer(user, "fra-1", None).await;
		h.executor.on("remove-peer", Scripted::ConnectFailure);

		h.provisioning.revoke(user, "fra-1").await.unwrap();
		assert!(!h.peer_row(user, "fra-1").await.is_active);
	}

	#[tokio::test]
	async fn unreachable_node_is_retryable() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		h.executor.on("dump", Scripted::ConnectFailure);

		let err = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap_err();
		assert!(err.is_retryable());
	}

	#[tokio::test]
	async fn full_pool_is_reported() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		let used: Vec<String> = (2..=254).map(|n| format!("10.66.10.{n}/32")).collect();
		h.executor.on(
			"dump",
			Scripted::Output(format!("{DUMP_HEADER}\nwg0\tpk\tpsk\t{}", used.join(","))),
		);

		let err = h
			.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::PoolExhausted(_)));
	}

	#[tokio::test]
	async fn concurrent_requests_produce_one_keypair() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;

		let a = h.provisioning.clone();
		let b = h.provisioning.clone();
		let (ra, rb) = tokio::join!(
			a.provision(user, "fra-1", ProvisionOptions::default()),
			b.provision(user, "fra-1", ProvisionOptions::default()),
		);
		let (ra, rb) = (ra.unwrap(), rb.unwrap());

		assert_eq!(ra.public_key, rb.public_key);
		assert!(ra.reused ^ rb.reused);
		let adds = h
			.executor
			.commands()
			.into_iter()
			.filter(|c| c.contains("add-peer"))
			.count();
		assert_eq!(adds, 1);
	}

	#[tokio::test]
	async fn content_filter_uses_filtering_resolver() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Paid).await;
		let cfg = h
			.provisioning
			.provision(
				user,
				"fra-1",
				ProvisionOptions {
					features: PeerFeatures {
						content_filter: true,
					},
					session_override: None,
				},
			)
			.await
			.unwrap();
		assert!(cfg.config.expose().contains("DNS = 94.140.14.14\n"));
	}

	#[tokio::test]
	async fn list_and_revoke() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		h.provisioning
			.provision(user, "fra-1", ProvisionOptions::default())
			.await
			.unwrap();

		let listed = h.provisioning.list_for_user(user).await.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].region_name.as_deref(), Some("Frankfurt"));
		assert_eq!(listed[0].session_state, SessionState::Pending);

		h.provisioning.revoke(user, "fra-1").await.unwrap();
		assert!(!h.peer_row(user, "fra-1").await.is_active);
		let last = h.executor.commands().pop().unwrap();
		assert!(last.contains(&format!("remove-peer {}", listed[0].public_key.to_base64())));

		let err = h.provisioning.revoke(user, "sgp-1").await.unwrap_err();
		assert!(matches!(err, TunnelError::PeerNotFound));
	}

	#[tokio::test]
	async fn listing_keeps_provisioning_order() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Paid).await;
		for region in ["sgp-1", "fra-1", "nyc-1"] {
			h.provisioning
				.provision(user, region, ProvisionOptions::default())
				.await
				.unwrap();
		}
		h.provisioning.revoke(user, "fra-1").await.unwrap();

		let listed = h.provisioning.list_for_user(user).await.unwrap();
		let order: Vec<&str> = listed.iter().map(|p| p.region_id.as_str()).collect();
		assert_eq!(order, ["sgp-1", "fra-1", "nyc-1"]);
		assert!(!listed[1].is_active);
	}
}
