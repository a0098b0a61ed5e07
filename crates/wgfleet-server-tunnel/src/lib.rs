// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # wgfleet-server-tunnel
//!
//! The control plane's services:
//!
//! - [`ProvisioningService`]: hand a user a client config for a region,
//!   installing a fresh peer on the node when needed.
//! - [`SessionService`]: session timers driven by node callbacks.
//! - [`WebhookService`]: the authenticated callback surface nodes talk to.
//! - [`RegionService`]: region administration and self-registration.
//! - [`BootstrapService`]: one-shot setup of new nodes.
//!
//! Provisioning work for a region is serialized through [`RegionLocks`], so
//! two requests never pick the same address from the same node dump.

pub mod bootstrap;
pub mod error;
pub mod node;
pub mod notifier;
pub mod policy;
pub mod provisioning;
pub mod region_lock;
pub mod regions;
pub mod session;
pub mod webhook;

#[cfg(test)]
mod test_support;

pub use bootstrap::{BootstrapOutcome, BootstrapRequest, BootstrapService};
pub use error::{Result, TunnelError};
pub use node::NodeAccess;
pub use notifier::{SessionEvent, SessionNotifier};
pub use policy::SessionPolicy;
pub use provisioning::{PeerListing, ProvisionOptions, ProvisionedConfig, ProvisioningService};
pub use region_lock::RegionLocks;
pub use regions::{RegionRegistration, RegionService};
pub use session::{HandshakeOutcome, SessionService};
pub use webhook::{
	CheckExpiryRequest, CheckExpiryResponse, ExpiredRequest, HandshakeRequest, HandshakeResponse,
	MessageResponse, RegisterRegionRequest, RegisterRegionResponse, WebhookService,
};

use std::sync::Arc;

use sqlx::SqlitePool;
use wgfleet_server_config::ServerConfig;
use wgfleet_server_db::{PeerRepository, RegionRepository, UserRepository};
use wgfleet_tunnel_common::{ConfigRenderer, X25519KeyGenerator};

/// Every service, sharing one pool, one notifier and one lock table.
#[derive(Clone)]
pub struct TunnelServices {
	pub provisioning: ProvisioningService,
	pub sessions: SessionService,
	pub webhook: WebhookService,
	pub regions: RegionService,
	pub bootstrap: BootstrapService,
	pub notifier: Arc<SessionNotifier>,
}

impl TunnelServices {
	pub fn new(db: SqlitePool, config: &ServerConfig, node: NodeAccess) -> Self {
		let peers = Arc::new(PeerRepository::new(db.clone()));
		let region_repo = Arc::new(RegionRepository::new(db.clone()));
		let users = Arc::new(UserRepository::new(db));

		let policy = SessionPolicy::from(&config.sessions);
		let notifier = Arc::new(SessionNotifier::new());
		let renderer = Arc::new(ConfigRenderer::new(config.sessions.filtering_dns.clone()));

		let provisioning = ProvisioningService::new(
			peers.clone(),
			region_repo.clone(),
			users.clone(),
			node.clone(),
			Arc::new(X25519KeyGenerator),
			renderer,
			policy,
			Arc::new(RegionLocks::new()),
		);
		let sessions = SessionService::new(peers, users, policy, notifier.clone());
		let regions = RegionService::new(region_repo);
		let webhook = WebhookService::new(
			sessions.clone(),
			regions.clone(),
			config.webhook.secret.clone(),
		);
		let bootstrap = BootstrapService::new(
			node,
			regions.clone(),
			config.bootstrap.clone(),
			config.http.base_url.clone(),
			config.webhook.clone(),
		);

		Self {
			provisioning,
			sessions,
			webhook,
			regions,
			bootstrap,
			notifier,
		}
	}
}
