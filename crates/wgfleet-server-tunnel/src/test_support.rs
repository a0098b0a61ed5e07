// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Services wired to an in-memory database and a scripted node.

use std::path::Path;
use std::sync::Arc;

use uuid::Uuid;
use wgfleet_common_config::SecretString;
use wgfleet_server_config::{BootstrapConfig, SessionsConfig, SshConfig, WebhookConfig};
use wgfleet_server_db::testing::{create_test_pool, insert_user, new_region};
use wgfleet_server_db::{PeerRepository, RegionRepository, UserRepository};
use wgfleet_server_remote::testing::ScriptedExecutor;
use wgfleet_tunnel_common::{
	ConfigRenderer, Peer, PlanTier, SessionDuration, UserRole, X25519KeyGenerator,
};

use crate::bootstrap::BootstrapService;
use crate::node::NodeAccess;
use crate::notifier::SessionNotifier;
use crate::policy::SessionPolicy;
use crate::provisioning::{ProvisionOptions, ProvisioningService};
use crate::region_lock::RegionLocks;
use crate::regions::RegionService;
use crate::session::SessionService;
use crate::webhook::WebhookService;

pub(crate) const DUMP_HEADER: &str = "privkey\tpubkey\t51820\toff";
pub(crate) const SERVER_KEY: &str = "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo=";
pub(crate) const WEBHOOK_SECRET: &str = "test-secret";

pub(crate) struct Harness {
	pub pool: sqlx::SqlitePool,
	pub executor: Arc<ScriptedExecutor>,
	pub node: NodeAccess,
	pub peers: PeerRepository,
	pub region_repo: RegionRepository,
	pub notifier: Arc<SessionNotifier>,
	pub provisioning: ProvisioningService,
	pub sessions: SessionService,
	pub regions: RegionService,
	pub webhook: WebhookService,
}

impl Harness {
	/// Three active regions: `fra-1` (Frankfurt), `sgp-1` and `nyc-1`.
	pub async fn new() -> Self {
		let pool = create_test_pool().await;
		let peers = PeerRepository::new(pool.clone());
		let region_repo = RegionRepository::new(pool.clone());
		let users = Arc::new(UserRepository::new(pool.clone()));

		for (id, name) in [("fra-1", "Frankfurt"), ("sgp-1", "Singapore"), ("nyc-1", "New York")] {
			region_repo
				.create_region(&new_region(id, name), chrono::Utc::now())
				.await
				.unwrap();
		}

		let executor = Arc::new(ScriptedExecutor::new());
		let node = NodeAccess::with_executor(executor.clone(), &SshConfig::default());
		let policy = SessionPolicy::default();
		let notifier = Arc::new(SessionNotifier::new());

		let provisioning = ProvisioningService::new(
			Arc::new(peers.clone()),
			Arc::new(region_repo.clone()),
			users.clone(),
			node.clone(),
			Arc::new(X25519KeyGenerator),
			Arc::new(ConfigRenderer::new(SessionsConfig::default().filtering_dns)),
			policy,
			Arc::new(RegionLocks::new()),
		);
		let sessions = SessionService::new(Arc::new(peers.clone()), users, policy, notifier.clone());
		let regions = RegionService::new(Arc::new(region_repo.clone()));
		let webhook = WebhookService::new(
			sessions.clone(),
			regions.clone(),
			Some(SecretString::new(WEBHOOK_SECRET.to_string())),
		);

		Self {
			pool,
			executor,
			node,
			peers,
			region_repo,
			notifier,
			provisioning,
			sessions,
			regions,
			webhook,
		}
	}

	pub async fn user(&self, plan: PlanTier) -> Uuid {
		insert_user(&self.pool, plan, UserRole::User).await
	}

	/// Provision a peer through the real service and return its row.
	pub async fn peer(&self, user: Uuid, region: &str, session: Option<SessionDuration>) -> Peer {
		self.provisioning
			.provision(
				user,
				region,
				ProvisionOptions {
					session_override: session,
					..Default::default()
				},
			)
			.await
			.unwrap();
		self.peer_row(user, region).await
	}

	pub async fn peer_row(&self, user: Uuid, region: &str) -> Peer {
		self.peers.find_peer(user, region).await.unwrap().unwrap()
	}

	pub fn bootstrap_service(&self, script: &Path) -> BootstrapService {
		BootstrapService::new(
			self.node.clone(),
			self.regions.clone(),
			BootstrapConfig {
				script_path: script.to_path_buf(),
				..BootstrapConfig::default()
			},
			"http://localhost:8080",
			WebhookConfig::new(Some(SecretString::new(WEBHOOK_SECRET.to_string()))),
		)
	}
}
