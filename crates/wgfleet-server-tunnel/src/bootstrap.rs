// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot setup of a fresh edge node.
//!
//! The bootstrap script is shipped inline over SSH, run as root and asked to
//! call back into the webhook surface. When the node prints its identity the
//! region is registered right away; otherwise an operator finishes by hand.

use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use wgfleet_common_config::SecretString;
use wgfleet_server_config::{BootstrapConfig, WebhookConfig};
use wgfleet_server_remote::{
	bootstrap_command, extract_report, BootstrapArgs, RemoteEvent, SshTarget,
};
use wgfleet_tunnel_common::{Region, SubnetPrefix};

use crate::error::{Result, TunnelError};
use crate::node::NodeAccess;
use crate::regions::{RegionRegistration, RegionService};

#[derive(Debug, Clone)]
pub struct BootstrapRequest {
	pub host: String,
	/// Overrides the fleet-wide SSH user.
	pub username: Option<String>,
	pub base_ip: String,
	pub region_id: String,
	pub region_name: Option<String>,
	/// Used when no fleet-wide key or password is configured.
	pub password: Option<SecretString>,
}

#[derive(Debug)]
pub struct BootstrapOutcome {
	/// Full stdout of the script.
	pub output: String,
	/// Set when the node reported its identity and was registered.
	pub region: Option<Region>,
	/// Why registration was skipped.
	pub warning: Option<TunnelError>,
}

impl BootstrapOutcome {
	/// The node is set up but the region still has to be registered by hand.
	pub fn manual_follow_up(&self) -> bool {
		self.region.is_none()
	}
}

#[derive(Clone)]
pub struct BootstrapService {
	node: NodeAccess,
	regions: RegionService,
	config: BootstrapConfig,
	callback_url: String,
	webhook: WebhookConfig,
}

impl BootstrapService {
	pub fn new(
		node: NodeAccess,
		regions: RegionService,
		config: BootstrapConfig,
		callback_url: impl Into<String>,
		webhook: WebhookConfig,
	) -> Self {
		Self {
			node,
			regions,
			config,
			callback_url: callback_url.into(),
			webhook,
		}
	}

	fn target(&self, request: &BootstrapRequest) -> Result<SshTarget> {
		let mut target = self.node.target(&request.host);
		if let Some(username) = &request.username {
			target.username = username.clone();
		}
		if let Some(password) = &request.password {
			target.credentials.password = Some(password.clone());
		}
		if target.credentials.auth().is_none() {
			return Err(TunnelError::InvalidRequest(
				"an SSH key or password is required to bootstrap a node".to_string(),
			));
		}
		Ok(target)
	}

	/// Run the bootstrap script on `request.host`, forwarding its output to
	/// `events` as it arrives.
	///
	/// A script that fails or cannot be reached is an error. A script that
	/// succeeds without printing a usable identity is not: the outcome carries
	/// the reason and no region.
	#[instrument(skip(self, request, events), fields(host = %request.host, region_id = %request.region_id))]
	pub async fn bootstrap(
		&self,
		request: BootstrapRequest,
		events: mpsc::Sender<RemoteEvent>,
	) -> Result<BootstrapOutcome> {
		let prefix = request
			.base_ip
			.parse::<SubnetPrefix>()
			.map_err(|e| TunnelError::InvalidRequest(e.to_string()))?;
		if request.region_id.trim().is_empty() {
			return Err(TunnelError::InvalidRequest("regionId is required".to_string()));
		}
		let target = self.target(&request)?;

		let script = tokio::fs::read(&self.config.script_path).await.map_err(|e| {
			TunnelError::Internal(format!(
				"cannot read bootstrap script {}: {e}",
				self.config.script_path.display()
			))
		})?;

		// An unset secret still lets the node come up; its callbacks are
		// rejected until one is configured.
		let secret = self.webhook.secret.as_ref().map(|s| s.expose().as_str()).unwrap_or("");
		if secret.is_empty() {
			warn!("webhook secret is not configured; node callbacks will be rejected");
		}

		let command = bootstrap_command(
			&script,
			&self.config.remote_path,
			BootstrapArgs {
				subnet_prefix: prefix,
				region_id: &request.region_id,
				callback_url: &self.callback_url,
				secret,
			},
		);

		let output = self
			.node
			.executor()
			.run_streaming(&target, &command, events.clone())
			.await?;
		info!("bootstrap script finished");

		let report = match extract_report(&output) {
			Ok(report) => report,
			Err(e) => {
				warn!(error = %e, "node identity missing from bootstrap output");
				let _ = events
					.send(RemoteEvent::error(format!(
						"{e}; register the region manually"
					)))
					.await;
				return Ok(BootstrapOutcome {
					output,
					region: None,
					warning: Some(e.into()),
				});
			}
		};

		let registration = RegionRegistration {
			id: request.region_id.clone(),
			name: request.region_name.clone(),
			host: request.host.clone(),
			endpoint: format!("{}:{}", report.public_ip, self.config.listen_port),
			server_public_key: report.server_public_key.to_base64(),
			base_ip: prefix.to_string(),
			dns: Some(self.config.default_dns.clone()),
		};
		let region = match self.regions.register(registration).await {
			Ok(region) => region,
			Err(e) => {
				warn!(error = %e, "auto-registration failed");
				let _ = events
					.send(RemoteEvent::error(format!(
						"region registration failed: {e}"
					)))
					.await;
				return Ok(BootstrapOutcome {
					output,
					region: None,
					warning: Some(e),
				});
			}
		};

		let _ = events
			.send(RemoteEvent::info(format!(
				"Region {} registered at {}",
				region.id, region.endpoint
			)))
			.await;
		Ok(BootstrapOutcome {
			output,
			region: Some(region),
			warning: None,
		})
	}
}
