// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use tracing::instrument;
use wgfleet_server_config::SshConfig;
use wgfleet_server_remote::{
	PeerCommand, RemoteError, RemoteExecutor, SshCredentials, SshExecutor, SshOptions, SshTarget,
};

/// How the control plane reaches edge nodes: one executor and one set of
/// credentials for the whole fleet.
#[derive(Clone)]
pub struct NodeAccess {
	executor: Arc<dyn RemoteExecutor>,
	username: String,
	port: u16,
	credentials: SshCredentials,
	peer_script: String,
}

impl NodeAccess {
	/// Production wiring: the system ssh client configured from `config`.
	pub fn from_config(config: &SshConfig) -> Self {
		let executor = SshExecutor::new(SshOptions {
			connect_timeout: config.connect_timeout,
			keepalive_interval: config.keepalive_interval,
			keepalive_count: config.keepalive_count,
			command_timeout: config.command_timeout,
			strict_host_keys: config.strict_host_keys,
			known_hosts_file: config.known_hosts_file.clone(),
			..SshOptions::default()
		});
		Self::with_executor(Arc::new(executor), config)
	}

	pub fn with_executor(executor: Arc<dyn RemoteExecutor>, config: &SshConfig) -> Self {
		Self {
			executor,
			username: config.user.clone(),
			port: config.port,
			credentials: SshCredentials {
				private_key: config.private_key_path.clone(),
				password: config.password.clone(),
			},
			peer_script: config.peer_script.clone(),
		}
	}

	pub fn executor(&self) -> &Arc<dyn RemoteExecutor> {
		&self.executor
	}

	pub fn target(&self, host: &str) -> SshTarget {
		SshTarget::new(host, self.username.clone(), self.credentials.clone()).with_port(self.port)
	}

	#[instrument(skip(self, command), fields(%host))]
	pub async fn run_peer_command(&self, host: &str, command: &PeerCommand) -> Result<String, RemoteError> {
		let line = command.render(&self.peer_script);
		self.executor.run(&self.target(host), &line).await
	}
}
