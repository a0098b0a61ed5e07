// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the wgfleet server.
//!
//! Layers, lowest to highest precedence: built-in defaults, a TOML file
//! (`/etc/wgfleet/server.toml` unless another path is given) and
//! `WGFLEET_SERVER_*` environment variables.
//!
//! ```ignore
//! let config = wgfleet_server_config::load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use std::path::PathBuf;

use tracing::{debug, info};
use wgfleet_common_config::load_secret_env;

pub const WEBHOOK_SECRET_ENV: &str = "WGFLEET_SERVER_WEBHOOK_SECRET";
pub const SSH_PASSWORD_ENV: &str = "WGFLEET_SERVER_SSH_PASSWORD";

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub ssh: SshConfig,
	pub sessions: SessionsConfig,
	pub webhook: WebhookConfig,
	pub bootstrap: BootstrapConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Like [`load_config`] but with an explicit file, which must exist.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![Box::new(EnvSource)])
}

fn load_from_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let webhook_secret =
		load_secret_env(WEBHOOK_SECRET_ENV).map_err(|e| ConfigError::Secret(e.to_string()))?;
	let ssh_password =
		load_secret_env(SSH_PASSWORD_ENV).map_err(|e| ConfigError::Secret(e.to_string()))?;

	let config = finalize(merged, WebhookConfig::new(webhook_secret), ssh_password)?;

	info!(
		addr = %config.socket_addr(),
		base_url = %config.http.base_url,
		database = %config.database.url,
		ssh_user = %config.ssh.user,
		ssh_credentials = config.ssh.has_credentials(),
		strict_host_keys = config.ssh.strict_host_keys,
		webhook_secret_configured = config.webhook.is_configured(),
		free_minutes = config.sessions.free_minutes.get(),
		paid_minutes = config.sessions.paid_minutes.get(),
		"Server configuration loaded"
	);

	Ok(config)
}

fn finalize(
	layer: ServerConfigLayer,
	webhook: WebhookConfig,
	ssh_password: Option<wgfleet_common_config::SecretString>,
) -> Result<ServerConfig, ConfigError> {
	let config = ServerConfig {
		http: layer.http.unwrap_or_default().finalize(),
		database: layer.database.unwrap_or_default().finalize(),
		ssh: layer.ssh.unwrap_or_default().finalize(ssh_password),
		sessions: layer.sessions.unwrap_or_default().finalize(),
		webhook,
		bootstrap: layer.bootstrap.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;
	Ok(config)
}

/// Cross-field rules that a single section cannot check.
fn validate_config(config: &ServerConfig) -> Result<(), ConfigError> {
	let ssh = &config.ssh;
	if ssh.connect_timeout.is_zero() || ssh.command_timeout.is_zero() {
		return Err(ConfigError::Validation(
			"ssh connect and command timeouts must be non-zero".to_string(),
		));
	}
	if ssh.command_timeout < ssh.connect_timeout {
		return Err(ConfigError::Validation(format!(
			"ssh command timeout ({}s) is shorter than the connect timeout ({}s)",
			ssh.command_timeout.as_secs(),
			ssh.connect_timeout.as_secs()
		)));
	}
	if ssh.strict_host_keys && ssh.known_hosts_file.is_none() {
		return Err(ConfigError::Validation(
			"ssh.strict_host_keys requires ssh.known_hosts_file".to_string(),
		));
	}

	Ok(())
}
