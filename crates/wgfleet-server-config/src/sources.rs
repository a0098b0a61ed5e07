// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::ServerConfigLayer;
use crate::sections::{
	BootstrapConfigLayer, DatabaseConfigLayer, HttpConfigLayer, LogFormat, LoggingConfigLayer,
	SessionsConfigLayer, SshConfigLayer,
};

pub const SYSTEM_CONFIG_PATH: &str = "/etc/wgfleet/server.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		Ok(ServerConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
	required: bool,
}

impl TomlSource {
	/// An explicitly requested file; missing is an error.
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			required: true,
		}
	}

	/// The system-wide file; skipped when absent.
	pub fn system() -> Self {
		Self {
			path: PathBuf::from(SYSTEM_CONFIG_PATH),
			required: false,
		}
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.required && !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `WGFLEET_SERVER_<SECTION>_<FIELD>`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()),
			ssh: Some(load_ssh_from_env()?),
			sessions: Some(load_sessions_from_env()?),
			bootstrap: Some(load_bootstrap_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: std::str::FromStr>(name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {kind} value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	env_parse(name, "u16")
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	env_parse(name, "u32")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	env_parse(name, "u64")
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("WGFLEET_SERVER_HOST"),
		port: env_u16("WGFLEET_SERVER_PORT")?,
		base_url: env_var("WGFLEET_SERVER_BASE_URL"),
	})
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("WGFLEET_SERVER_DATABASE_URL"),
	}
}

fn load_ssh_from_env() -> Result<SshConfigLayer, ConfigError> {
	Ok(SshConfigLayer {
		user: env_var("WGFLEET_SERVER_SSH_USER"),
		port: env_u16("WGFLEET_SERVER_SSH_PORT")?,
		private_key_path: env_var("WGFLEET_SERVER_SSH_PRIVATE_KEY_PATH").map(PathBuf::from),
		connect_timeout_secs: env_u64("WGFLEET_SERVER_SSH_CONNECT_TIMEOUT_SECS")?,
		keepalive_interval_secs: env_u64("WGFLEET_SERVER_SSH_KEEPALIVE_INTERVAL_SECS")?,
		keepalive_count: env_u32("WGFLEET_SERVER_SSH_KEEPALIVE_COUNT")?,
		command_timeout_secs: env_u64("WGFLEET_SERVER_SSH_COMMAND_TIMEOUT_SECS")?,
		peer_script: env_var("WGFLEET_SERVER_SSH_PEER_SCRIPT"),
		strict_host_keys: env_bool("WGFLEET_SERVER_SSH_STRICT_HOST_KEYS"),
		known_hosts_file: env_var("WGFLEET_SERVER_SSH_KNOWN_HOSTS_FILE").map(PathBuf::from),
	})
}

fn load_sessions_from_env() -> Result<SessionsConfigLayer, ConfigError> {
	Ok(SessionsConfigLayer {
		free_minutes: env_parse("WGFLEET_SERVER_SESSIONS_FREE_MINUTES", "positive u32")?,
		paid_minutes: env_parse("WGFLEET_SERVER_SESSIONS_PAID_MINUTES", "positive u32")?,
		free_max_regions: env_u32("WGFLEET_SERVER_SESSIONS_FREE_MAX_REGIONS")?,
		filtering_dns: env_var("WGFLEET_SERVER_SESSIONS_FILTERING_DNS"),
	})
}

fn load_bootstrap_from_env() -> Result<BootstrapConfigLayer, ConfigError> {
	Ok(BootstrapConfigLayer {
		script_path: env_var("WGFLEET_SERVER_BOOTSTRAP_SCRIPT_PATH").map(PathBuf::from),
		remote_path: env_var("WGFLEET_SERVER_BOOTSTRAP_REMOTE_PATH"),
		listen_port: env_u16("WGFLEET_SERVER_BOOTSTRAP_LISTEN_PORT")?,
		default_dns: env_var("WGFLEET_SERVER_BOOTSTRAP_DEFAULT_DNS"),
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = match env_var("WGFLEET_SERVER_LOG_FORMAT") {
		Some(v) => Some(v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
			key: "WGFLEET_SERVER_LOG_FORMAT".to_string(),
			message,
		})?),
		None => None,
	};

	Ok(LoggingConfigLayer {
		level: env_var("WGFLEET_SERVER_LOG_LEVEL"),
		format,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.http.is_none());
		assert!(layer.ssh.is_none());
	}

	#[test]
	fn missing_system_file_is_skipped() {
		let source = TomlSource {
			path: PathBuf::from("/nonexistent/wgfleet/server.toml"),
			required: false,
		};
		assert!(source.load().unwrap().http.is_none());
	}

	#[test]
	fn missing_explicit_file_is_an_error() {
		let err = TomlSource::new("/nonexistent/wgfleet/server.toml")
			.load()
			.unwrap_err();
		assert!(matches!(err, ConfigError::FileRead { .. }));
	}

	#[test]
	fn reads_toml_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[ssh]\nuser = \"ubuntu\"\nstrict_host_keys = true\n\n[bootstrap]\nlisten_port = 51999"
		)
		.unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let ssh = layer.ssh.unwrap();
		assert_eq!(ssh.user.as_deref(), Some("ubuntu"));
		assert_eq!(ssh.strict_host_keys, Some(true));
		assert_eq!(layer.bootstrap.unwrap().listen_port, Some(51999));
	}

	#[test]
	fn malformed_toml_is_a_parse_error() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[ssh\nuser = ").unwrap();
		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn env_parse_reports_key() {
		std::env::set_var("WGFLEET_TEST_BAD_PORT", "not-a-port");
		let err = env_u16("WGFLEET_TEST_BAD_PORT").unwrap_err();
		std::env::remove_var("WGFLEET_TEST_BAD_PORT");
		match err {
			ConfigError::InvalidValue { key, .. } => assert_eq!(key, "WGFLEET_TEST_BAD_PORT"),
			other => panic!("unexpected: {other:?}"),
		}
	}
}
