// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`RemoteExecutor`] backed by the system `ssh` binary.
//!
//! Password targets go through `sshpass -e`, which reads the password from
//! the `SSHPASS` environment variable so it never appears in argv.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use wgfleet_common_config::SecretString;

use crate::error::{RemoteError, Result};
use crate::event::{EventKind, RemoteEvent};
use crate::executor::RemoteExecutor;
use crate::target::{SshAuth, SshTarget};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_KEEPALIVE_COUNT: u32 = 3;
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// ssh reserves 255 for its own failures.
const SSH_CONNECT_FAILURE: i32 = 255;
/// sshpass: 5 = wrong password, 6 = unknown host key.
const SSHPASS_CONNECT_FAILURES: [i32; 2] = [5, 6];

#[derive(Debug, Clone)]
pub struct SshOptions {
	pub connect_timeout: Duration,
	pub keepalive_interval: Duration,
	pub keepalive_count: u32,
	/// Upper bound on the whole invocation, connect included.
	pub command_timeout: Duration,
	pub strict_host_keys: bool,
	pub known_hosts_file: Option<PathBuf>,
	pub ssh_program: String,
	pub sshpass_program: String,
}

impl Default for SshOptions {
	fn default() -> Self {
		Self {
			connect_timeout: DEFAULT_CONNECT_TIMEOUT,
			keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
			keepalive_count: DEFAULT_KEEPALIVE_COUNT,
			command_timeout: DEFAULT_COMMAND_TIMEOUT,
			strict_host_keys: false,
			known_hosts_file: None,
			ssh_program: "ssh".to_string(),
			sshpass_program: "sshpass".to_string(),
		}
	}
}

#[derive(Debug)]
struct Invocation {
	program: String,
	args: Vec<String>,
	password: Option<SecretString>,
}

impl Invocation {
	fn uses_sshpass(&self) -> bool {
		self.password.is_some()
	}
}

#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
	options: SshOptions,
}

impl SshExecutor {
	pub fn new(options: SshOptions) -> Self {
		Self { options }
	}

	pub fn options(&self) -> &SshOptions {
		&self.options
	}

	fn invocation(&self, target: &SshTarget, command: &str) -> Result<Invocation> {
		let auth = target
			.credentials
			.auth()
			.ok_or_else(|| RemoteError::Connect {
				host: target.host.clone(),
				reason: "no private key or password configured".to_string(),
			})?;

		let opts = &self.options;
		let mut args: Vec<String> = vec!["-T".to_string()];

		if opts.strict_host_keys {
			push_option(&mut args, "StrictHostKeyChecking=yes".to_string());
			if let Some(path) = &opts.known_hosts_file {
				push_option(&mut args, format!("UserKnownHostsFile={}", path.display()));
			}
		} else {
			push_option(&mut args, "StrictHostKeyChecking=no".to_string());
			push_option(&mut args, "UserKnownHostsFile=/dev/null".to_string());
		}
		push_option(&mut args, "LogLevel=ERROR".to_string());
		push_option(&mut args, format!("ConnectTimeout={}", opts.connect_timeout.as_secs()));
		push_option(
			&mut args,
			format!("ServerAliveInterval={}", opts.keepalive_interval.as_secs()),
		);
		push_option(&mut args, format!("ServerAliveCountMax={}", opts.keepalive_count));

		let (program, password) = match auth {
			SshAuth::Key(path) => {
				push_option(&mut args, "BatchMode=yes".to_string());
				push_option(&mut args, "IdentitiesOnly=yes".to_string());
				args.push("-i".to_string());
				args.push(path.display().to_string());
				(opts.ssh_program.clone(), None)
			}
			SshAuth::Password(password) => {
				push_option(&mut args, "PubkeyAuthentication=no".to_string());
				args.splice(0..0, ["-e".to_string(), opts.ssh_program.clone()]);
				(opts.sshpass_program.clone(), Some(password.clone()))
			}
		};

		args.push("-p".to_string());
		args.push(target.port.to_string());
		args.push(target.destination());
		args.push("--".to_string());
		args.push(command.to_string());

		Ok(Invocation {
			program,
			args,
			password,
		})
	}

	async fn execute(
		&self,
		target: &SshTarget,
		command: &str,
		events: Option<&mpsc::Sender<RemoteEvent>>,
	) -> Result<String> {
		let invocation = self.invocation(target, command)?;

		let mut cmd = Command::new(&invocation.program);
		cmd
			.args(&invocation.args)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);
		if let Some(password) = &invocation.password {
			cmd.env("SSHPASS", password.expose());
		}

		emit(events, RemoteEvent::info(format!("Connecting to {}", target.host))).await;

		let mut child = cmd.spawn().map_err(RemoteError::Spawn)?;
		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| RemoteError::Spawn(std::io::Error::other("stdout not captured")))?;
		let stderr = child
			.stderr
			.take()
			.ok_or_else(|| RemoteError::Spawn(std::io::Error::other("stderr not captured")))?;

		let work = async {
			let (out, err) = tokio::join!(
				pump_lines(stdout, EventKind::Log, events),
				pump_lines(stderr, EventKind::Error, events),
			);
			let status = child.wait().await;
			(out, err, status)
		};

		let outcome = tokio::time::timeout(self.options.command_timeout, work).await;
		let (out, err, status) = match outcome {
			Ok(result) => result,
			Err(_) => {
				let _ = child.start_kill();
				warn!(
					host = %target.host,
					timeout_secs = self.options.command_timeout.as_secs(),
					"remote command timed out"
				);
				emit(events, RemoteEvent::error("Command timed out")).await;
				return Err(RemoteError::CommandFailed {
					exit_code: None,
					output: "timed out".to_string(),
				});
			}
		};

		let stdout = out.map_err(RemoteError::Spawn)?;
		let stderr = err.map_err(RemoteError::Spawn)?;
		let status = status.map_err(RemoteError::Spawn)?;

		let result = classify_exit(
			&target.host,
			status.code(),
			invocation.uses_sshpass(),
			&stdout,
			&stderr,
		);

		match &result {
			Ok(_) => {
				debug!(host = %target.host, "remote command succeeded");
				emit(events, RemoteEvent::success("Command completed")).await;
			}
			Err(e) => {
				warn!(host = %target.host, error = %e, "remote command failed");
				emit(events, RemoteEvent::error(e.to_string())).await;
			}
		}

		result
	}
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
	#[instrument(skip(self, target, command), fields(host = %target.host, port = target.port))]
	async fn run(&self, target: &SshTarget, command: &str) -> Result<String> {
		self.execute(target, command, None).await
	}

	#[instrument(skip(self, target, command, events), fields(host = %target.host, port = target.port))]
	async fn run_streaming(
		&self,
		target: &SshTarget,
		command: &str,
		events: mpsc::Sender<RemoteEvent>,
	) -> Result<String> {
		self.execute(target, command, Some(&events)).await
	}
}

fn push_option(args: &mut Vec<String>, value: String) {
	args.push("-o".to_string());
	args.push(value);
}

fn classify_exit(
	host: &str,
	code: Option<i32>,
	via_sshpass: bool,
	stdout: &str,
	stderr: &str,
) -> Result<String> {
	match code {
		Some(0) => Ok(stdout.trim().to_string()),
		Some(code)
			if code == SSH_CONNECT_FAILURE
				|| (via_sshpass && SSHPASS_CONNECT_FAILURES.contains(&code)) =>
		{
			let reason = match stderr.trim() {
				"" => format!("ssh exited with status {code}"),
				msg => msg.to_string(),
			};
			Err(RemoteError::Connect {
				host: host.to_string(),
				reason,
			})
		}
		code => {
			let output = match stderr.trim() {
				"" => stdout.trim(),
				msg => msg,
			};
			Err(RemoteError::CommandFailed {
				exit_code: code,
				output: output.to_string(),
			})
		}
	}
}

async fn emit(events: Option<&mpsc::Sender<RemoteEvent>>, event: RemoteEvent) {
	if let Some(tx) = events {
		let _ = tx.send(event).await;
	}
}

/// Read `reader` to EOF, forwarding each line to `events` as `kind`.
///
/// Returns everything read. Forwarding stops quietly once the receiver is
/// gone; reading continues so the child never blocks on a full pipe.
async fn pump_lines<R>(
	reader: R,
	kind: EventKind,
	events: Option<&mpsc::Sender<RemoteEvent>>,
) -> std::io::Result<String>
where
	R: AsyncRead + Unpin,
{
	let mut reader = BufReader::new(reader);
	let mut collected = String::new();
	let mut buf = Vec::new();
	let mut listening = events.is_some();

	loop {
		buf.clear();
		if reader.read_until(b'\n', &mut buf).await? == 0 {
			break;
		}
		let line = String::from_utf8_lossy(&buf);
		collected.push_str(&line);

		if listening {
			if let Some(tx) = events {
				let text = line.trim_end_matches(['\n', '\r']);
				if tx.send(RemoteEvent::new(kind, text)).await.is_err() {
					listening = false;
				}
			}
		}
	}

	Ok(collected)
}
