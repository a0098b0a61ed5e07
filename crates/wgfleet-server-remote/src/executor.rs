// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::RemoteEvent;
use crate::target::SshTarget;

/// Runs shell commands on a remote host.
///
/// One connection per call; nothing is pooled. Implementations must never
/// log `command`, since it can carry credentials.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
	/// Run `command` and return its trimmed stdout.
	async fn run(&self, target: &SshTarget, command: &str) -> Result<String>;

	/// Run `command`, forwarding each output line to `events` as it arrives.
	///
	/// The executor owns the connection events: one `info` before the
	/// command starts, then a single `success` or `error` once it exits or
	/// times out. Callers add only their own follow-up events. A dropped receiver does not abort
	/// the command.
	async fn run_streaming(
		&self,
		target: &SshTarget,
		command: &str,
		events: mpsc::Sender<RemoteEvent>,
	) -> Result<String>;
}
