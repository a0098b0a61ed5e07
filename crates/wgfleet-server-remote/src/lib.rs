// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # wgfleet-server-remote
//!
//! Runs commands on edge nodes over SSH and knows the two programs that live
//! there: the peer-management script and the one-shot bootstrap script.
//!
//! Services depend on [`RemoteExecutor`]; production wires in
//! [`SshExecutor`], tests use `testing::ScriptedExecutor`.

pub mod bootstrap;
mod error;
pub mod event;
mod executor;
pub mod peer_script;
mod shell;
pub mod ssh;
pub mod target;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use bootstrap::{bootstrap_command, extract_report, BootstrapArgs, BootstrapReport, ExtractionError};
pub use error::{RemoteError, Result};
pub use event::{EventKind, RemoteEvent};
pub use executor::RemoteExecutor;
pub use peer_script::{PeerCommand, DEFAULT_PEER_SCRIPT};
pub use shell::shell_quote;
pub use ssh::{SshExecutor, SshOptions};
pub use target::{SshAuth, SshCredentials, SshTarget, DEFAULT_SSH_PORT};
