// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration primitives shared by the wgfleet crates.
//!
//! - [`Secret`] keeps webhook secrets, SSH passwords and WireGuard private
//!   keys out of logs and config dumps.
//! - [`load_secret_env`] reads secrets with the `VAR` / `VAR_FILE` convention.

pub mod env;
pub mod secret;

pub use env::{load_secret_env, require_secret_env, RequiredSecretError, SecretEnvError};
pub use secret::{Secret, SecretString, REDACTED};
