// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! wgfleet control plane HTTP server.
//!
//! Serves the callback surface edge nodes talk to. Everything else lives in
//! `wgfleet-server-tunnel`; this crate only maps HTTP onto it.

pub mod api;
pub mod error;
pub mod routes;
pub mod telemetry;
pub mod version;

pub use api::{create_app_state, create_router, AppState};
pub use error::{ErrorResponse, ServerError};
pub use wgfleet_server_config::ServerConfig;
