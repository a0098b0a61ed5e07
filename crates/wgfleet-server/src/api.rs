// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use axum::{
	routing::{get, post},
	Router,
};
use sqlx::SqlitePool;
use wgfleet_server_config::ServerConfig;
use wgfleet_server_tunnel::{NodeAccess, TunnelServices};

use crate::routes;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
	pub pool: SqlitePool,
	pub services: Arc<TunnelServices>,
	pub config: Arc<ServerConfig>,
}

pub fn create_app_state(pool: SqlitePool, config: &ServerConfig, node: NodeAccess) -> AppState {
	let services = TunnelServices::new(pool.clone(), config, node);
	AppState {
		pool,
		services: Arc::new(services),
		config: Arc::new(config.clone()),
	}
}

pub fn create_router(state: AppState) -> Router {
	let webhook = Router::new()
		.route("/handshake", post(routes::webhook::handshake))
		.route("/check-expiry", post(routes::webhook::check_expiry))
		.route("/expired", post(routes::webhook::expired));

	let setup = Router::new().route("/register-region", post(routes::setup::register_region));

	Router::new()
		.route("/health", get(routes::health::health_check))
		.nest("/api/webhook", webhook)
		.nest("/api/setup", setup)
		.with_state(state)
}
