// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Liveness and database reachability.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::{api::AppState, version::BuildInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub timestamp: String,
	pub version: BuildInfo,
	pub database: HealthStatus,
	pub webhook_secret_configured: bool,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
		Ok(_) => HealthStatus::Healthy,
		Err(e) => {
			tracing::warn!(error = %e, "database health check failed");
			HealthStatus::Unhealthy
		}
	};

	let response = HealthResponse {
		status: database,
		timestamp: chrono::Utc::now().to_rfc3339(),
		version: BuildInfo::current(),
		database,
		webhook_secret_configured: state.config.webhook.is_configured(),
	};

	let http_status = match database {
		HealthStatus::Healthy => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(http_status, Json(response))
}
