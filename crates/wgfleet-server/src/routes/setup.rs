// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{
	extract::{rejection::JsonRejection, State},
	http::StatusCode,
	Json,
};
use wgfleet_server_tunnel::{RegisterRegionRequest, RegisterRegionResponse, TunnelError};

use super::json_body;
use crate::{api::AppState, error::ServerError};

/// POST /api/setup/register-region
///
/// Called by the bootstrap script once the node is up. A bad secret is a 403
/// here rather than the 401 the webhook routes use.
pub async fn register_region(
	State(state): State<AppState>,
	payload: Result<Json<RegisterRegionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterRegionResponse>), ServerError> {
	let request = json_body(payload)?;
	let response = state
		.services
		.webhook
		.register_region(request)
		.await
		.map_err(|e| match e {
			TunnelError::InvalidWebhookSecret => {
				ServerError::Forbidden("Invalid registration secret".to_string())
			}
			other => other.into(),
		})?;
	Ok((StatusCode::CREATED, Json(response)))
}
