// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Edge node callbacks under `/api/webhook`.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use wgfleet_server_tunnel::{
	CheckExpiryRequest, CheckExpiryResponse, ExpiredRequest, HandshakeRequest, HandshakeResponse,
	MessageResponse,
};

use super::json_body;
use crate::{api::AppState, error::ServerError};

/// POST /api/webhook/handshake
pub async fn handshake(
	State(state): State<AppState>,
	payload: Result<Json<HandshakeRequest>, JsonRejection>,
) -> Result<Json<HandshakeResponse>, ServerError> {
	let request = json_body(payload)?;
	let response = state.services.webhook.handshake(request).await?;
	Ok(Json(response))
}

/// POST /api/webhook/check-expiry
pub async fn check_expiry(
	State(state): State<AppState>,
	payload: Result<Json<CheckExpiryRequest>, JsonRejection>,
) -> Result<Json<CheckExpiryResponse>, ServerError> {
	let request = json_body(payload)?;
	let response = state.services.webhook.check_expiry(request).await?;
	Ok(Json(response))
}

/// POST /api/webhook/expired
pub async fn expired(
	State(state): State<AppState>,
	payload: Result<Json<ExpiredRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ServerError> {
	let request = json_body(payload)?;
	let response = state.services.webhook.expired(request).await?;
	Ok(Json(response))
}
