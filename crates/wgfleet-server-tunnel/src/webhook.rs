// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Edge node callbacks.
//!
//! Every request carries the shared secret in its body. The secret is checked
//! before any field is looked at or any row is read, and an unconfigured
//! secret rejects everything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::warn;
use wgfleet_common_config::SecretString;
use wgfleet_tunnel_common::{Region, LATEST_TIMESTAMP_SECS};

use crate::error::{Result, TunnelError};
use crate::regions::{RegionRegistration, RegionService};
use crate::session::SessionService;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
	pub region_id: Option<String>,
	pub public_key: Option<String>,
	/// Unix seconds.
	pub timestamp: Option<i64>,
	pub secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckExpiryRequest {
	pub region_id: Option<String>,
	pub secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredRequest {
	pub region_id: Option<String>,
	pub public_key: Option<String>,
	pub secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRegionRequest {
	pub id: Option<String>,
	pub name: Option<String>,
	pub host: Option<String>,
	pub endpoint: Option<String>,
	pub server_public_key: Option<String>,
	pub base_ip: Option<String>,
	pub dns: Option<String>,
	pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeResponse {
	pub message: String,
	pub expires_at: Option<DateTime<Utc>>,
	pub session_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckExpiryResponse {
	pub expired_peers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageResponse {
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterRegionResponse {
	pub success: bool,
	pub region: Region,
}

fn required(value: Option<String>, field: &str) -> Result<String> {
	value
		.filter(|v| !v.trim().is_empty())
		.ok_or_else(|| TunnelError::InvalidRequest(format!("missing required field: {field}")))
}

#[derive(Clone)]
pub struct WebhookService {
	sessions: SessionService,
	regions: RegionService,
	secret: Option<SecretString>,
}

impl WebhookService {
	pub fn new(sessions: SessionService, regions: RegionService, secret: Option<SecretString>) -> Self {
		Self {
			sessions,
			regions,
			secret: secret.filter(|s| !s.expose().is_empty()),
		}
	}

	fn verify(&self, provided: Option<&str>) -> Result<()> {
		let Some(expected) = &self.secret else {
			warn!("webhook call rejected: no secret configured");
			return Err(TunnelError::InvalidWebhookSecret);
		};
		let provided = provided.unwrap_or("");
		if bool::from(provided.as_bytes().ct_eq(expected.expose().as_bytes())) {
			Ok(())
		} else {
			Err(TunnelError::InvalidWebhookSecret)
		}
	}

	pub async fn handshake(&self, request: HandshakeRequest) -> Result<HandshakeResponse> {
		self.verify(request.secret.as_deref())?;
		let region_id = required(request.region_id, "regionId")?;
		let public_key = required(request.public_key, "publicKey")?;
		let timestamp = request
			.timestamp
			.filter(|t| *t > 0)
			.ok_or_else(|| TunnelError::InvalidRequest("missing required field: timestamp".to_string()))?;
		let at = Some(timestamp)
			.filter(|t| *t <= LATEST_TIMESTAMP_SECS)
			.and_then(|t| DateTime::from_timestamp(t, 0))
			.ok_or_else(|| TunnelError::InvalidRequest(format!("timestamp out of range: {timestamp}")))?;

		let outcome = self.sessions.handshake(&region_id, &public_key, at).await?;
		let message = if outcome.already_tracked {
			"Already tracked"
		} else {
			"Handshake tracked"
		};
		Ok(HandshakeResponse {
			message: message.to_string(),
			expires_at: outcome.expires_at,
			session_minutes: outcome.session_minutes,
		})
	}

	pub async fn check_expiry(&self, request: CheckExpiryRequest) -> Result<CheckExpiryResponse> {
		self.verify(request.secret.as_deref())?;
		let region_id = required(request.region_id, "regionId")?;
		let expired_peers = self.sessions.check_expiry(&region_id, Utc::now()).await?;
		Ok(CheckExpiryResponse { expired_peers })
	}

	pub async fn expired(&self, request: ExpiredRequest) -> Result<MessageResponse> {
		self.verify(request.secret.as_deref())?;
		let region_id = required(request.region_id, "regionId")?;
		let public_key = required(request.public_key, "publicKey")?;
		self.sessions.expired(&region_id, &public_key, Utc::now()).await?;
		Ok(MessageResponse {
			message: "Config marked as expired".to_string(),
		})
	}

	pub async fn register_region(&self, request: RegisterRegionRequest) -> Result<RegisterRegionResponse> {
		if let Err(e) = self.verify(request.secret.as_deref()) {
			warn!(region_id = ?request.id, "unauthorized region registration attempt");
			return Err(e);
		}
		let registration = RegionRegistration {
			id: required(request.id, "id")?,
			host: required(request.host, "host")?,
			endpoint: required(request.endpoint, "endpoint")?,
			server_public_key: required(request.server_public_key, "serverPublicKey")?,
			base_ip: required(request.base_ip, "baseIp")?,
			name: request.name,
			dns: request.dns,
		};
		let region = self.regions.register(registration).await?;
		Ok(RegisterRegionResponse {
			success: true,
			region,
		})
	}
}
