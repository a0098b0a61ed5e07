// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::{Deserialize, Serialize};
use wgfleet_server_tunnel::TunnelError;

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable machine-readable code.
	pub error: String,
	pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("{0}")]
	Unauthorized(String),

	#[error("{0}")]
	Forbidden(String),

	#[error("{0}")]
	BadRequest(String),

	#[error("{0}")]
	NotFound(String),

	#[error("{0}")]
	Conflict(String),

	#[error("{0}")]
	BadGateway(String),

	#[error("{0}")]
	ServiceUnavailable(String),

	#[error("{0}")]
	Internal(String),
}

impl ServerError {
	fn status_and_code(&self) -> (StatusCode, &'static str) {
		match self {
			ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
			ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
			ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
			ServerError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
			ServerError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
			ServerError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "bad_gateway"),
			ServerError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
			ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
		}
	}
}

impl From<TunnelError> for ServerError {
	fn from(e: TunnelError) -> Self {
		match e {
			TunnelError::InvalidWebhookSecret => ServerError::Unauthorized("Invalid webhook secret".to_string()),
			TunnelError::PeerNotFound => ServerError::NotFound("Config not found".to_string()),
			TunnelError::RegionNotFound(_) | TunnelError::UserNotFound(_) => ServerError::NotFound(e.to_string()),
			TunnelError::InvalidRequest(msg) => ServerError::BadRequest(msg),
			TunnelError::InvalidRegion(_) => ServerError::BadRequest(e.to_string()),
			TunnelError::QuotaExceeded { .. } => ServerError::Forbidden(e.to_string()),
			TunnelError::Conflict(msg) => ServerError::Conflict(msg),
			TunnelError::PoolExhausted(_) => ServerError::ServiceUnavailable(e.to_string()),
			TunnelError::RemoteConnect { .. } | TunnelError::RemoteCommandFailed { .. } => {
				tracing::warn!(error = %e, "edge node operation failed");
				ServerError::BadGateway(e.to_string())
			}
			TunnelError::BootstrapExtractionFailed(_)
			| TunnelError::Database(_)
			| TunnelError::Internal(_) => {
				tracing::error!(error = %e, "internal error");
				ServerError::Internal("Internal server error".to_string())
			}
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, code) = self.status_and_code();
		let body = ErrorResponse {
			error: code.to_string(),
			message: self.to_string(),
		};
		(status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tunnel_errors_map_to_statuses() {
		let cases = [
			(TunnelError::InvalidWebhookSecret, StatusCode::UNAUTHORIZED),
			(TunnelError::PeerNotFound, StatusCode::NOT_FOUND),
			(
				TunnelError::InvalidRequest("missing regionId".to_string()),
				StatusCode::BAD_REQUEST,
			),
			(TunnelError::Conflict("exists".to_string()), StatusCode::CONFLICT),
			(TunnelError::QuotaExceeded { limit: 2 }, StatusCode::FORBIDDEN),
			(
				TunnelError::RemoteConnect {
					host: "203.0.113.1".to_string(),
					reason: "refused".to_string(),
				},
				StatusCode::BAD_GATEWAY,
			),
			(TunnelError::Internal("boom".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
		];
		for (err, status) in cases {
			let response = ServerError::from(err).into_response();
			assert_eq!(response.status(), status);
		}
	}

	#[test]
	fn internal_details_are_not_exposed() {
		let err = ServerError::from(TunnelError::Internal("db path /var/lib/x".to_string()));
		assert_eq!(err.to_string(), "Internal server error");
	}
}
