// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod health;
pub mod setup;
pub mod webhook;

use axum::{extract::rejection::JsonRejection, Json};

use crate::error::ServerError;

/// Unwrap a JSON body, turning any rejection into a 400 with our error body.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
	payload
		.map(|Json(body)| body)
		.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))
}
