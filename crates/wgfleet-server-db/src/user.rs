// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Read-only view of accounts. Accounts are created and edited elsewhere;
//! this side only needs the plan tier and role.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;
use wgfleet_tunnel_common::User;

use crate::error::DbError;

#[async_trait]
pub trait UserStore: Send + Sync {
	async fn get_user(&self, id: Uuid) -> Result<Option<User>, DbError>;
}

#[derive(Clone)]
pub struct UserRepository {
	pool: SqlitePool,
}

impl UserRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self), fields(%id))]
	pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
		let row: Option<(String, String)> =
			sqlx::query_as("SELECT plan, role FROM users WHERE id = ?")
				.bind(id.to_string())
				.fetch_optional(&self.pool)
				.await?;

		match row {
			Some((plan, role)) => Ok(Some(User {
				id,
				plan: plan.parse()?,
				role: role.parse()?,
			})),
			None => Ok(None),
		}
	}
}

#[async_trait]
impl UserStore for UserRepository {
	async fn get_user(&self, id: Uuid) -> Result<Option<User>, DbError> {
		self.get_user(id).await
	}
}
