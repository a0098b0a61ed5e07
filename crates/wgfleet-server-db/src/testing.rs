// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory database helpers for tests in this and dependent crates.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use uuid::Uuid;
use wgfleet_tunnel_common::{NewRegion, PlanTier, UserRole, DEFAULT_DNS};

use crate::pool::run_migrations;
use crate::types::format_timestamp;

/// Single-connection in-memory pool with the full schema applied.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str(":memory:")
		.unwrap()
		.foreign_keys(true);

	let pool = SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.expect("Failed to create test pool");

	run_migrations(&pool).await.expect("migrations failed");
	pool
}

pub async fn insert_user(pool: &SqlitePool, plan: PlanTier, role: UserRole) -> Uuid {
	let id = Uuid::new_v4();
	sqlx::query("INSERT INTO users (id, plan, role, created_at) VALUES (?, ?, ?, ?)")
		.bind(id.to_string())
		.bind(plan.to_string())
		.bind(role.to_string())
		.bind(format_timestamp(Utc::now()))
		.execute(pool)
		.await
		.unwrap();
	id
}

pub fn new_region(id: &str, name: &str) -> NewRegion {
	NewRegion {
		id: id.to_string(),
		name: name.to_string(),
		host: "203.0.113.10".to_string(),
		endpoint: "203.0.113.10:51820".to_string(),
		server_public_key: "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo=".to_string(),
		base_ip: "10.66.10".to_string(),
		dns: DEFAULT_DNS.to_string(),
		is_active: true,
	}
}
