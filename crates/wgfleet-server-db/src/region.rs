// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Region repository.
//!
//! Regions are created by administrators or by edge nodes registering
//! themselves after bootstrap. Deleting a region that still has peer rows is
//! refused; disable it instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use wgfleet_tunnel_common::{NewRegion, Region, RegionUpdate};

use crate::error::{is_unique_violation, DbError};
use crate::types::{format_timestamp, parse_datetime};

const REGION_COLUMNS: &str =
	"id, name, host, endpoint, server_public_key, base_ip, dns, is_active, created_at";

#[derive(sqlx::FromRow)]
struct RegionRow {
	id: String,
	name: String,
	host: String,
	endpoint: String,
	server_public_key: String,
	base_ip: String,
	dns: String,
	is_active: bool,
	created_at: String,
}

impl TryFrom<RegionRow> for Region {
	type Error = DbError;

	fn try_from(row: RegionRow) -> Result<Self, DbError> {
		Ok(Region {
			id: row.id,
			name: row.name,
			host: row.host,
			endpoint: row.endpoint,
			server_public_key: row.server_public_key,
			base_ip: row.base_ip,
			dns: row.dns,
			is_active: row.is_active,
			created_at: parse_datetime(&row.created_at)?,
		})
	}
}

#[async_trait]
pub trait RegionStore: Send + Sync {
	async fn get_region(&self, id: &str) -> Result<Option<Region>, DbError>;
	async fn list_regions(&self) -> Result<Vec<Region>, DbError>;
	async fn list_active_regions(&self) -> Result<Vec<Region>, DbError>;
	async fn create_region(&self, region: &NewRegion, now: DateTime<Utc>)
		-> Result<Region, DbError>;
	async fn update_region(&self, id: &str, update: &RegionUpdate) -> Result<Region, DbError>;
	async fn delete_region(&self, id: &str) -> Result<bool, DbError>;
	async fn upsert_region(&self, region: &NewRegion, now: DateTime<Utc>)
		-> Result<Region, DbError>;
}

#[derive(Clone)]
pub struct RegionRepository {
	pool: SqlitePool,
}

impl RegionRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_region(&self, id: &str) -> Result<Option<Region>, DbError> {
		let row: Option<RegionRow> =
			sqlx::query_as(&format!("SELECT {REGION_COLUMNS} FROM regions WHERE id = ?"))
				.bind(id)
				.fetch_optional(&self.pool)
				.await?;

		row.map(Region::try_from).transpose()
	}

	/// All regions, newest first.
	#[tracing::instrument(skip(self))]
	pub async fn list_regions(&self) -> Result<Vec<Region>, DbError> {
		let rows: Vec<RegionRow> = sqlx::query_as(&format!(
			"SELECT {REGION_COLUMNS} FROM regions ORDER BY created_at DESC, id ASC"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Region::try_from).collect()
	}

	/// Enabled regions sorted by display name.
	#[tracing::instrument(skip(self))]
	pub async fn list_active_regions(&self) -> Result<Vec<Region>, DbError> {
		let rows: Vec<RegionRow> = sqlx::query_as(&format!(
			"SELECT {REGION_COLUMNS} FROM regions WHERE is_active = 1 ORDER BY name ASC"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Region::try_from).collect()
	}

	#[tracing::instrument(skip(self, region), fields(region_id = %region.id))]
	pub async fn create_region(
		&self,
		region: &NewRegion,
		now: DateTime<Utc>,
	) -> Result<Region, DbError> {
		let result = sqlx::query_as::<_, RegionRow>(&format!(
			"INSERT INTO regions ({REGION_COLUMNS})
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			 RETURNING {REGION_COLUMNS}"
		))
		.bind(&region.id)
		.bind(&region.name)
		.bind(&region.host)
		.bind(&region.endpoint)
		.bind(&region.server_public_key)
		.bind(&region.base_ip)
		.bind(&region.dns)
		.bind(region.is_active)
		.bind(format_timestamp(now))
		.fetch_one(&self.pool)
		.await;

		match result {
			Ok(row) => row.try_into(),
			Err(e) if is_unique_violation(&e) => Err(DbError::Conflict(format!(
				"region {} already exists",
				region.id
			))),
			Err(e) => Err(e.into()),
		}
	}

	/// Apply the present fields of `update`.
	///
	/// # Errors
	/// `DbError::NotFound` if no region has this id.
	#[tracing::instrument(skip(self, update))]
	pub async fn update_region(&self, id: &str, update: &RegionUpdate) -> Result<Region, DbError> {
		let row: Option<RegionRow> = sqlx::query_as(&format!(
			"UPDATE regions SET
				name = COALESCE(?, name),
				host = COALESCE(?, host),
				endpoint = COALESCE(?, endpoint),
				server_public_key = COALESCE(?, server_public_key),
				base_ip = COALESCE(?, base_ip),
				dns = COALESCE(?, dns),
				is_active = COALESCE(?, is_active)
			 WHERE id = ?
			 RETURNING {REGION_COLUMNS}"
		))
		.bind(&update.name)
		.bind(&update.host)
		.bind(&update.endpoint)
		.bind(&update.server_public_key)
		.bind(&update.base_ip)
		.bind(&update.dns)
		.bind(update.is_active)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;

		row
			.ok_or_else(|| DbError::NotFound(format!("region {id}")))?
			.try_into()
	}

	/// Hard delete. Returns `false` if the region did not exist.
	///
	/// # Errors
	/// `DbError::Conflict` while any peer row references the region.
	#[tracing::instrument(skip(self))]
	pub async fn delete_region(&self, id: &str) -> Result<bool, DbError> {
		let (peers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM peers WHERE region_id = ?")
			.bind(id)
			.fetch_one(&self.pool)
			.await?;

		if peers > 0 {
			return Err(DbError::Conflict(format!(
				"region {id} still has {peers} peer(s); disable it instead"
			)));
		}

		let result = sqlx::query("DELETE FROM regions WHERE id = ?")
			.bind(id)
			.execute(&self.pool)
			.await;

		match result {
			Ok(done) => Ok(done.rows_affected() > 0),
			Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => Err(DbError::Conflict(
				format!("region {id} is referenced by peers"),
			)),
			Err(e) => Err(e.into()),
		}
	}

	/// Insert or overwrite a region, keeping its original `created_at`.
	#[tracing::instrument(skip(self, region), fields(region_id = %region.id))]
	pub async fn upsert_region(
		&self,
		region: &NewRegion,
		now: DateTime<Utc>,
	) -> Result<Region, DbError> {
		let row: RegionRow = sqlx::query_as(&format!(
			"INSERT INTO regions ({REGION_COLUMNS})
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			 ON CONFLICT(id) DO UPDATE SET
				name = excluded.name,
				host = excluded.host,
				endpoint = excluded.endpoint,
				server_public_key = excluded.server_public_key,
				base_ip = excluded.base_ip,
				dns = excluded.dns,
				is_active = excluded.is_active
			 RETURNING {REGION_COLUMNS}"
		))
		.bind(&region.id)
		.bind(&region.name)
		.bind(&region.host)
		.bind(&region.endpoint)
		.bind(&region.server_public_key)
		.bind(&region.base_ip)
		.bind(&region.dns)
		.bind(region.is_active)
		.bind(format_timestamp(now))
		.fetch_one(&self.pool)
		.await?;

		row.try_into()
	}
}

#[async_trait]
impl RegionStore for RegionRepository {
	async fn get_region(&self, id: &str) -> Result<Option<Region>, DbError> {
		self.get_region(id).await
	}

	async fn list_regions(&self) -> Result<Vec<Region>, DbError> {
		self.list_regions().await
	}

	async fn list_active_regions(&self) -> Result<Vec<Region>, DbError> {
		self.list_active_regions().await
	}

	async fn create_region(
		&self,
		region: &NewRegion,
		now: DateTime<Utc>,
	) -> Result<Region, DbError> {
		self.create_region(region, now).await
	}

	async fn update_region(&self, id: &str, update: &RegionUpdate) -> Result<Region, DbError> {
		self.update_region(id, update).await
	}

	async fn delete_region(&self, id: &str) -> Result<bool, DbError> {
		self.delete_region(id).await
	}

	async fn upsert_region(
		&self,
		region: &NewRegion,
		now: DateTime<Utc>,
	) -> Result<Region, DbError> {
		self.upsert_region(region, now).await
	}
}
