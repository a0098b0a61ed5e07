// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer repository.
//!
//! There is exactly one row per (user, region). Reprovisioning overwrites the
//! row in place and resets it to pending. The handshake timestamps are only
//! ever written through [`PeerRepository::record_first_handshake`], which is a
//! compare-and-set on `first_handshake_at IS NULL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use std::net::Ipv4Addr;
use uuid::Uuid;
use wgfleet_tunnel_common::{
	Peer, PeerFeatures, PeerRecord, SessionDuration, WgPrivateKey, WgPublicKey,
};

use crate::error::DbError;
use crate::types::{format_timestamp, parse_datetime, parse_optional_datetime};

const PEER_COLUMNS: &str = "id, user_id, region_id, public_key, private_key, address, is_active, \
	first_handshake_at, expires_at, session_minutes, content_filter, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PeerRow {
	id: String,
	user_id: String,
	region_id: String,
	public_key: String,
	private_key: String,
	address: String,
	is_active: bool,
	first_handshake_at: Option<String>,
	expires_at: Option<String>,
	session_minutes: Option<i64>,
	content_filter: bool,
	created_at: String,
	updated_at: String,
}

impl TryFrom<PeerRow> for Peer {
	type Error = DbError;

	fn try_from(row: PeerRow) -> Result<Self, DbError> {
		Ok(Peer {
			id: row
				.id
				.parse()
				.map_err(|_| DbError::Internal("invalid peer id".to_string()))?,
			user_id: row
				.user_id
				.parse()
				.map_err(|_| DbError::Internal("invalid user id".to_string()))?,
			region_id: row.region_id,
			public_key: WgPublicKey::from_base64(&row.public_key)?,
			private_key: WgPrivateKey::from_base64(&row.private_key)?,
			address: row
				.address
				.parse::<Ipv4Addr>()
				.map_err(|_| DbError::Internal(format!("invalid peer address: {}", row.address)))?,
			is_active: row.is_active,
			first_handshake_at: parse_optional_datetime(row.first_handshake_at.as_deref())?,
			expires_at: parse_optional_datetime(row.expires_at.as_deref())?,
			session_override: row
				.session_minutes
				.map(SessionDuration::from_storage)
				.transpose()?,
			features: PeerFeatures {
				content_filter: row.content_filter,
			},
			created_at: parse_datetime(&row.created_at)?,
			updated_at: parse_datetime(&row.updated_at)?,
		})
	}
}

#[async_trait]
pub trait PeerStore: Send + Sync {
	async fn find_peer(&self, user_id: Uuid, region_id: &str) -> Result<Option<Peer>, DbError>;
	async fn find_active_peer(&self, user_id: Uuid, region_id: &str)
		-> Result<Option<Peer>, DbError>;
	async fn find_active_by_public_key(
		&self,
		region_id: &str,
		public_key: &str,
	) -> Result<Option<Peer>, DbError>;
	async fn upsert_peer(&self, record: &PeerRecord, now: DateTime<Utc>) -> Result<Peer, DbError>;
	async fn mark_inactive(&self, peer_id: Uuid, now: DateTime<Utc>) -> Result<bool, DbError>;
	async fn mark_inactive_by_public_key(
		&self,
		region_id: &str,
		public_key: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<Peer>, DbError>;
	async fn count_active_peers(&self, user_id: Uuid) -> Result<i64, DbError>;
	async fn record_first_handshake(
		&self,
		peer_id: Uuid,
		at: DateTime<Utc>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<bool, DbError>;
	async fn list_expired_public_keys(
		&self,
		region_id: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<String>, DbError>;
	async fn list_peers_for_user(&self, user_id: Uuid) -> Result<Vec<Peer>, DbError>;
}

#[derive(Clone)]
pub struct PeerRepository {
	pool: SqlitePool,
}

impl PeerRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// The (user, region) row regardless of its active flag.
	#[tracing::instrument(skip(self), fields(%user_id))]
	pub async fn find_peer(&self, user_id: Uuid, region_id: &str) -> Result<Option<Peer>, DbError> {
		let row: Option<PeerRow> = sqlx::query_as(&format!(
			"SELECT {PEER_COLUMNS} FROM peers WHERE user_id = ? AND region_id = ?"
		))
		.bind(user_id.to_string())
		.bind(region_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(Peer::try_from).transpose()
	}

	#[tracing::instrument(skip(self), fields(%user_id))]
	pub async fn find_active_peer(
		&self,
		user_id: Uuid,
		region_id: &str,
	) -> Result<Option<Peer>, DbError> {
		let row: Option<PeerRow> = sqlx::query_as(&format!(
			"SELECT {PEER_COLUMNS} FROM peers
			 WHERE user_id = ? AND region_id = ? AND is_active = 1"
		))
		.bind(user_id.to_string())
		.bind(region_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(Peer::try_from).transpose()
	}

	#[tracing::instrument(skip(self, public_key))]
	pub async fn find_active_by_public_key(
		&self,
		region_id: &str,
		public_key: &str,
	) -> Result<Option<Peer>, DbError> {
		let row: Option<PeerRow> = sqlx::query_as(&format!(
			"SELECT {PEER_COLUMNS} FROM peers
			 WHERE region_id = ? AND public_key = ? AND is_active = 1
			 LIMIT 1"
		))
		.bind(region_id)
		.bind(public_key)
		.fetch_optional(&self.pool)
		.await?;

		row.map(Peer::try_from).transpose()
	}

	/// Write fresh keys and address for (user, region), active and pending.
	#[tracing::instrument(
		skip(self, record),
		fields(user_id = %record.user_id, region_id = %record.region_id, address = %record.address)
	)]
	pub async fn upsert_peer(&self, record: &PeerRecord, now: DateTime<Utc>) -> Result<Peer, DbError> {
		let now = format_timestamp(now);
		let row: PeerRow = sqlx::query_as(&format!(
			"INSERT INTO peers ({PEER_COLUMNS})
			 VALUES (?, ?, ?, ?, ?, ?, 1, NULL, NULL, ?, ?, ?, ?)
			 ON CONFLICT(user_id, region_id) DO UPDATE SET
				public_key = excluded.public_key,
				private_key = excluded.private_key,
				address = excluded.address,
				is_active = 1,
				first_handshake_at = NULL,
				expires_at = NULL,
				session_minutes = excluded.session_minutes,
				content_filter = excluded.content_filter,
				updated_at = excluded.updated_at
			 RETURNING {PEER_COLUMNS}"
		))
		.bind(Uuid::new_v4().to_string())
		.bind(record.user_id.to_string())
		.bind(&record.region_id)
		.bind(record.keypair.public_key().to_base64())
		.bind(record.keypair.private_key().to_base64().expose().clone())
		.bind(record.address.to_string())
		.bind(record.session_override.map(SessionDuration::to_storage))
		.bind(record.features.content_filter)
		.bind(&now)
		.bind(&now)
		.fetch_one(&self.pool)
		.await?;

		row.try_into()
	}

	#[tracing::instrument(skip(self), fields(%peer_id))]
	pub async fn mark_inactive(&self, peer_id: Uuid, now: DateTime<Utc>) -> Result<bool, DbError> {
		let result =
			sqlx::query("UPDATE peers SET is_active = 0, updated_at = ? WHERE id = ? AND is_active = 1")
				.bind(format_timestamp(now))
				.bind(peer_id.to_string())
				.execute(&self.pool)
				.await?;

		Ok(result.rows_affected() > 0)
	}

	/// Deactivate the active peer(s) holding `public_key` in a region and
	/// return them. Empty when nothing matched.
	#[tracing::instrument(skip(self, public_key))]
	pub async fn mark_inactive_by_public_key(
		&self,
		region_id: &str,
		public_key: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<Peer>, DbError> {
		let rows: Vec<PeerRow> = sqlx::query_as(&format!(
			"UPDATE peers SET is_active = 0, updated_at = ?
			 WHERE region_id = ? AND public_key = ? AND is_active = 1
			 RETURNING {PEER_COLUMNS}"
		))
		.bind(format_timestamp(now))
		.bind(region_id)
		.bind(public_key)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Peer::try_from).collect()
	}

	#[tracing::instrument(skip(self), fields(%user_id))]
	pub async fn count_active_peers(&self, user_id: Uuid) -> Result<i64, DbError> {
		let (count,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM peers WHERE user_id = ? AND is_active = 1")
				.bind(user_id.to_string())
				.fetch_one(&self.pool)
				.await?;

		Ok(count)
	}

	/// Start the session clock if nobody has yet.
	///
	/// Returns `false` when the peer already had a handshake recorded or is
	/// no longer active; the stored values are left untouched.
	#[tracing::instrument(skip(self), fields(%peer_id))]
	pub async fn record_first_handshake(
		&self,
		peer_id: Uuid,
		at: DateTime<Utc>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<bool, DbError> {
		let result = sqlx::query(
			"UPDATE peers SET first_handshake_at = ?, expires_at = ?, updated_at = ?
			 WHERE id = ? AND is_active = 1 AND first_handshake_at IS NULL",
		)
		.bind(format_timestamp(at))
		.bind(expires_at.map(format_timestamp))
		.bind(format_timestamp(Utc::now()))
		.bind(peer_id.to_string())
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() == 1)
	}

	/// Public keys of active peers in the region whose expiry is at or
	/// before `now`. Unlimited and pending peers never appear.
	#[tracing::instrument(skip(self))]
	pub async fn list_expired_public_keys(
		&self,
		region_id: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<String>, DbError> {
		let rows: Vec<(String,)> = sqlx::query_as(
			"SELECT public_key FROM peers
			 WHERE region_id = ? AND is_active = 1
			   AND expires_at IS NOT NULL AND expires_at <= ?
			 ORDER BY expires_at ASC",
		)
		.bind(region_id)
		.bind(format_timestamp(now))
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(|(k,)| k).collect())
	}

	/// Every row owned by the user, active or not, oldest first. Rows created
	/// in the same millisecond keep insertion order.
	#[tracing::instrument(skip(self), fields(%user_id))]
	pub async fn list_peers_for_user(&self, user_id: Uuid) -> Result<Vec<Peer>, DbError> {
		let rows: Vec<PeerRow> = sqlx::query_as(&format!(
			"SELECT {PEER_COLUMNS} FROM peers WHERE user_id = ? ORDER BY created_at ASC, rowid ASC"
		))
		.bind(user_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(Peer::try_from).collect()
	}
}

#[async_trait]
impl PeerStore for PeerRepository {
	async fn find_peer(&self, user_id: Uuid, region_id: &str) -> Result<Option<Peer>, DbError> {
		self.find_peer(user_id, region_id).await
	}

	async fn find_active_peer(
		&self,
		user_id: Uuid,
		region_id: &str,
	) -> Result<Option<Peer>, DbError> {
		self.find_active_peer(user_id, region_id).await
	}

	async fn find_active_by_public_key(
		&self,
		region_id: &str,
		public_key: &str,
	) -> Result<Option<Peer>, DbError> {
		self.find_active_by_public_key(region_id, public_key).await
	}

	async fn upsert_peer(&self, record: &PeerRecord, now: DateTime<Utc>) -> Result<Peer, DbError> {
		self.upsert_peer(record, now).await
	}

	async fn mark_inactive(&self, peer_id: Uuid, now: DateTime<Utc>) -> Result<bool, DbError> {
		self.mark_inactive(peer_id, now).await
	}

	async fn mark_inactive_by_public_key(
		&self,
		region_id: &str,
		public_key: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<Peer>, DbError> {
		self
			.mark_inactive_by_public_key(region_id, public_key, now)
			.await
	}

	async fn count_active_peers(&self, user_id: Uuid) -> Result<i64, DbError> {
		self.count_active_peers(user_id).await
	}

	async fn record_first_handshake(
		&self,
		peer_id: Uuid,
		at: DateTime<Utc>,
		expires_at: Option<DateTime<Utc>>,
	) -> Result<bool, DbError> {
		self.record_first_handshake(peer_id, at, expires_at).await
	}

	async fn list_expired_public_keys(
		&self,
		region_id: &str,
		now: DateTime<Utc>,
	) -> Result<Vec<String>, DbError> {
		self.list_expired_public_keys(region_id, now).await
	}

	async fn list_peers_for_user(&self, user_id: Uuid) -> Result<Vec<Peer>, DbError> {
		self.list_peers_for_user(user_id).await
	}
}
