// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Region administration and node self-registration.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};
use wgfleet_server_db::{DbError, RegionStore};
use wgfleet_tunnel_common::{
	NewRegion, Region, RegionSummary, RegionUpdate, SubnetPrefix, WgPublicKey, DEFAULT_DNS,
};

use crate::error::{Result, TunnelError};

/// What a freshly bootstrapped node reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRegistration {
	pub id: String,
	#[serde(default)]
	pub name: Option<String>,
	pub host: String,
	pub endpoint: String,
	pub server_public_key: String,
	pub base_ip: String,
	#[serde(default)]
	pub dns: Option<String>,
}

impl RegionRegistration {
	fn into_new_region(self) -> NewRegion {
		NewRegion {
			name: self
				.name
				.filter(|n| !n.trim().is_empty())
				.unwrap_or_else(|| self.id.clone()),
			dns: self
				.dns
				.filter(|d| !d.trim().is_empty())
				.unwrap_or_else(|| DEFAULT_DNS.to_string()),
			id: self.id,
			host: self.host,
			endpoint: self.endpoint,
			server_public_key: self.server_public_key,
			base_ip: self.base_ip,
			is_active: true,
		}
	}
}

fn require(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(TunnelError::InvalidRequest(format!("{field} is required")));
	}
	Ok(())
}

fn check_base_ip(base_ip: &str) -> Result<()> {
	base_ip
		.parse::<SubnetPrefix>()
		.map(|_| ())
		.map_err(|e| TunnelError::InvalidRequest(e.to_string()))
}

fn check_server_key(key: &str) -> Result<()> {
	WgPublicKey::from_base64(key)
		.map(|_| ())
		.map_err(|e| TunnelError::InvalidRequest(format!("serverPublicKey: {e}")))
}

fn validate_new(region: &NewRegion) -> Result<()> {
	require("id", &region.id)?;
	require("host", &region.host)?;
	require("endpoint", &region.endpoint)?;
	check_server_key(&region.server_public_key)?;
	check_base_ip(&region.base_ip)
}

#[derive(Clone)]
pub struct RegionService {
	regions: Arc<dyn RegionStore>,
}

impl RegionService {
	pub fn new(regions: Arc<dyn RegionStore>) -> Self {
		Self { regions }
	}

	/// All regions, newest first.
	pub async fn list_all(&self) -> Result<Vec<Region>> {
		Ok(self.regions.list_regions().await?)
	}

	/// Regions users may pick from, by name.
	pub async fn list_active(&self) -> Result<Vec<RegionSummary>> {
		let regions = self.regions.list_active_regions().await?;
		Ok(regions.iter().map(RegionSummary::from).collect())
	}

	pub async fn get(&self, id: &str) -> Result<Region> {
		self
			.regions
			.get_region(id)
			.await?
			.ok_or_else(|| TunnelError::RegionNotFound(id.to_string()))
	}

	#[instrument(skip(self, region), fields(region_id = %region.id))]
	pub async fn create(&self, region: NewRegion) -> Result<Region> {
		validate_new(&region)?;
		let created = self.regions.create_region(&region, Utc::now()).await?;
		info!(host = %created.host, "region created");
		Ok(created)
	}

	#[instrument(skip(self, update))]
	pub async fn update(&self, id: &str, update: RegionUpdate) -> Result<Region> {
		if update.is_empty() {
			return Err(TunnelError::InvalidRequest("no fields to update".to_string()));
		}
		if let Some(base_ip) = &update.base_ip {
			check_base_ip(base_ip)?;
		}
		if let Some(key) = &update.server_public_key {
			check_server_key(key)?;
		}

		match self.regions.update_region(id, &update).await {
			Ok(region) => Ok(region),
			Err(DbError::NotFound(_)) => Err(TunnelError::RegionNotFound(id.to_string())),
			Err(e) => Err(e.into()),
		}
	}

	/// Soft delete: hide from users and refuse new peers.
	pub async fn disable(&self, id: &str) -> Result<Region> {
		self
			.update(
				id,
				RegionUpdate {
					is_active: Some(false),
					..Default::default()
				},
			)
			.await
	}

	/// Hard delete; refused with `Conflict` while peers reference the region.
	#[instrument(skip(self))]
	pub async fn delete(&self, id: &str) -> Result<()> {
		if !self.regions.delete_region(id).await? {
			return Err(TunnelError::RegionNotFound(id.to_string()));
		}
		info!("region deleted");
		Ok(())
	}

	/// Create or overwrite a region from a node's self-report and mark it
	/// active.
	#[instrument(skip(self, registration), fields(region_id = %registration.id))]
	pub async fn register(&self, registration: RegionRegistration) -> Result<Region> {
		let region = registration.into_new_region();
		validate_new(&region)?;
		let region = self.regions.upsert_region(&region, Utc::now()).await?;
		info!(endpoint = %region.endpoint, "region registered");
		Ok(region)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{Harness, SERVER_KEY};
	use wgfleet_server_db::testing::new_region;
	use wgfleet_tunnel_common::PlanTier;

	fn registration(id: &str) -> RegionRegistration {
		RegionRegistration {
			id: id.to_string(),
			name: None,
			host: "198.51.100.7".to_string(),
			endpoint: "198.51.100.7:51820".to_string(),
			server_public_key: SERVER_KEY.to_string(),
			base_ip: "10.66.40".to_string(),
			dns: None,
		}
	}

	#[tokio::test]
	async fn register_applies_defaults_and_upserts() {
		let h = Harness::new().await;

		let region = h.regions.register(registration("ams-1")).await.unwrap();
		assert_eq!(region.name, "ams-1");
		assert_eq!(region.dns, "1.1.1.1");
		assert!(region.is_active);

		h.regions.disable("ams-1").await.unwrap();
		let again = h
			.regions
			.register(RegionRegistration {
				name: Some("Amsterdam".to_string()),
				..registration("ams-1")
			})
			.await
			.unwrap();
		assert_eq!(again.name, "Amsterdam");
		assert!(again.is_active);
		assert_eq!(again.created_at, region.created_at);
	}

	#[tokio::test]
	async fn register_rejects_bad_prefix() {
		let h = Harness::new().await;
		let err = h
			.regions
			.register(RegionRegistration {
				base_ip: "10.66".to_string(),
				..registration("ams-1")
			})
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::InvalidRequest(_)));
	}

	#[tokio::test]
	async fn duplicate_create_conflicts() {
		let h = Harness::new().await;
		let err = h
			.regions
			.create(new_region("fra-1", "Frankfurt again"))
			.await
			.unwrap_err();
		assert!(matches!(err, TunnelError::Conflict(_)));
	}

	#[tokio::test]
	async fn active_listing_hides_disabled() {
		let h = Harness::new().await;
		h.regions.disable("sgp-1").await.unwrap();

		let ids: Vec<String> = h
			.regions
			.list_active()
			.await
			.unwrap()
			.into_iter()
			.map(|r| r.id)
			.collect();
		assert!(!ids.contains(&"sgp-1".to_string()));
		assert_eq!(h.regions.list_all().await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn update_validation_and_missing_region() {
		let h = Harness::new().await;
		assert!(matches!(
			h.regions.update("fra-1", RegionUpdate::default()).await,
			Err(TunnelError::InvalidRequest(_))
		));
		assert!(matches!(
			h.regions
				.update(
					"nowhere",
					RegionUpdate {
						name: Some("x".to_string()),
						..Default::default()
					}
				)
				.await,
			Err(TunnelError::RegionNotFound(_))
		));
	}

	#[tokio::test]
	async fn delete_refused_while_peers_exist() {
		let h = Harness::new().await;
		let user = h.user(PlanTier::Free).await;
		h.peer(user, "fra-1", None).await;

		assert!(matches!(
			h.regions.delete("fra-1").await,
			Err(TunnelError::Conflict(_))
		));
		h.regions.delete("nyc-1").await.unwrap();
		assert!(matches!(
			h.regions.delete("nyc-1").await,
			Err(TunnelError::RegionNotFound(_))
		));
	}
}
