// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Edge node (region) records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ip_pool::{self, SubnetPrefix};

pub const DEFAULT_DNS: &str = "1.1.1.1";

/// An edge node that terminates tunnels for one /24.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
	pub id: String,
	pub name: String,
	/// SSH reachable address of the node.
	pub host: String,
	/// `host:port` clients dial.
	pub endpoint: String,
	pub server_public_key: String,
	/// Stored as entered. Parse with [`Region::subnet_prefix`].
	pub base_ip: String,
	pub dns: String,
	pub is_active: bool,
	pub created_at: DateTime<Utc>,
}

impl Region {
	pub fn subnet_prefix(&self) -> ip_pool::Result<SubnetPrefix> {
		self.base_ip.parse()
	}
}

/// Public listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
	pub id: String,
	pub name: String,
}

impl From<&Region> for RegionSummary {
	fn from(region: &Region) -> Self {
		Self {
			id: region.id.clone(),
			name: region.name.clone(),
		}
	}
}

/// Full attribute set for inserting or upserting a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegion {
	pub id: String,
	pub name: String,
	pub host: String,
	pub endpoint: String,
	pub server_public_key: String,
	pub base_ip: String,
	pub dns: String,
	pub is_active: bool,
}

/// Administrative edit. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionUpdate {
	pub name: Option<String>,
	pub host: Option<String>,
	pub endpoint: Option<String>,
	pub server_public_key: Option<String>,
	pub base_ip: Option<String>,
	pub dns: Option<String>,
	pub is_active: Option<bool>,
}

impl RegionUpdate {
	pub fn is_empty(&self) -> bool {
		self == &RegionUpdate::default()
	}
}

#[cfg(test)]
pub(crate) fn test_region(id: &str) -> Region {
	Region {
		id: id.to_string(),
		name: format!("Region {id}"),
		host: "203.0.113.10".to_string(),
		endpoint: "203.0.113.10:51820".to_string(),
		server_public_key: "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo=".to_string(),
		base_ip: "10.66.10".to_string(),
		dns: DEFAULT_DNS.to_string(),
		is_active: true,
		created_at: Utc::now(),
	}
}
