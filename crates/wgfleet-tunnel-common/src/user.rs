// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Account attributes that drive quota and session length.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
	/// Short sessions, limited number of regions.
	Free,
	Paid,
}

impl std::fmt::Display for PlanTier {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PlanTier::Free => write!(f, "free"),
			PlanTier::Paid => write!(f, "paid"),
		}
	}
}

impl std::str::FromStr for PlanTier {
	type Err = ModelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"free" => Ok(PlanTier::Free),
			"paid" => Ok(PlanTier::Paid),
			_ => Err(ModelError::InvalidPlanTier(s.to_string())),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
	User,
	Admin,
}

impl std::fmt::Display for UserRole {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			UserRole::User => write!(f, "user"),
			UserRole::Admin => write!(f, "admin"),
		}
	}
}

impl std::str::FromStr for UserRole {
	type Err = ModelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"user" => Ok(UserRole::User),
			"admin" => Ok(UserRole::Admin),
			_ => Err(ModelError::InvalidRole(s.to_string())),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: Uuid,
	pub plan: PlanTier,
	pub role: UserRole,
}

impl User {
	pub fn is_admin(&self) -> bool {
		self.role == UserRole::Admin
	}
}
