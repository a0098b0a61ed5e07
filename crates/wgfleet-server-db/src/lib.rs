// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # wgfleet-server-db
//!
//! SQLite persistence for regions, peers and the read-only user view.
//!
//! Each domain has a `*Store` trait (what the services depend on) and a
//! `*Repository` struct holding a `SqlitePool` that implements it by
//! delegating to inherent methods.
//!
//! Timestamps are stored as fixed-width RFC 3339 text, so `<=` comparisons in
//! SQL are time comparisons.

mod error;
pub mod peer;
pub mod pool;
pub mod region;
pub mod types;
pub mod user;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use peer::{PeerRepository, PeerStore};
pub use pool::{create_pool, run_migrations};
pub use region::{RegionRepository, RegionStore};
pub use user::{UserRepository, UserStore};
