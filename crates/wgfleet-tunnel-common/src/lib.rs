// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Types shared by the wgfleet control plane: WireGuard keys, region and
//! peer records, session timing, address selection and config rendering.
//!
//! Everything here is free of I/O.

pub mod error;
pub mod ip_pool;
pub mod keys;
pub mod peer;
pub mod region;
pub mod render;
pub mod session;
pub mod user;

pub use error::ModelError;
pub use ip_pool::{allocate, IpPoolError, SubnetPrefix};
pub use keys::{KeyError, KeyGenerator, WgKeyPair, WgPrivateKey, WgPublicKey, X25519KeyGenerator};
pub use peer::{Peer, PeerFeatures, PeerRecord};
pub use region::{NewRegion, Region, RegionSummary, RegionUpdate, DEFAULT_DNS};
pub use render::{config_filename, ConfigRenderer, DEFAULT_FILTERING_DNS};
pub use session::{SessionDuration, SessionState, LATEST_TIMESTAMP_SECS};
pub use user::{PlanTier, User, UserRole};
