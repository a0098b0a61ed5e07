// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per region id.
///
/// Serializes dump, allocate and add-peer against the same node. Entries are
/// never evicted; the region set is small and fixed.
#[derive(Debug, Default)]
pub struct RegionLocks {
	locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RegionLocks {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn lock(&self, region_id: &str) -> OwnedMutexGuard<()> {
		let lock = {
			let mut locks = self.locks.lock().await;
			locks
				.entry(region_id.to_string())
				.or_insert_with(|| Arc::new(Mutex::new(())))
				.clone()
		};
		lock.lock_owned().await
	}
}
