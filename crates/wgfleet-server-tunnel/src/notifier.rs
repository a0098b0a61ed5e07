// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-user fan-out of session timer events for dashboard subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, instrument};
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
	#[serde(rename_all = "camelCase")]
	TimerStarted {
		region_id: String,
		expires_at: DateTime<Utc>,
		session_minutes: u32,
	},
	#[serde(rename_all = "camelCase")]
	TimerExpired { region_id: String },
}

/// A user's channel lives while it has receivers. The first notify after
/// the last receiver drops removes it, so the map only holds users with a
/// live subscription.
#[derive(Clone)]
pub struct SessionNotifier {
	senders: Arc<RwLock<HashMap<Uuid, broadcast::Sender<SessionEvent>>>>,
}

impl Default for SessionNotifier {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionNotifier {
	pub fn new() -> Self {
		Self {
			senders: Arc::new(RwLock::new(HashMap::new())),
		}
	}

	#[instrument(skip(self), fields(%user_id))]
	pub async fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<SessionEvent> {
		let mut senders = self.senders.write().await;

		if let Some(sender) = senders.get(&user_id) {
			return sender.subscribe();
		}

		let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
		senders.insert(user_id, tx);
		rx
	}

	/// Events for users without subscribers are dropped.
	#[instrument(skip(self, event), fields(%user_id))]
	pub async fn notify(&self, user_id: Uuid, event: SessionEvent) {
		let delivered = match self.senders.read().await.get(&user_id) {
			Some(sender) => sender.send(event).is_ok(),
			None => return,
		};
		if delivered {
			return;
		}

		// A subscribe may have raced in between the two locks.
		let mut senders = self.senders.write().await;
		if senders
			.get(&user_id)
			.is_some_and(|sender| sender.receiver_count() == 0)
		{
			senders.remove(&user_id);
			debug!("pruned channel without receivers");
		}
	}

	#[instrument(skip(self), fields(%user_id))]
	pub async fn unregister(&self, user_id: Uuid) {
		self.senders.write().await.remove(&user_id);
	}

	#[cfg(test)]
	async fn tracked_users(&self) -> usize {
		self.senders.read().await.len()
	}
}
