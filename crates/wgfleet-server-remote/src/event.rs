// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	Info,
	/// A stdout line.
	Log,
	/// A stderr line or a failure summary.
	Error,
	Success,
}

/// One progress line from a streamed remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEvent {
	pub kind: EventKind,
	pub text: String,
}

impl RemoteEvent {
	pub fn new(kind: EventKind, text: impl Into<String>) -> Self {
		Self {
			kind,
			text: text.into(),
		}
	}

	pub fn info(text: impl Into<String>) -> Self {
		Self::new(EventKind::Info, text)
	}

	pub fn log(text: impl Into<String>) -> Self {
		Self::new(EventKind::Log, text)
	}

	pub fn error(text: impl Into<String>) -> Self {
		Self::new(EventKind::Error, text)
	}

	pub fn success(text: impl Into<String>) -> Self {
		Self::new(EventKind::Success, text)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn serializes_kind_in_snake_case() {
		let json = serde_json::to_string(&RemoteEvent::log("installing wireguard")).unwrap();
		assert_eq!(json, r#"{"kind":"log","text":"installing wireguard"}"#);
	}
}
