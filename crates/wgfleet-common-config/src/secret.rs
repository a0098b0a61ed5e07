// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret wrapper that keeps sensitive values out of logs.
//!
//! ```
//! use wgfleet_common_config::Secret;
//!
//! let webhook_secret = Secret::new("edge-shared-secret".to_string());
//! assert_eq!(format!("{webhook_secret}"), "[REDACTED]");
//! assert_eq!(webhook_secret.expose(), "edge-shared-secret");
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// Placeholder written wherever a secret would otherwise be printed.
pub const REDACTED: &str = "[REDACTED]";

/// A sensitive value with redacted `Debug`, `Display` and `Serialize`.
///
/// The inner value is zeroized on drop and only reachable through
/// [`Secret::expose`].
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T>
where
	T: Zeroize,
{
	inner: T,
}

pub type SecretString = Secret<String>;

impl<T> Secret<T>
where
	T: Zeroize,
{
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	/// Access the inner value. Call sites opt in explicitly.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T> Clone for Secret<T>
where
	T: Zeroize + Clone,
{
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T> fmt::Debug for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T> fmt::Display for Secret<T>
where
	T: Zeroize,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T> PartialEq for Secret<T>
where
	T: Zeroize + PartialEq,
{
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T> Eq for Secret<T> where T: Zeroize + Eq {}

impl<T> Serialize for Secret<T>
where
	T: Zeroize,
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(REDACTED)
	}
}

impl<'de, T> Deserialize<'de> for Secret<T>
where
	T: Deserialize<'de> + Zeroize,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		T::deserialize(deserializer).map(Secret::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn debug_is_redacted() {
		let secret = Secret::new("edge-shared-secret".to_string());
		let output = format!("{secret:?}");
		assert!(!output.contains("edge-shared-secret"));
		assert_eq!(output, "Secret(\"[REDACTED]\")");
	}

	#[test]
	fn serialize_is_redacted() {
		let secret = Secret::new("edge-shared-secret".to_string());
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, "\"[REDACTED]\"");
	}

	#[test]
	fn deserialize_wraps_plain_value() {
		let secret: SecretString = serde_json::from_str("\"from-config\"").unwrap();
		assert_eq!(secret.expose(), "from-config");
	}

	#[test]
	fn clone_preserves_value() {
		let secret = Secret::new("abc".to_string());
		assert_eq!(secret.clone(), secret);
	}

	proptest! {
		#[test]
		fn display_never_leaks(value in "[a-zA-Z0-9]{12,64}") {
			let secret = Secret::new(value.clone());
			let display = format!("{secret}");
			let debug = format!("{secret:?}");
			prop_assert!(!display.contains(&value));
			prop_assert!(!debug.contains(&value));
		}
	}
}
