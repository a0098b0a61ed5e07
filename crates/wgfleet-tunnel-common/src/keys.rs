// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WireGuard keys in the padded base64 form used by `wg` and peer configs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use wgfleet_common_config::SecretString;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

#[derive(Error, Debug)]
pub enum KeyError {
	#[error("invalid key length: expected 32 bytes, got {0}")]
	InvalidLength(usize),

	#[error("invalid base64 encoding: {0}")]
	InvalidBase64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, KeyError>;

fn decode_key(s: &str) -> Result<[u8; 32]> {
	let bytes = STANDARD.decode(s.trim())?;
	if bytes.len() != 32 {
		return Err(KeyError::InvalidLength(bytes.len()));
	}
	let mut arr = [0u8; 32];
	arr.copy_from_slice(&bytes);
	Ok(arr)
}

#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct WgPrivateKey {
	bytes: [u8; 32],
}

impl WgPrivateKey {
	pub fn generate() -> Self {
		let secret = StaticSecret::random_from_rng(OsRng);
		Self {
			bytes: secret.to_bytes(),
		}
	}

	pub fn from_bytes(bytes: [u8; 32]) -> Self {
		Self { bytes }
	}

	pub fn from_base64(s: &str) -> Result<Self> {
		decode_key(s).map(|bytes| Self { bytes })
	}

	pub fn to_base64(&self) -> SecretString {
		SecretString::new(STANDARD.encode(self.bytes))
	}

	pub fn public_key(&self) -> WgPublicKey {
		let secret = StaticSecret::from(self.bytes);
		let public = PublicKey::from(&secret);
		WgPublicKey {
			bytes: *public.as_bytes(),
		}
	}
}

impl fmt::Debug for WgPrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WgPrivateKey")
			.field("bytes", &"[REDACTED]")
			.finish()
	}
}

impl fmt::Display for WgPrivateKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("[REDACTED]")
	}
}

impl Serialize for WgPrivateKey {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str("[REDACTED]")
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WgPublicKey {
	bytes: [u8; 32],
}

impl WgPublicKey {
	pub fn from_base64(s: &str) -> Result<Self> {
		decode_key(s).map(|bytes| Self { bytes })
	}

	pub fn to_base64(&self) -> String {
		STANDARD.encode(self.bytes)
	}

	/// First eight characters of the base64 form, for log lines.
	pub fn short(&self) -> String {
		let b64 = self.to_base64();
		format!("{}...", &b64[..8])
	}
}

impl fmt::Debug for WgPublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WgPublicKey")
			.field("prefix", &self.short())
			.finish()
	}
}

impl fmt::Display for WgPublicKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_base64())
	}
}

impl Serialize for WgPublicKey {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_base64())
	}
}

impl<'de> Deserialize<'de> for WgPublicKey {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Self::from_base64(&s).map_err(serde::de::Error::custom)
	}
}

#[derive(Clone)]
pub struct WgKeyPair {
	private: WgPrivateKey,
	public: WgPublicKey,
}

impl WgKeyPair {
	pub fn generate() -> Self {
		Self::from_private_key(WgPrivateKey::generate())
	}

	pub fn from_private_key(private: WgPrivateKey) -> Self {
		let public = private.public_key();
		Self { private, public }
	}

	pub fn from_base64(private_key_base64: &str) -> Result<Self> {
		WgPrivateKey::from_base64(private_key_base64).map(Self::from_private_key)
	}

	pub fn private_key(&self) -> &WgPrivateKey {
		&self.private
	}

	pub fn public_key(&self) -> &WgPublicKey {
		&self.public
	}
}

impl fmt::Debug for WgKeyPair {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("WgKeyPair")
			.field("private", &self.private)
			.field("public", &self.public)
			.finish()
	}
}

/// Source of fresh peer keypairs.
///
/// Provisioning takes this as a dependency so tests can pin keys.
pub trait KeyGenerator: Send + Sync {
	fn generate(&self) -> WgKeyPair;
}

/// Generates Curve25519 keypairs from the OS random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519KeyGenerator;

impl KeyGenerator for X25519KeyGenerator {
	fn generate(&self) -> WgKeyPair {
		WgKeyPair::generate()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn base64_is_padded_like_wg() {
		let keypair = WgKeyPair::generate();
		let public = keypair.public_key().to_base64();
		assert_eq!(public.len(), 44);
		assert!(public.ends_with('='));
	}

	#[test]
	fn private_key_roundtrip_derives_same_public_key() {
		let keypair = WgKeyPair::generate();
		let encoded = keypair.private_key().to_base64();
		let restored = WgKeyPair::from_base64(encoded.expose()).unwrap();
		assert_eq!(keypair.public_key(), restored.public_key());
	}

	#[test]
	fn known_vector_matches_wg_pubkey() {
		// RFC 7748 section 6.1 test vector (Alice).
		let private = WgPrivateKey::from_bytes([
			0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2, 0x66,
			0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5, 0x1d, 0xb9,
			0x2c, 0x2a,
		]);
		assert_eq!(
			private.public_key().to_base64(),
			"hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo="
		);
	}

	#[test]
	fn rejects_wrong_length() {
		let err = WgPublicKey::from_base64("AAAA").unwrap_err();
		assert!(matches!(err, KeyError::InvalidLength(3)));
	}

	#[test]
	fn private_key_serialize_is_redacted() {
		let private = WgPrivateKey::generate();
		let json = serde_json::to_string(&private).unwrap();
		assert_eq!(json, "\"[REDACTED]\"");
	}

	#[test]
	fn public_key_short_is_prefix() {
		let keypair = WgKeyPair::generate();
		let short = keypair.public_key().short();
		assert!(keypair.public_key().to_base64().starts_with(&short[..8]));
		assert!(short.ends_with("..."));
	}

	#[test]
	fn generator_produces_distinct_keys() {
		let generator = X25519KeyGenerator;
		let a = generator.generate();
		let b = generator.generate();
		assert_ne!(a.public_key(), b.public_key());
	}

	proptest! {
		#[test]
		fn private_key_debug_never_leaks(seed in prop::array::uniform32(any::<u8>())) {
			let private = WgPrivateKey::from_bytes(seed);
			let debug = format!("{:?}", private);
			prop_assert!(!debug.contains(&STANDARD.encode(seed)));
			prop_assert!(debug.contains("[REDACTED]"));
		}
	}
}
