// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration file rendering.

use std::fmt::Write;
use std::net::Ipv4Addr;

use crate::keys::WgPrivateKey;
use crate::peer::{Peer, PeerFeatures};
use crate::region::Region;

pub const ALLOWED_IPS: &str = "0.0.0.0/0, ::/0";
pub const PERSISTENT_KEEPALIVE_SECS: u16 = 25;

/// AdGuard DNS, used when content filtering is on and nothing else is set.
pub const DEFAULT_FILTERING_DNS: &str = "94.140.14.14";

#[derive(Debug, Clone)]
pub struct ConfigRenderer {
	filtering_dns: String,
}

impl Default for ConfigRenderer {
	fn default() -> Self {
		Self::new(DEFAULT_FILTERING_DNS)
	}
}

impl ConfigRenderer {
	pub fn new(filtering_dns: impl Into<String>) -> Self {
		Self {
			filtering_dns: filtering_dns.into(),
		}
	}

	pub fn render(
		&self,
		private_key: &WgPrivateKey,
		address: Ipv4Addr,
		region: &Region,
		features: PeerFeatures,
	) -> String {
		let dns = if features.content_filter {
			self.filtering_dns.as_str()
		} else {
			region.dns.as_str()
		};

		let mut out = String::with_capacity(256);
		// Writing to a String cannot fail.
		let _ = write!(
			out,
			"[Interface]\n\
			 PrivateKey = {private_key}\n\
			 Address = {address}/32\n\
			 DNS = {dns}\n\
			 \n\
			 [Peer]\n\
			 PublicKey = {server_key}\n\
			 Endpoint = {endpoint}\n\
			 AllowedIPs = {ALLOWED_IPS}\n\
			 PersistentKeepalive = {PERSISTENT_KEEPALIVE_SECS}\n",
			private_key = private_key.to_base64().expose(),
			server_key = region.server_public_key,
			endpoint = region.endpoint,
		);
		out
	}

	pub fn render_peer(&self, peer: &Peer, region: &Region) -> String {
		self.render(&peer.private_key, peer.address, region, peer.features)
	}
}

/// Download name for a region's config.
pub fn config_filename(region_id: &str) -> String {
	format!("wgfleet-{region_id}.conf")
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::region::test_region;

	#[test]
	fn renders_exact_format() {
		let key = WgPrivateKey::from_bytes([7u8; 32]);
		let region = test_region("in-mumbai");
		let text = ConfigRenderer::default().render(
			&key,
			Ipv4Addr::new(10, 66, 10, 4),
			&region,
			PeerFeatures::default(),
		);

		let expected = format!(
			"[Interface]\n\
			 PrivateKey = {}\n\
			 Address = 10.66.10.4/32\n\
			 DNS = 1.1.1.1\n\
			 \n\
			 [Peer]\n\
			 PublicKey = hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo=\n\
			 Endpoint = 203.0.113.10:51820\n\
			 AllowedIPs = 0.0.0.0/0, ::/0\n\
			 PersistentKeepalive = 25\n",
			key.to_base64().expose()
		);
		assert_eq!(text, expected);
	}

	#[test]
	fn literal_layout_has_no_indentation() {
		let key = WgPrivateKey::from_bytes([1u8; 32]);
		let text = ConfigRenderer::default().render(
			&key,
			Ipv4Addr::new(10, 66, 10, 2),
			&test_region("r"),
			PeerFeatures::default(),
		);
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines.len(), 10);
		assert_eq!(lines[0], "[Interface]");
		assert_eq!(lines[4], "");
		assert_eq!(lines[5], "[Peer]");
		assert!(lines.iter().all(|l| !l.starts_with(' ') && !l.starts_with('\t')));
		assert!(text.ends_with("PersistentKeepalive = 25\n"));
	}

	#[test]
	fn content_filter_swaps_dns() {
		let key = WgPrivateKey::from_bytes([3u8; 32]);
		let text = ConfigRenderer::new("9.9.9.9").render(
			&key,
			Ipv4Addr::new(10, 66, 10, 2),
			&test_region("r"),
			PeerFeatures {
				content_filter: true,
			},
		);
		assert!(text.contains("DNS = 9.9.9.9\n"));
		assert!(!text.contains("1.1.1.1"));
	}

	#[test]
	fn filename_uses_region_id() {
		assert_eq!(config_filename("sg-singapore"), "wgfleet-sg-singapore.conf");
	}
}
