// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Commands understood by the peer-management script installed on each node.

use std::net::Ipv4Addr;

use wgfleet_tunnel_common::WgPublicKey;

use crate::shell::shell_quote;

/// Default invocation prefix. Needs passwordless sudo since sessions run
/// without a pty.
pub const DEFAULT_PEER_SCRIPT: &str = "sudo /usr/local/bin/wgfleet-peer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCommand {
	/// Header line followed by one tab-separated line per peer.
	Dump,
	AddPeer {
		public_key: WgPublicKey,
		address: Ipv4Addr,
	},
	RemovePeer {
		public_key: WgPublicKey,
	},
}

impl PeerCommand {
	/// Full command line, prefixed by `script`.
	pub fn render(&self, script: &str) -> String {
		match self {
			PeerCommand::Dump => format!("{script} dump"),
			PeerCommand::AddPeer {
				public_key,
				address,
			} => format!(
				"{script} add-peer {} {}",
				shell_quote(&public_key.to_base64()),
				shell_quote(&format!("{address}/32"))
			),
			PeerCommand::RemovePeer { public_key } => {
				format!("{script} remove-peer {}", shell_quote(&public_key.to_base64()))
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const PK: &str = "hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo=";

	#[test]
	fn renders_each_command() {
		let public_key = WgPublicKey::from_base64(PK).unwrap();

		assert_eq!(
			PeerCommand::Dump.render(DEFAULT_PEER_SCRIPT),
			"sudo /usr/local/bin/wgfleet-peer dump"
		);
		assert_eq!(
			PeerCommand::AddPeer {
				public_key,
				address: Ipv4Addr::new(10, 66, 10, 2),
			}
			.render("wg-peer"),
			format!("wg-peer add-peer {PK} 10.66.10.2/32")
		);
		assert_eq!(
			PeerCommand::RemovePeer { public_key }.render("wg-peer"),
			format!("wg-peer remove-peer {PK}")
		);
	}
}
