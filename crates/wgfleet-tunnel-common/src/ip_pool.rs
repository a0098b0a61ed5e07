// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Address selection from a region's live peer table.
//!
//! Edge nodes are authoritative for which addresses are in use. The control
//! side never keeps a counter; it asks the node for a `dump`, runs
//! [`allocate`] over the text and requests the returned address.

use ipnet::Ipv4Net;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// First assignable host number. `.0` is the network and `.1` the node itself.
pub const FIRST_HOST: u8 = 2;
pub const LAST_HOST: u8 = 254;

/// Column of a `dump` row holding the comma separated allowed-ips.
const ALLOWED_IPS_FIELD: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpPoolError {
	#[error("address pool {0}.0/24 exhausted")]
	PoolExhausted(SubnetPrefix),

	#[error("invalid subnet prefix: {0}")]
	InvalidPrefix(String),
}

pub type Result<T> = std::result::Result<T, IpPoolError>;

/// The first three octets of a region's /24, written `10.66.10`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubnetPrefix([u8; 3]);

impl SubnetPrefix {
	pub fn new(a: u8, b: u8, c: u8) -> Self {
		Self([a, b, c])
	}

	pub fn host(&self, n: u8) -> Ipv4Addr {
		let [a, b, c] = self.0;
		Ipv4Addr::new(a, b, c, n)
	}

	pub fn network(&self) -> Ipv4Net {
		Ipv4Net::new(self.host(0), 24).unwrap_or_else(|_| Ipv4Net::from(self.host(0)))
	}

	pub fn contains(&self, addr: Ipv4Addr) -> bool {
		let [a, b, c, _] = addr.octets();
		self.0 == [a, b, c]
	}
}

impl FromStr for SubnetPrefix {
	type Err = IpPoolError;

	fn from_str(s: &str) -> Result<Self> {
		let trimmed = s.trim().trim_end_matches('.');
		let octets: Vec<&str> = trimmed.split('.').collect();
		if octets.len() != 3 {
			return Err(IpPoolError::InvalidPrefix(s.to_string()));
		}

		let mut parsed = [0u8; 3];
		for (slot, octet) in parsed.iter_mut().zip(octets) {
			*slot = octet
				.parse()
				.map_err(|_| IpPoolError::InvalidPrefix(s.to_string()))?;
		}
		Ok(Self(parsed))
	}
}

impl fmt::Display for SubnetPrefix {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let [a, b, c] = self.0;
		write!(f, "{a}.{b}.{c}")
	}
}

impl fmt::Debug for SubnetPrefix {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SubnetPrefix({self})")
	}
}

impl Serialize for SubnetPrefix {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for SubnetPrefix {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// Host numbers inside `prefix` that the dump reports as assigned.
///
/// The first non-empty line is the interface header and is skipped. Rows with
/// too few fields and blocks that are not IPv4 are ignored.
pub fn used_hosts(prefix: &SubnetPrefix, dump: &str) -> HashSet<u8> {
	dump
		.lines()
		.map(str::trim)
		.filter(|line| !line.is_empty())
		.skip(1)
		.filter_map(|line| line.split('\t').nth(ALLOWED_IPS_FIELD))
		.flat_map(|blocks| blocks.split(','))
		.filter_map(|block| {
			let addr = block.trim().split('/').next()?;
			addr.parse::<Ipv4Addr>().ok()
		})
		.filter(|addr| prefix.contains(*addr))
		.map(|addr| addr.octets()[3])
		.collect()
}

/// Lowest host address in `prefix` that is not assigned in `dump`.
pub fn allocate(prefix: &SubnetPrefix, dump: &str) -> Result<Ipv4Addr> {
	let used = used_hosts(prefix, dump);
	(FIRST_HOST..=LAST_HOST)
		.find(|n| !used.contains(n))
		.map(|n| prefix.host(n))
		.ok_or(IpPoolError::PoolExhausted(*prefix))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	const HEADER: &str = "privkey\tpubkey\t51820\toff";

	fn prefix() -> SubnetPrefix {
		"10.66.10".parse().unwrap()
	}

	fn dump_with(hosts: &[u8]) -> String {
		let mut dump = String::from(HEADER);
		for (i, host) in hosts.iter().enumerate() {
			dump.push_str(&format!(
				"\npk{i}\t(none)\t1.2.3.4:51820\t10.66.10.{host}/32\t0\t0\t0\toff"
			));
		}
		dump
	}

	#[test]
	fn parses_prefix() {
		assert_eq!(prefix(), SubnetPrefix::new(10, 66, 10));
		assert_eq!("10.66.10.".parse::<SubnetPrefix>().unwrap(), prefix());
		assert_eq!(prefix().to_string(), "10.66.10");
		assert_eq!(prefix().network().to_string(), "10.66.10.0/24");
	}

	#[test]
	fn rejects_bad_prefix() {
		assert!("10.66".parse::<SubnetPrefix>().is_err());
		assert!("10.66.10.4".parse::<SubnetPrefix>().is_err());
		assert!("10.66.300".parse::<SubnetPrefix>().is_err());
		assert!("".parse::<SubnetPrefix>().is_err());
	}

	#[test]
	fn empty_dump_yields_first_host() {
		assert_eq!(allocate(&prefix(), "").unwrap(), Ipv4Addr::new(10, 66, 10, 2));
		assert_eq!(
			allocate(&prefix(), HEADER).unwrap(),
			Ipv4Addr::new(10, 66, 10, 2)
		);
	}

	#[test]
	fn comma_separated_blocks_are_all_used() {
		let dump = "wg0\tpriv\t51820\toff\niface\tpk\t...\t10.66.10.2/32,10.66.10.3/32";
		assert_eq!(allocate(&prefix(), dump).unwrap(), Ipv4Addr::new(10, 66, 10, 4));
	}

	#[test]
	fn header_line_is_ignored_even_if_it_looks_like_a_peer() {
		let dump = "a\tb\tc\t10.66.10.2/32\nx\ty\tz\t10.66.10.3/32";
		assert_eq!(allocate(&prefix(), dump).unwrap(), Ipv4Addr::new(10, 66, 10, 2));
	}

	#[test]
	fn fills_gaps_before_appending() {
		let dump = dump_with(&[2, 3, 5, 6]);
		assert_eq!(allocate(&prefix(), &dump).unwrap(), Ipv4Addr::new(10, 66, 10, 4));
	}

	#[test]
	fn other_subnets_and_ipv6_are_ignored() {
		let dump = format!(
			"{HEADER}\npk\t(none)\t(none)\t10.66.20.2/32,fd00::2/128,10.66.1.2/32\n"
		);
		assert_eq!(allocate(&prefix(), &dump).unwrap(), Ipv4Addr::new(10, 66, 10, 2));
	}

	#[test]
	fn malformed_lines_are_skipped() {
		let dump = format!(
			"{HEADER}\n\n   \nshort\tline\ngarbage\t\t\tnot-an-ip/32, 10.66.10.2/32\n\tonly\ttabs\t"
		);
		assert_eq!(allocate(&prefix(), &dump).unwrap(), Ipv4Addr::new(10, 66, 10, 3));
	}

	#[test]
	fn crlf_and_surrounding_whitespace_tolerated() {
		let dump = "header\r\n  p\tq\tr\t10.66.10.2/32  \r\n";
		assert_eq!(allocate(&prefix(), dump).unwrap(), Ipv4Addr::new(10, 66, 10, 3));
	}

	#[test]
	fn full_pool_is_exhausted() {
		let hosts: Vec<u8> = (FIRST_HOST..=LAST_HOST).collect();
		let dump = dump_with(&hosts);
		assert_eq!(
			allocate(&prefix(), &dump),
			Err(IpPoolError::PoolExhausted(prefix()))
		);
	}

	#[test]
	fn reserved_hosts_do_not_count() {
		let mut hosts: Vec<u8> = (FIRST_HOST..LAST_HOST).collect();
		hosts.push(0);
		hosts.push(1);
		hosts.push(255);
		let dump = dump_with(&hosts);
		assert_eq!(
			allocate(&prefix(), &dump).unwrap(),
			Ipv4Addr::new(10, 66, 10, LAST_HOST)
		);
	}

	proptest! {
		#[test]
		fn never_returns_used_and_returns_smallest_free(
			hosts in prop::collection::vec(FIRST_HOST..=LAST_HOST, 0..300)
		) {
			let dump = dump_with(&hosts);
			let used: HashSet<u8> = hosts.iter().copied().collect();
			match allocate(&prefix(), &dump) {
				Ok(addr) => {
					let n = addr.octets()[3];
					prop_assert!(prefix().contains(addr));
					prop_assert!(!used.contains(&n));
					prop_assert!((FIRST_HOST..n).all(|m| used.contains(&m)));
				}
				Err(IpPoolError::PoolExhausted(_)) => {
					prop_assert!((FIRST_HOST..=LAST_HOST).all(|m| used.contains(&m)));
				}
				Err(other) => prop_assert!(false, "unexpected error {other:?}"),
			}
		}

		#[test]
		fn allocation_is_deterministic(hosts in prop::collection::vec(any::<u8>(), 0..50)) {
			let dump = dump_with(&hosts);
			prop_assert_eq!(allocate(&prefix(), &dump), allocate(&prefix(), &dump));
		}
	}
}
