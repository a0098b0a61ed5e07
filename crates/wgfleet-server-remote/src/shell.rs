// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

/// Quote `value` as a single POSIX shell word.
///
/// Values made only of safe characters pass through unchanged.
pub fn shell_quote(value: &str) -> String {
	let safe = !value.is_empty()
		&& value
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || b"+/=.,:_-@%".contains(&b));
	if safe {
		return value.to_string();
	}
	format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn plain_words_unchanged() {
		assert_eq!(shell_quote("10.66.10.7/32"), "10.66.10.7/32");
		assert_eq!(
			shell_quote("hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo="),
			"hSDwCYkwp1R0i33ctD73Wg2/Og0mOBr066SpjqqbTmo="
		);
	}

	#[test]
	fn quotes_unsafe_values() {
		assert_eq!(shell_quote(""), "''");
		assert_eq!(shell_quote("a b"), "'a b'");
		assert_eq!(shell_quote("it's"), r"'it'\''s'");
		assert_eq!(shell_quote("$(reboot)"), "'$(reboot)'");
	}

	proptest! {
		#[test]
		fn quoted_output_has_no_bare_metacharacters(value in ".*") {
			let quoted = shell_quote(&value);
			if quoted != value {
				prop_assert!(quoted.starts_with('\''));
				prop_assert!(quoted.ends_with('\''));
			}
		}
	}
}
