// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DbError;

/// Fixed-width RFC 3339 (`2025-01-01T00:00:00.000Z`) so text comparison in
/// SQL orders the same as time.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DbError> {
	DateTime::parse_from_rfc3339(s)
		.map(|dt| dt.with_timezone(&Utc))
		.or_else(|_| {
			chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
				.map(|ndt| ndt.and_utc())
				.map_err(|_| DbError::Internal(format!("invalid datetime: {s}")))
		})
}

pub fn parse_optional_datetime(s: Option<&str>) -> Result<Option<DateTime<Utc>>, DbError> {
	s.map(parse_datetime).transpose()
}
