//! Server rate-limit feedback carried on response headers.

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::http::{HeaderMap, HeaderName, header::RETRY_AFTER};
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// `X-RateLimit-Remaining`.
pub const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
/// `X-RateLimit-Reset`.
pub const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Spread factor applied when the remaining budget is low but not exhausted.
const SAFETY_MARGIN: f64 = 1.1;

/// Rate-limit hints parsed from a response, all in (fractional) seconds or request units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RateLimitHeaders {
	/// `Retry-After`, as seconds from now.
	pub retry_after: Option<f64>,
	/// `X-RateLimit-Remaining`.
	pub remaining: Option<f64>,
	/// `X-RateLimit-Reset`, as seconds from now.
	pub reset: Option<f64>,
}
impl RateLimitHeaders {
	/// Extracts the hints from `headers`; negative, non-finite, or unparsable values are ignored.
	pub fn from_headers(headers: &HeaderMap) -> Self {
		Self {
			retry_after: parse_retry_after(headers),
			remaining: parse_number(headers, &REMAINING),
			reset: parse_number(headers, &RESET),
		}
	}

	/// Returns `true` when no hint was present.
	pub fn is_empty(&self) -> bool {
		self.retry_after.is_none() && self.remaining.is_none() && self.reset.is_none()
	}

	/// Delay the server asks for, if any; the longer one wins when both sources apply.
	///
	/// - `Retry-After: S` asks for `S`.
	/// - `Remaining < threshold` with `Reset = R` asks for `R * 1.1 / Remaining`, or `R` once the
	///   budget is exhausted.
	pub fn forced_delay(&self, threshold: f64) -> Option<StdDuration> {
		let budget = match (self.remaining, self.reset) {
			(Some(remaining), Some(reset)) if remaining < threshold =>
				Some(if remaining > 0. { reset * SAFETY_MARGIN / remaining } else { reset }),
			_ => None,
		};

		self.retry_after
			.into_iter()
			.chain(budget)
			.filter_map(|secs| StdDuration::try_from_secs_f64(secs).ok())
			.max()
	}
}

fn parse_number(headers: &HeaderMap, name: &HeaderName) -> Option<f64> {
	headers
		.get(name)?
		.to_str()
		.ok()?
		.trim()
		.parse::<f64>()
		.ok()
		.filter(|value| value.is_finite() && *value >= 0.)
}

fn parse_retry_after(headers: &HeaderMap) -> Option<f64> {
	if let Some(secs) = parse_number(headers, &RETRY_AFTER) {
		return Some(secs);
	}

	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - OffsetDateTime::now_utc();

	delta.is_positive().then(|| delta.as_seconds_f64())
}
