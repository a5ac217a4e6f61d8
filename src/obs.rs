//! Optional observability helpers for client operations and decoder events.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `threadline.op` with the `op`, `subject`
//!   (request path, post id, or link fullname) and `outcome` fields, plus warnings for skipped
//!   children and forced delays.
//! - Enable `metrics` to increment the `threadline_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`, alongside decoder and gate counters.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::DecodeError, model::Kind};

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Listing page fetch.
	FetchListing,
	/// Record + comment tree fetch.
	FetchComments,
	/// Elided reply fetch.
	FetchMoreChildren,
	/// Bearer credential refresh.
	TokenRefresh,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::FetchListing => "fetch_listing",
			Operation::FetchComments => "fetch_comments",
			Operation::FetchMoreChildren => "fetch_more_children",
			Operation::TokenRefresh => "token_refresh",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Label used for children whose discriminator is not a known [`Kind`].
pub const UNKNOWN_KIND: &str = "unknown";

/// Reports a child dropped from a tree because it failed to decode.
///
/// `kind` is `None` when the discriminator was not recognized; the raw wire string is never used
/// as a label.
pub fn skipped_child(kind: Option<Kind>, error: &DecodeError) {
	let kind = kind_label(kind);

	#[cfg(feature = "tracing")]
	::tracing::warn!(kind, error = %error, "Skipping child that failed to decode.");

	record_skipped_child(kind);

	#[cfg(not(feature = "tracing"))]
	let _ = error;
}

/// Reports a node returned as a leaf because its id was already visited.
pub fn cycle_truncated(id: &str) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(id, "Repeated comment id; returning it without replies.");

	record_cycle_truncated();

	#[cfg(not(feature = "tracing"))]
	let _ = id;
}

/// Reports a forced delay pushed by server feedback.
pub fn forced_delay(delay: StdDuration) {
	#[cfg(feature = "tracing")]
	::tracing::warn!(delay_ms = delay.as_millis() as u64, "Server feedback forced a delay.");

	record_forced_delay(delay);
}

fn kind_label(kind: Option<Kind>) -> &'static str {
	kind.map_or(UNKNOWN_KIND, Kind::as_str)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn skipped_children_use_a_closed_label_set() {
		assert_eq!(kind_label(Some(Kind::Post)), "t3");
		assert_eq!(kind_label(None), UNKNOWN_KIND);

		for kind in Kind::ALL {
			assert_eq!(kind_label(Some(kind)), kind.as_str());
		}

		skipped_child(None, &DecodeError::UnknownKind { kind: "x".repeat(64) });
	}
}
