// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{Operation, Outcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"threadline_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

pub(crate) fn record_skipped_child(kind: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("threadline_decode_skipped_total", "kind" => kind).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}

pub(crate) fn record_cycle_truncated() {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("threadline_decode_cycle_total").increment(1);
	}
}

pub(crate) fn record_forced_delay(delay: StdDuration) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("threadline_gate_forced_delay_total").increment(1);
		metrics::histogram!("threadline_gate_forced_delay_seconds").record(delay.as_secs_f64());
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = delay;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_installed_recorder() {
		record_op_outcome(Operation::FetchListing, Outcome::Failure);
		record_skipped_child("t1");
		record_cycle_truncated();
		record_forced_delay(StdDuration::from_millis(5));
	}
}
