// self
use crate::{
	_prelude::*,
	obs::{Operation, Outcome},
};

/// Future returned by [`OpSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`OpSpan::instrument`]; a plain passthrough without the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// `threadline.op` span opened around one client operation.
///
/// The span carries the operation, the subject it acts on (request path, post id, or link
/// fullname), and an `outcome` field filled in by [`OpSpan::finish`].
#[derive(Clone, Debug)]
pub struct OpSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OpSpan {
	/// Opens a span for `op` acting on `subject`.
	pub fn new(op: Operation, subject: &str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"threadline.op",
				op = op.as_str(),
				subject,
				outcome = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, subject);

			Self {}
		}
	}

	/// Runs `fut` inside the span without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Stamps the final outcome onto the span.
	pub fn finish(&self, outcome: Outcome) {
		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());

		#[cfg(not(feature = "tracing"))]
		let _ = outcome;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn span_wraps_an_operation_end_to_end() {
		let span = OpSpan::new(Operation::FetchComments, "abc123");
		let value = span.instrument(async { 42 }).await;

		span.finish(Outcome::Success);

		assert_eq!(value, 42);
	}
}
