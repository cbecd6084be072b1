// self
use crate::{
	_prelude::*,
	obs::{self, OpOutcome, Operation},
};

/// One observed key refresh, verification, exchange, or dispatch.
///
/// [`OpSpan::start`] counts the attempt and opens an `entra_broker.op` span carrying `op`,
/// `stage`, and an initially empty `outcome`. [`OpSpan::run`] drives the operation inside the
/// span and fills `outcome` from its result, so every counted attempt is paired with exactly one
/// success or failure.
#[derive(Clone, Debug)]
pub struct OpSpan {
	op: Operation,
	#[cfg(feature = "tracing")]
	span: ::tracing::Span,
}
impl OpSpan {
	/// Counts an attempt of `op` and opens its span at `stage`.
	pub fn start(op: Operation, stage: &'static str) -> Self {
		obs::record_op_outcome(op, OpOutcome::Attempt);

		#[cfg(feature = "tracing")]
		{
			let span = ::tracing::info_span!(
				"entra_broker.op",
				op = op.as_str(),
				stage,
				outcome = ::tracing::field::Empty,
			);

			Self { op, span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self { op }
		}
	}

	/// Awaits `fut` inside the span, then records its outcome.
	///
	/// No guard is held across `.await` points; the span is attached to the future instead.
	pub async fn run<Fut, T, E>(&self, fut: Fut) -> Result<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
	{
		#[cfg(feature = "tracing")]
		let result = {
			use ::tracing::Instrument;

			fut.instrument(self.span.clone()).await
		};
		#[cfg(not(feature = "tracing"))]
		let result = fut.await;

		self.finish(if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });

		result
	}

	fn finish(&self, outcome: OpOutcome) {
		obs::record_op_outcome(self.op, outcome);

		#[cfg(feature = "tracing")]
		self.span.record("outcome", outcome.as_str());
	}
}

// Compiles to nothing without the `tracing` feature.
macro_rules! event {
	($level:ident, $($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	}};
}
pub(crate) use event;

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn run_passes_the_result_through() {
		let span = OpSpan::start(Operation::Verify, "token");
		let accepted = span.run(async { Ok::<_, &str>(42) }).await;

		assert_eq!(accepted, Ok(42));

		let span = OpSpan::start(Operation::Delegation, "exchange");
		let rejected = span.run(async { Err::<u8, _>("invalid_grant") }).await;

		assert_eq!(rejected, Err("invalid_grant"));
	}

	#[cfg(feature = "tracing")]
	#[test]
	fn spans_carry_op_stage_and_outcome_fields() {
		::tracing::subscriber::with_default(tracing_subscriber::registry(), || {
			let span = OpSpan::start(Operation::KeyRefresh, "initial_fetch");
			let metadata = span.span.metadata().expect("Span should be enabled under a subscriber.");

			assert_eq!(metadata.name(), "entra_broker.op");

			for field in ["op", "stage", "outcome"] {
				assert!(metadata.fields().field(field).is_some(), "missing field {field}");
			}

			span.finish(OpOutcome::Failure);
		});
	}
}
