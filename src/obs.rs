//! Optional observability helpers for key refresh, verification, delegation, and dispatch.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `entra_broker.op` with the `op`, `stage`,
//!   and `outcome` fields, plus component events (key refresh failures, rejected tokens,
//!   provider rejections). Events never carry token material.
//! - Enable `metrics` to increment the `entra_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.
//!
//! Installing a subscriber is left to the host; [`LogLevels::directives`] renders the
//! per-component levels the host configured into a filter string.

mod levels;
mod metrics;
mod tracing;

pub use self::{levels::*, metrics::*, tracing::*};

pub(crate) use self::tracing::event;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Bearer token verification.
	Verify,
	/// Key set fetch or refresh.
	KeyRefresh,
	/// On-behalf-of exchange.
	Delegation,
	/// Tool dispatch through the gateway.
	Dispatch,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Verify => "verify",
			Operation::KeyRefresh => "key_refresh",
			Operation::Delegation => "delegation",
			Operation::Dispatch => "dispatch",
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
pub enum OpOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
