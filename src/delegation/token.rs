//! Access tokens obtained through delegation.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Downstream access token returned by an on-behalf-of exchange.
///
/// Values are single-use results; the exchanger never caches them.
#[derive(Clone, Serialize, Deserialize)]
pub struct DelegatedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Token type reported by the provider (normally `Bearer`).
	pub token_type: String,
	/// Scope the token was requested for.
	pub scope: String,
	/// Instant the exchange completed.
	pub issued_at: OffsetDateTime,
	/// Absolute expiry derived from `expires_in`.
	pub expires_at: OffsetDateTime,
}
impl DelegatedToken {
	/// Returns true once `instant` reaches the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns true when the token is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Remaining lifetime at `instant`, clamped to zero.
	pub fn remaining_at(&self, instant: OffsetDateTime) -> Duration {
		let remaining = self.expires_at - instant;

		if remaining.is_negative() { Duration::ZERO } else { remaining }
	}

	/// Renders the `Authorization` header value for downstream calls.
	pub fn authorization_header(&self) -> String {
		format!("{} {}", self.token_type, self.access_token.expose())
	}
}
impl Debug for DelegatedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DelegatedToken")
			.field("access_token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
