//! Credential material that flows through verification and on-behalf-of exchanges.

// self
use crate::_prelude::*;

/// A bearer assertion, client secret, or downstream access token.
///
/// The inbound user token is kept on [`VerifiedIdentity`](crate::auth::VerifiedIdentity) so it
/// can be replayed as the on-behalf-of `assertion`; the confidential client secret and the
/// delegated access token travel the same way. None of them may reach a log line, so the
/// formatters only say whether a value is present.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a credential.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw credential for the wire. Never log the result.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns the raw credential without surrounding whitespace, as sent in form fields.
	pub fn expose_trimmed(&self) -> &str {
		self.0.trim()
	}

	/// Returns true when nothing but whitespace was supplied, which delegation treats as an
	/// unset setting.
	pub fn is_blank(&self) -> bool {
		self.expose_trimmed().is_empty()
	}

	fn placeholder(&self) -> &'static str {
		if self.is_blank() { "<blank>" } else { "<redacted>" }
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({})", self.placeholder())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.placeholder())
	}
}
