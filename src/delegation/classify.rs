//! Classification of on-behalf-of rejections.
//!
//! Structured OAuth fields win over the description, which wins over the HTTP status.

/// Canonical categories for identity provider rejections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RejectionKind {
	/// The user assertion was refused (expired, revoked, wrong audience, or access denied).
	InvalidGrant,
	/// The user must sign in again or consent before the exchange can succeed.
	InteractionRequired,
	/// The confidential client failed to authenticate.
	InvalidClient,
	/// The target scope is unknown or not granted to the client.
	InvalidScope,
	/// The provider reported a temporary failure.
	Transient,
}
impl RejectionKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RejectionKind::InvalidGrant => "invalid_grant",
			RejectionKind::InteractionRequired => "interaction_required",
			RejectionKind::InvalidClient => "invalid_client",
			RejectionKind::InvalidScope => "invalid_scope",
			RejectionKind::Transient => "transient",
		}
	}

	/// Returns true when retrying the same exchange later may succeed.
	pub fn is_retryable(self) -> bool {
		matches!(self, RejectionKind::Transient)
	}
}

/// Classifies a rejection from the OAuth `error`, `error_description`, and HTTP status.
pub fn classify(code: &str, description: Option<&str>, status: Option<u16>) -> RejectionKind {
	match_code(code)
		.or_else(|| description.and_then(match_description))
		.unwrap_or_else(|| classify_status(status))
}

fn match_code(value: &str) -> Option<RejectionKind> {
	let value = value.trim();

	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(RejectionKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("interaction_required")
		|| value.eq_ignore_ascii_case("consent_required")
		|| value.eq_ignore_ascii_case("login_required")
	{
		Some(RejectionKind::InteractionRequired)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(RejectionKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("invalid_scope") {
		Some(RejectionKind::InvalidScope)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(RejectionKind::Transient)
	} else {
		None
	}
}

fn match_description(description: &str) -> Option<RejectionKind> {
	let lowered = description.to_ascii_lowercase();

	match lowered.as_str() {
		text if text.contains("consent") || text.contains("interaction_required") =>
			Some(RejectionKind::InteractionRequired),
		text if text.contains("invalid_grant") || text.contains("assertion") =>
			Some(RejectionKind::InvalidGrant),
		text if text.contains("invalid_client") || text.contains("client secret") =>
			Some(RejectionKind::InvalidClient),
		text if text.contains("invalid_scope") || text.contains("scope") =>
			Some(RejectionKind::InvalidScope),
		text if text.contains("temporarily") || text.contains("retry") =>
			Some(RejectionKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> RejectionKind {
	match status {
		Some(400) => RejectionKind::InvalidGrant,
		Some(401) => RejectionKind::InvalidClient,
		Some(403) => RejectionKind::InvalidScope,
		_ => RejectionKind::Transient,
	}
}
