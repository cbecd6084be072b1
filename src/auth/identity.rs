//! Caller identity produced by a successful token verification.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::VerifyError,
};

/// Immutable view of a verified bearer token.
///
/// Only [`TokenVerifier`](crate::verify::TokenVerifier) constructs values of this type, so
/// holding one proves the signature, lifetime, issuer, audience, and required scopes were
/// checked. The raw bearer string is retained (redacted) so it can be presented as the
/// on-behalf-of assertion.
#[derive(Clone, Debug)]
pub struct VerifiedIdentity {
	subject: Option<String>,
	client_id: Option<String>,
	tenant_id: Option<String>,
	issuer: String,
	scopes: ScopeSet,
	roles: BTreeSet<String>,
	claims: JsonMap<String, JsonValue>,
	issued_at: Option<OffsetDateTime>,
	not_before: Option<OffsetDateTime>,
	expires_at: OffsetDateTime,
	assertion: TokenSecret,
}
impl VerifiedIdentity {
	pub(crate) fn from_claims(
		claims: JsonMap<String, JsonValue>,
		assertion: &str,
	) -> Result<Self, VerifyError> {
		let issuer = string_claim(&claims, "iss")
			.ok_or_else(|| VerifyError::MissingClaim { claim: "iss".into() })?;
		let expires_at = timestamp_claim(&claims, "exp")?
			.ok_or_else(|| VerifyError::MissingClaim { claim: "exp".into() })?;
		let scopes = claims
			.get("scp")
			.and_then(JsonValue::as_str)
			.map(ScopeSet::from_claim)
			.unwrap_or_default();
		let roles = claims
			.get("roles")
			.and_then(JsonValue::as_array)
			.map(|values| values.iter().filter_map(JsonValue::as_str).map(str::to_owned).collect())
			.unwrap_or_default();

		Ok(Self {
			subject: string_claim(&claims, "sub"),
			client_id: string_claim(&claims, "azp").or_else(|| string_claim(&claims, "appid")),
			tenant_id: string_claim(&claims, "tid"),
			issuer,
			scopes,
			roles,
			issued_at: timestamp_claim(&claims, "iat")?,
			not_before: timestamp_claim(&claims, "nbf")?,
			expires_at,
			assertion: TokenSecret::new(assertion),
			claims,
		})
	}

	/// Subject (`sub`) claim.
	pub fn subject(&self) -> Option<&str> {
		self.subject.as_deref()
	}

	/// Calling application: `azp`, falling back to the v1 `appid` claim.
	pub fn client_id(&self) -> Option<&str> {
		self.client_id.as_deref()
	}

	/// Directory (`tid`) claim.
	pub fn tenant_id(&self) -> Option<&str> {
		self.tenant_id.as_deref()
	}

	/// Issuer (`iss`) claim.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Delegated permissions granted through `scp`.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// App roles granted through `roles`.
	pub fn roles(&self) -> &BTreeSet<String> {
		&self.roles
	}

	/// Returns true when `role` is granted. Role names are case-sensitive.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.contains(role)
	}

	/// Returns true when `scope` is granted, ignoring ASCII case.
	pub fn has_scope(&self, scope: &str) -> bool {
		self.scopes.contains(scope)
	}

	/// Every verified claim.
	pub fn claims(&self) -> &JsonMap<String, JsonValue> {
		&self.claims
	}

	/// Looks up a single claim.
	pub fn claim(&self, name: &str) -> Option<&JsonValue> {
		self.claims.get(name)
	}

	/// Looks up a claim that is expected to be a string.
	pub fn string_claim(&self, name: &str) -> Option<&str> {
		self.claims.get(name).and_then(JsonValue::as_str)
	}

	/// Issued-at (`iat`) instant.
	pub fn issued_at(&self) -> Option<OffsetDateTime> {
		self.issued_at
	}

	/// Not-before (`nbf`) instant.
	pub fn not_before(&self) -> Option<OffsetDateTime> {
		self.not_before
	}

	/// Expiry (`exp`) instant.
	pub fn expires_at(&self) -> OffsetDateTime {
		self.expires_at
	}

	/// The bearer token this identity was verified from.
	pub fn assertion(&self) -> &TokenSecret {
		&self.assertion
	}
}

/// Reads a JWT NumericDate, tolerating fractional seconds.
pub(crate) fn numeric_date(value: &JsonValue) -> Option<i64> {
	value.as_i64().or_else(|| value.as_f64().map(|secs| secs.floor() as i64))
}

fn string_claim(claims: &JsonMap<String, JsonValue>, name: &str) -> Option<String> {
	claims.get(name).and_then(JsonValue::as_str).map(str::to_owned)
}

fn timestamp_claim(
	claims: &JsonMap<String, JsonValue>,
	name: &str,
) -> Result<Option<OffsetDateTime>, VerifyError> {
	let Some(value) = claims.get(name) else {
		return Ok(None);
	};
	let secs = numeric_date(value)
		.ok_or_else(|| VerifyError::Malformed { reason: format!("`{name}` is not a NumericDate") })?;

	OffsetDateTime::from_unix_timestamp(secs)
		.map(Some)
		.map_err(|_| VerifyError::Malformed { reason: format!("`{name}` is out of range") })
}
