//! Bearer token verification.
//!
//! [`TokenVerifier::verify`] checks, in order:
//!
//! 1. the token is a compact JWS whose header names an accepted asymmetric algorithm and a `kid`;
//! 2. the unverified `exp` has not passed, so expired tokens report [`VerifyError::Expired`]
//!    whatever their signature;
//! 3. the `kid` resolves to a cached key, forcing one key set refresh when it does not;
//! 4. the signature, `exp`, `nbf`, `iss`, and `aud` validate against that key alone;
//! 5. the `scp` claim covers every required scope.
//!
//! Verification never retries. The only network traffic it can cause is the forced refresh in
//! step 3, which [`KeySetCache`] coalesces and rate-limits.

mod policy;

pub use policy::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, VerifiedIdentity, identity},
	error::VerifyError,
	http::{IdpHttpClient, TransportErrorMapper},
	jwks::KeySetCache,
	obs::{self, OpSpan, Operation},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Verifier specialized for the crate's default reqwest transport stack.
pub type ReqwestTokenVerifier = TokenVerifier<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Validates inbound bearer tokens against a [`KeySetCache`] and a [`VerifierPolicy`].
pub struct TokenVerifier<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	keys: Arc<KeySetCache<C, M>>,
	policy: VerifierPolicy,
}
impl<C, M> TokenVerifier<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a verifier over a shared key set cache.
	pub fn new(keys: Arc<KeySetCache<C, M>>, policy: VerifierPolicy) -> Self {
		Self { keys, policy }
	}

	/// Policy in effect.
	pub fn policy(&self) -> &VerifierPolicy {
		&self.policy
	}

	/// Key set cache backing the verifier.
	pub fn keys(&self) -> &Arc<KeySetCache<C, M>> {
		&self.keys
	}

	/// Verifies `token` and returns the caller's identity.
	///
	/// Every failure is a [`VerifyError`] wrapped in [`Error::Verification`].
	pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
		let result = OpSpan::start(Operation::Verify, "verify").run(self.verify_inner(token)).await;

		if let Err(err) = &result {
			obs::event!(info, reason = %err, "Rejected bearer token.");
		}

		result.map_err(Error::from)
	}

	async fn verify_inner(&self, token: &str) -> Result<VerifiedIdentity, VerifyError> {
		let token = token.trim();
		let unverified = peek_claims(token)?;
		let header = jsonwebtoken::decode_header(token)
			.map_err(|e| VerifyError::Malformed { reason: e.to_string() })?;

		check_unverified_expiry(&unverified, OffsetDateTime::now_utc(), self.policy.leeway())?;

		if !self.policy.accepts(header.alg) {
			return Err(VerifyError::InvalidSignature {
				reason: format!("algorithm {:?} is not accepted", header.alg),
			});
		}

		let kid = header.kid.as_deref().ok_or_else(|| VerifyError::InvalidSignature {
			reason: "token header has no key identifier".into(),
		})?;
		let key = match self.keys.key(kid) {
			Some(key) => key,
			None => self.keys.refresh_for_unknown_key(kid).await.ok_or_else(|| {
				VerifyError::InvalidSignature { reason: format!("no signing key matches `{kid}`") }
			})?,
		};

		if !key.accepts(header.alg) {
			return Err(VerifyError::InvalidSignature {
				reason: format!("key `{kid}` does not sign with {:?}", header.alg),
			});
		}

		let data = jsonwebtoken::decode::<JsonMap<String, JsonValue>>(
			token,
			key.decoding_key(),
			&self.policy.validation(header.alg),
		)
		.map_err(map_jwt_error)?;
		let granted = data
			.claims
			.get("scp")
			.and_then(JsonValue::as_str)
			.map(ScopeSet::from_claim)
			.unwrap_or_default();
		let missing = self.policy.required_scopes().missing_from(&granted);

		if !missing.is_empty() {
			return Err(VerifyError::InsufficientScope { missing });
		}

		VerifiedIdentity::from_claims(data.claims, token)
	}
}
impl<C, M> Debug for TokenVerifier<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenVerifier")
			.field("keys", &self.keys)
			.field("policy", &self.policy)
			.finish()
	}
}

/// Decodes the payload segment without checking the signature.
fn peek_claims(token: &str) -> Result<JsonMap<String, JsonValue>, VerifyError> {
	let mut segments = token.split('.');
	let (Some(_header), Some(payload), Some(_signature), None) =
		(segments.next(), segments.next(), segments.next(), segments.next())
	else {
		return Err(VerifyError::Malformed { reason: "expected three dot-separated segments".into() });
	};
	let bytes = URL_SAFE_NO_PAD
		.decode(payload)
		.map_err(|_| VerifyError::Malformed { reason: "payload is not base64url".into() })?;

	serde_json::from_slice(&bytes)
		.map_err(|_| VerifyError::Malformed { reason: "payload is not a JSON object".into() })
}

fn check_unverified_expiry(
	claims: &JsonMap<String, JsonValue>,
	now: OffsetDateTime,
	leeway: Duration,
) -> Result<(), VerifyError> {
	let exp = claims
		.get("exp")
		.ok_or_else(|| VerifyError::MissingClaim { claim: "exp".into() })?;
	let exp = identity::numeric_date(exp)
		.ok_or_else(|| VerifyError::Malformed { reason: "`exp` is not a NumericDate".into() })?;

	if now.unix_timestamp() > exp.saturating_add(leeway.whole_seconds()) {
		return Err(VerifyError::Expired);
	}

	Ok(())
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> VerifyError {
	match err.kind() {
		ErrorKind::ExpiredSignature => VerifyError::Expired,
		ErrorKind::ImmatureSignature => VerifyError::NotYetValid,
		ErrorKind::InvalidIssuer => VerifyError::InvalidIssuer,
		ErrorKind::InvalidAudience => VerifyError::InvalidAudience,
		ErrorKind::MissingRequiredClaim(claim) => match claim.as_str() {
			"iss" => VerifyError::InvalidIssuer,
			"aud" => VerifyError::InvalidAudience,
			other => VerifyError::MissingClaim { claim: other.to_owned() },
		},
		ErrorKind::InvalidSignature
		| ErrorKind::InvalidAlgorithm
		| ErrorKind::InvalidAlgorithmName
		| ErrorKind::InvalidKeyFormat
		| ErrorKind::InvalidEcdsaKey
		| ErrorKind::InvalidRsaKey(_) => VerifyError::InvalidSignature { reason: err.to_string() },
		_ => VerifyError::Malformed { reason: err.to_string() },
	}
}
