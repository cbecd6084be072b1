//! Crate-wide error taxonomy shared by key discovery, verification, and delegation.
//!
//! Verification failures ([`VerifyError`]) are request-scoped rejections and always map to
//! `401`/`403`; everything else is a configuration, upstream, or transport problem that
//! callers should surface as a server-side failure.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, ScopeValidationError},
	delegation::RejectionKind,
	http::Endpoint,
	verify::VerifierPolicyError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Signing keys could not be obtained.
	#[error(transparent)]
	KeyFetch(#[from] KeyFetchError),
	/// Inbound bearer token was rejected.
	#[error(transparent)]
	Verification(#[from] VerifyError),
	/// Identity provider rejected an on-behalf-of exchange.
	#[error(transparent)]
	Delegation(#[from] DelegationError),
	/// Temporary upstream failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	/// Returns `true` when the error is a rejection of the caller's credentials rather than a
	/// server-side failure.
	pub fn is_authentication_failure(&self) -> bool {
		matches!(self, Self::Verification(_))
	}

	/// HTTP status code a server should answer with when this error ends a request.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::Verification(e) => e.status_code(),
			Self::Delegation(_) | Self::Transient(_) | Self::Transport(_) => 502,
			Self::KeyFetch(_) => 503,
			Self::Config(_) => 500,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured endpoint is not a valid URL.
	#[error("The {endpoint} URL is invalid.")]
	InvalidUrl {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Identifier validation failed.
	#[error(transparent)]
	InvalidIdentifier(#[from] IdentifierError),
	/// Scope list cannot be normalized.
	#[error("Configured scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
	/// Verifier policy failed validation.
	#[error(transparent)]
	InvalidPolicy(#[from] VerifierPolicyError),
	/// Required delegation settings are empty.
	#[error("Delegation settings are missing: {}.", .fields.join(", "))]
	MissingDelegationSettings {
		/// Names of the empty settings.
		fields: Vec<&'static str>,
	},
	/// A required environment variable is unset or empty.
	#[error("Environment variable `{name}` is required.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable could not be parsed.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidEnv {
		/// Variable name.
		name: &'static str,
		/// Parser explanation.
		reason: String,
	},
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
	/// Token endpoint returned a lifetime that does not fit a timestamp.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// A tool with the same name is already registered.
	#[error("Tool `{name}` is already registered.")]
	DuplicateTool {
		/// Conflicting tool name.
		name: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures while obtaining the identity provider's signing keys.
#[derive(Debug, ThisError)]
pub enum KeyFetchError {
	/// Every attempt failed; `source` holds the last failure.
	#[error("Key discovery at `{url}` failed after {attempts} attempt(s).")]
	Unavailable {
		/// Key discovery URL.
		url: String,
		/// Number of attempts performed.
		attempts: u32,
		/// Failure reported by the final attempt.
		#[source]
		source: Box<Error>,
	},
	/// Key set document is not valid JSON or does not match the JWKS shape.
	#[error("Key set document from `{url}` is malformed.")]
	Malformed {
		/// Key discovery URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Key set document parsed but contains no usable signing keys.
	#[error("Key set document from `{url}` contains no usable signing keys.")]
	NoUsableKeys {
		/// Key discovery URL.
		url: String,
	},
}

/// Reasons an inbound bearer token is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum VerifyError {
	/// Token is not a compact JWS or its segments cannot be decoded.
	#[error("Token is malformed: {reason}.")]
	Malformed {
		/// Decoder explanation.
		reason: String,
	},
	/// No trusted key matches the token, the algorithm is not accepted, or the signature check
	/// failed.
	#[error("Token signature is invalid: {reason}.")]
	InvalidSignature {
		/// Verifier explanation.
		reason: String,
	},
	/// Current time is past the token's `exp`.
	#[error("Token has expired.")]
	Expired,
	/// Current time is before the token's `nbf`.
	#[error("Token is not valid yet.")]
	NotYetValid,
	/// `iss` does not match the configured issuer.
	#[error("Token issuer does not match the configured issuer.")]
	InvalidIssuer,
	/// `aud` does not match the configured audience.
	#[error("Token audience does not match the configured audience.")]
	InvalidAudience,
	/// A claim the verifier needs is absent.
	#[error("Token is missing the `{claim}` claim.")]
	MissingClaim {
		/// Claim name.
		claim: String,
	},
	/// Granted scopes do not cover the required scopes.
	#[error("Token lacks the required scopes: {}.", .missing.join(", "))]
	InsufficientScope {
		/// Required scopes absent from the token, sorted.
		missing: Vec<String>,
	},
}
impl VerifyError {
	/// HTTP status for the rejection: `403` for insufficient scope, `401` otherwise.
	pub fn status_code(&self) -> u16 {
		match self {
			Self::InsufficientScope { .. } => 403,
			_ => 401,
		}
	}

	/// RFC 6750 error code for the `WWW-Authenticate` challenge.
	pub fn oauth_error_code(&self) -> &'static str {
		match self {
			Self::InsufficientScope { .. } => "insufficient_scope",
			_ => "invalid_token",
		}
	}
}

/// Identity provider rejection of an on-behalf-of exchange.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("On-behalf-of exchange was rejected with `{code}`{}.", describe(.description))]
pub struct DelegationError {
	/// Classified rejection category.
	pub kind: RejectionKind,
	/// OAuth `error` code returned by the provider.
	pub code: String,
	/// OAuth `error_description`, when supplied.
	pub description: Option<String>,
	/// Entra `error_codes` (AADSTS numbers), when supplied.
	pub error_codes: Vec<u64>,
	/// Entra `correlation_id`, when supplied.
	pub correlation_id: Option<String>,
	/// HTTP status of the rejection.
	pub status: Option<u16>,
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("{endpoint} returned an unexpected response: {message}.")]
	Upstream {
		/// Endpoint that produced the response.
		endpoint: Endpoint,
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Provider responded with JSON that could not be parsed.
	#[error("{endpoint} returned malformed JSON.")]
	ResponseParse {
		/// Endpoint that produced the response.
		endpoint: Endpoint,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("{endpoint} could not be reached.")]
	Network {
		/// Endpoint being called.
		endpoint: Endpoint,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an identity provider endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(endpoint: Endpoint, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

fn describe(description: &Option<String>) -> String {
	match description {
		Some(text) => format!(": {}", text.trim_end_matches('.')),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn verification_errors_map_to_rejection_statuses() {
		let scope = VerifyError::InsufficientScope { missing: vec!["files.read".into()] };

		assert_eq!(scope.status_code(), 403);
		assert_eq!(scope.oauth_error_code(), "insufficient_scope");
		assert_eq!(scope.to_string(), "Token lacks the required scopes: files.read.");
		assert_eq!(VerifyError::Expired.status_code(), 401);

		let err = Error::from(VerifyError::InvalidIssuer);

		assert!(err.is_authentication_failure());
		assert_eq!(err.status_code(), 401);
	}

	#[test]
	fn delegation_error_message_names_provider_code() {
		let err = DelegationError {
			kind: RejectionKind::InvalidGrant,
			code: "invalid_grant".into(),
			description: Some("AADSTS50013: Assertion failed signature validation.".into()),
			error_codes: vec![50013],
			correlation_id: None,
			status: Some(400),
		};
		let message = err.to_string();

		assert!(message.contains("invalid_grant"));
		assert!(message.ends_with("signature validation."));
		assert!(!Error::from(err).is_authentication_failure());
	}

	#[test]
	fn missing_settings_enumerate_fields() {
		let err = ConfigError::MissingDelegationSettings { fields: vec!["tenant_id", "client_secret"] };

		assert_eq!(err.to_string(), "Delegation settings are missing: tenant_id, client_secret.");
	}
}
