//! Token endpoint response parsing.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	delegation::{DelegatedToken, classify},
	error::{ConfigError, DelegationError, TransientError},
	http::{Endpoint, ResponseMetadata},
};

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::seconds(3599);

const BODY_PREVIEW_LIMIT: usize = 256;

#[derive(Debug, Deserialize)]
struct TokenResponse {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<ExpiresIn>,
	#[serde(default)]
	scope: Option<String>,
}

/// Entra returns `expires_in` as a number on v2 endpoints and as a string on some v1 paths.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
	Seconds(i64),
	Text(String),
}
impl ExpiresIn {
	fn seconds(&self) -> Result<i64, ConfigError> {
		match self {
			ExpiresIn::Seconds(secs) => Ok(*secs),
			ExpiresIn::Text(text) => text.trim().parse().map_err(|_| ConfigError::ExpiresInOutOfRange),
		}
	}
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
	#[serde(default)]
	error_codes: Vec<u64>,
	#[serde(default)]
	correlation_id: Option<String>,
}

/// Turns a token endpoint response into a [`DelegatedToken`] or a classified failure.
pub(crate) fn parse_token_response(
	status: u16,
	meta: &ResponseMetadata,
	body: &[u8],
	requested_scope: &str,
	issued_at: OffsetDateTime,
) -> Result<DelegatedToken> {
	if (200..300).contains(&status) {
		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let response: TokenResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransientError::ResponseParse {
				endpoint: Endpoint::Token,
				source,
				status: Some(status),
			})?;

		return build_token(response, requested_scope, issued_at);
	}

	if let Ok(rejection) = serde_json::from_slice::<ErrorResponse>(body) {
		let kind = classify::classify(
			&rejection.error,
			rejection.error_description.as_deref(),
			Some(status),
		);

		return Err(DelegationError {
			kind,
			code: rejection.error,
			description: rejection.error_description,
			error_codes: rejection.error_codes,
			correlation_id: rejection.correlation_id,
			status: Some(status),
		}
		.into());
	}

	Err(TransientError::Upstream {
		endpoint: Endpoint::Token,
		message: format!("HTTP {status}: {}", body_preview(body)),
		status: Some(status),
		retry_after: meta.retry_after,
	}
	.into())
}

fn build_token(
	response: TokenResponse,
	requested_scope: &str,
	issued_at: OffsetDateTime,
) -> Result<DelegatedToken> {
	let lifetime = match &response.expires_in {
		Some(value) => Duration::seconds(value.seconds()?),
		None => DEFAULT_EXPIRES_IN,
	};

	if !lifetime.is_positive() {
		return Err(ConfigError::NonPositiveExpiresIn.into());
	}

	let expires_at = issued_at.checked_add(lifetime).ok_or(ConfigError::ExpiresInOutOfRange)?;

	Ok(DelegatedToken {
		access_token: TokenSecret::new(response.access_token),
		token_type: response.token_type.unwrap_or_else(|| "Bearer".into()),
		scope: response.scope.unwrap_or_else(|| requested_scope.to_owned()),
		issued_at,
		expires_at,
	})
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let trimmed = text.trim();

	if trimmed.is_empty() {
		return "empty body".into();
	}
	if trimmed.chars().count() <= BODY_PREVIEW_LIMIT {
		return trimmed.to_owned();
	}

	let mut buf = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
