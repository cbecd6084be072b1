//! Environment-driven configuration.
//!
//! | Variable | Meaning | Default |
//! | --- | --- | --- |
//! | `ENTRA_TENANT_ID` | Directory the API is registered in | required |
//! | `ENTRA_APP_CLIENT_ID` | Application (client) id of this API | required |
//! | `ENTRA_AUDIENCE` | Expected `aud` | client id |
//! | `ENTRA_REQUIRED_SCOPES` | Comma-separated scopes every token must carry | none |
//! | `ENTRA_APP_CLIENT_SECRET` | Confidential client secret for delegation | none |
//! | `AZURE_OBO_SCOPE` | Default downstream scope | `https://management.azure.com/.default` |
//! | `ENTRA_AUTHORITY_HOST` | Authority host | `https://login.microsoftonline.com` |
//! | `JWKS_TIMEOUT_SECS` | Key discovery timeout | `5` |
//! | `JWKS_MAX_RETRIES` | Extra key discovery attempts | `3` |
//! | `JWKS_REFRESH_INTERVAL_SECS` | Key set refresh interval | `3600` |
//! | `JWKS_FORCED_REFRESH_COOLDOWN_SECS` | Spacing of unknown-`kid` refreshes | `30` |
//! | `APP_LOG_LEVEL` | Default log level | `info` |
//! | `AUTH_LOG_LEVEL` | Auth component log level | `APP_LOG_LEVEL` |
//! | `MCP_SERVER_LOG_LEVEL` | Tool dispatch log level | `APP_LOG_LEVEL` |

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TenantId, TokenSecret, parse_scopes},
	delegation::{DEFAULT_AUTHORITY_HOST, DEFAULT_DOWNSTREAM_SCOPE, DelegationSettings},
	error::ConfigError,
	jwks::FetchPolicy,
	obs::{LogLevel, LogLevels},
	verify::VerifierPolicy,
};
#[cfg(feature = "reqwest")]
use crate::{
	delegation::ReqwestExchanger,
	jwks::ReqwestKeySetCache,
	verify::{ReqwestTokenVerifier, TokenVerifier},
};

/// Resolved configuration for verification, key discovery, delegation, and logging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
	/// Directory the API is registered in.
	pub tenant_id: TenantId,
	/// Application (client) id of this API.
	pub client_id: ClientId,
	/// Expected `aud`.
	pub audience: String,
	/// Normalized scopes every token must carry.
	pub required_scopes: Vec<String>,
	/// Confidential client secret used for delegation.
	pub client_secret: Option<TokenSecret>,
	/// Default downstream scope for delegation.
	pub obo_scope: String,
	/// Authority host.
	pub authority_host: Url,
	/// Key discovery tuning.
	pub fetch: FetchPolicy,
	/// Per-component log levels.
	pub log_levels: LogLevels,
}
impl Settings {
	/// Reads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads settings through `lookup`; blank values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| {
			lookup(name).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
		};
		let tenant_id = TenantId::new(
			get("ENTRA_TENANT_ID").ok_or(ConfigError::MissingEnv { name: "ENTRA_TENANT_ID" })?,
		)?;
		let client_id = ClientId::new(
			get("ENTRA_APP_CLIENT_ID").ok_or(ConfigError::MissingEnv { name: "ENTRA_APP_CLIENT_ID" })?,
		)?;
		let audience = get("ENTRA_AUDIENCE").unwrap_or_else(|| client_id.to_string());
		let required_scopes =
			get("ENTRA_REQUIRED_SCOPES").map(|raw| parse_scopes(&raw)).unwrap_or_default();
		let authority_host = match get("ENTRA_AUTHORITY_HOST") {
			Some(raw) => parse_url("ENTRA_AUTHORITY_HOST", &raw)?,
			None => Url::parse(DEFAULT_AUTHORITY_HOST)
				.map_err(|source| ConfigError::InvalidUrl { endpoint: "authority host", source })?,
		};
		let defaults = FetchPolicy::default();
		let fetch = FetchPolicy {
			timeout: seconds_or("JWKS_TIMEOUT_SECS", get("JWKS_TIMEOUT_SECS"), defaults.timeout)?,
			max_retries: match get("JWKS_MAX_RETRIES") {
				Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidEnv {
					name: "JWKS_MAX_RETRIES",
					reason: format!("`{raw}` is not a non-negative integer"),
				})?,
				None => defaults.max_retries,
			},
			refresh_interval: seconds_or(
				"JWKS_REFRESH_INTERVAL_SECS",
				get("JWKS_REFRESH_INTERVAL_SECS"),
				defaults.refresh_interval,
			)?,
			forced_refresh_cooldown: seconds_or(
				"JWKS_FORCED_REFRESH_COOLDOWN_SECS",
				get("JWKS_FORCED_REFRESH_COOLDOWN_SECS"),
				defaults.forced_refresh_cooldown,
			)?,
		};
		let log_levels = LogLevels {
			app: level_or("APP_LOG_LEVEL", get("APP_LOG_LEVEL"))?.unwrap_or_default(),
			auth: level_or("AUTH_LOG_LEVEL", get("AUTH_LOG_LEVEL"))?,
			server: level_or("MCP_SERVER_LOG_LEVEL", get("MCP_SERVER_LOG_LEVEL"))?,
		};

		Ok(Self {
			tenant_id,
			client_id,
			audience,
			required_scopes,
			client_secret: get("ENTRA_APP_CLIENT_SECRET").map(TokenSecret::new),
			obo_scope: get("AZURE_OBO_SCOPE").unwrap_or_else(|| DEFAULT_DOWNSTREAM_SCOPE.into()),
			authority_host,
			fetch,
			log_levels,
		})
	}

	/// Expected `iss`: `{authority}/{tenant}/v2.0`.
	pub fn issuer(&self) -> String {
		format!("{}/v2.0", self.tenant_base())
	}

	/// Key discovery URL: `{authority}/{tenant}/discovery/v2.0/keys`.
	pub fn jwks_url(&self) -> Result<Url, ConfigError> {
		Url::parse(&format!("{}/discovery/v2.0/keys", self.tenant_base()))
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "key discovery", source })
	}

	/// Token endpoint used for delegation.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		crate::delegation::token_endpoint(&self.authority_host, &self.tenant_id)
	}

	/// Verification policy for this tenant and audience.
	pub fn verifier_policy(&self) -> Result<VerifierPolicy, ConfigError> {
		Ok(VerifierPolicy::builder(self.issuer(), self.audience.clone())
			.required_scopes(self.required_scopes.iter().cloned())
			.build()?)
	}

	/// Key discovery tuning.
	pub fn fetch_policy(&self) -> FetchPolicy {
		self.fetch
	}

	/// Delegation settings; an unset secret is reported when an exchange is attempted.
	pub fn delegation_settings(&self) -> DelegationSettings {
		DelegationSettings {
			authority_host: self.authority_host.clone(),
			tenant_id: self.tenant_id.to_string(),
			client_id: self.client_id.to_string(),
			client_secret: self.client_secret.clone().unwrap_or_default(),
			default_scope: self.obo_scope.clone(),
			client_auth: Default::default(),
			timeout: Duration::seconds(10),
		}
	}

	/// Fetches the key set and builds a verifier over reqwest.
	#[cfg(feature = "reqwest")]
	pub async fn connect_verifier(&self) -> Result<ReqwestTokenVerifier> {
		let keys = ReqwestKeySetCache::connect(self.jwks_url()?, self.fetch_policy()).await?;

		Ok(TokenVerifier::new(Arc::new(keys), self.verifier_policy()?))
	}

	/// Builds a delegation exchanger over reqwest.
	#[cfg(feature = "reqwest")]
	pub fn exchanger(&self) -> Result<ReqwestExchanger> {
		ReqwestExchanger::new(self.delegation_settings())
	}

	fn tenant_base(&self) -> String {
		format!("{}/{}", self.authority_host.as_str().trim_end_matches('/'), self.tenant_id)
	}
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|e| ConfigError::InvalidEnv { name, reason: e.to_string() })
}

fn seconds_or(
	name: &'static str,
	raw: Option<String>,
	default: Duration,
) -> Result<Duration, ConfigError> {
	let Some(raw) = raw else {
		return Ok(default);
	};
	let secs = raw.parse::<i64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
		ConfigError::InvalidEnv { name, reason: format!("`{raw}` is not a positive number of seconds") }
	})?;

	Ok(Duration::seconds(secs))
}

fn level_or(name: &'static str, raw: Option<String>) -> Result<Option<LogLevel>, ConfigError> {
	raw.map(|raw| {
		LogLevel::from_str(&raw).map_err(|e| ConfigError::InvalidEnv { name, reason: e.to_string() })
	})
	.transpose()
}
