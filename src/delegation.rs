//! On-behalf-of delegation: trading a verified user token for a downstream-scoped token.
//!
//! [`DelegatedCredentialExchanger`] posts a `jwt-bearer` grant with
//! `requested_token_use=on_behalf_of` to the tenant's token endpoint, authenticating as a
//! confidential client. Every call is a single, uncached request. Missing settings are
//! reported before anything is sent.

pub mod classify;
pub mod token;

mod response;

pub use classify::RejectionKind;
pub use response::DEFAULT_EXPIRES_IN;
pub use token::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	HttpRequest,
	http::{
		Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
	},
};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::{TenantId, TokenSecret, VerifiedIdentity},
	error::ConfigError,
	http::{self, Endpoint, IdpHttpClient, TransportErrorMapper},
	obs::{self, OpSpan, Operation},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

/// Grant type for assertion-based exchanges (RFC 7523).
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Public cloud authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
/// Scope requested by [`DelegatedCredentialExchanger::exchange_default`] unless configured.
pub const DEFAULT_DOWNSTREAM_SCOPE: &str = "https://management.azure.com/.default";

#[cfg(feature = "reqwest")]
/// Exchanger specialized for the crate's default reqwest transport stack.
pub type ReqwestExchanger = DelegatedCredentialExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Boxed future returned by [`Delegator::delegate`].
pub type DelegationFuture<'a> = Pin<Box<dyn Future<Output = Result<DelegatedToken>> + 'a + Send>>;

/// How the confidential client authenticates at the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
}

/// Confidential client settings for on-behalf-of exchanges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegationSettings {
	/// Authority host, e.g. `https://login.microsoftonline.com`.
	pub authority_host: Url,
	/// Directory the client is registered in.
	pub tenant_id: String,
	/// Confidential client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Scope used by [`DelegatedCredentialExchanger::exchange_default`].
	pub default_scope: String,
	/// Client authentication method.
	pub client_auth: ClientAuthMethod,
	/// Per-request transport timeout for the reqwest constructor.
	pub timeout: Duration,
}
impl DelegationSettings {
	/// Creates settings for the public cloud with the default downstream scope.
	pub fn new(
		tenant_id: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let authority_host = Url::parse(DEFAULT_AUTHORITY_HOST)
			.map_err(|source| ConfigError::InvalidUrl { endpoint: "authority host", source })?;

		Ok(Self {
			authority_host,
			tenant_id: tenant_id.into(),
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			default_scope: DEFAULT_DOWNSTREAM_SCOPE.into(),
			client_auth: ClientAuthMethod::default(),
			timeout: Duration::seconds(10),
		})
	}

	/// Overrides the authority host (sovereign clouds, test servers).
	pub fn with_authority_host(mut self, host: Url) -> Self {
		self.authority_host = host;

		self
	}

	/// Overrides the default downstream scope.
	pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
		self.default_scope = scope.into();

		self
	}

	/// Overrides the client authentication method.
	pub fn with_client_auth(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth = method;

		self
	}

	/// Overrides the transport timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// `{authority}/{tenant}/oauth2/v2.0/token`.
	pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
		token_endpoint(&self.authority_host, &self.tenant_id)
	}

	/// Builds the per-call request for `user_token` and `target_scope`.
	pub fn request(&self, user_token: &str, target_scope: &str) -> DelegationRequest {
		DelegationRequest {
			tenant_id: self.tenant_id.clone(),
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			target_scope: target_scope.to_owned(),
			user_token: TokenSecret::new(user_token),
		}
	}
}

/// Inputs of a single on-behalf-of exchange. Built per call and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DelegationRequest {
	/// Directory the client is registered in.
	pub tenant_id: String,
	/// Confidential client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Downstream scope, e.g. `https://graph.microsoft.com/.default`.
	pub target_scope: String,
	/// Inbound user token presented as the assertion.
	pub user_token: TokenSecret,
}
impl DelegationRequest {
	/// Fails with [`ConfigError::MissingDelegationSettings`] naming every empty field.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let fields = [
			("tenant_id", self.tenant_id.trim().is_empty()),
			("client_id", self.client_id.trim().is_empty()),
			("client_secret", self.client_secret.is_blank()),
			("target_scope", self.target_scope.trim().is_empty()),
			("user_token", self.user_token.is_blank()),
		]
		.into_iter()
		.filter_map(|(name, missing)| missing.then_some(name))
		.collect::<Vec<_>>();

		if fields.is_empty() { Ok(()) } else { Err(ConfigError::MissingDelegationSettings { fields }) }
	}

	/// Renders the `application/x-www-form-urlencoded` body.
	///
	/// `client_secret` is left out when the client authenticates with HTTP Basic.
	pub fn form_body(&self, client_auth: ClientAuthMethod) -> String {
		let mut form = form_urlencoded::Serializer::new(String::new());

		form.append_pair("grant_type", JWT_BEARER_GRANT)
			.append_pair("client_id", self.client_id.trim());

		if matches!(client_auth, ClientAuthMethod::ClientSecretPost) {
			form.append_pair("client_secret", self.client_secret.expose());
		}

		form.append_pair("assertion", self.user_token.expose_trimmed())
			.append_pair("scope", self.target_scope.trim())
			.append_pair("requested_token_use", "on_behalf_of");

		form.finish()
	}

	/// Validates the request and builds the HTTP request for the tenant's token endpoint.
	pub fn to_http_request(
		&self,
		authority_host: &Url,
		client_auth: ClientAuthMethod,
	) -> Result<HttpRequest, ConfigError> {
		self.validate()?;

		let endpoint = token_endpoint(authority_host, &self.tenant_id)?;
		let mut builder = Request::builder()
			.method(Method::POST)
			.uri(endpoint.as_str())
			.header(ACCEPT, "application/json")
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded");

		if matches!(client_auth, ClientAuthMethod::ClientSecretBasic) {
			builder = builder.header(AUTHORIZATION, self.basic_authorization());
		}

		Ok(builder.body(self.form_body(client_auth).into_bytes())?)
	}

	fn basic_authorization(&self) -> String {
		let id = form_urlencoded::byte_serialize(self.client_id.trim().as_bytes()).collect::<String>();
		let secret =
			form_urlencoded::byte_serialize(self.client_secret.expose().as_bytes()).collect::<String>();

		format!("Basic {}", STANDARD.encode(format!("{id}:{secret}")))
	}
}

/// Object-safe delegation seam consumed by tool dispatch.
pub trait Delegator: Send + Sync {
	/// Exchanges the identity's bearer token for `target_scope`, or the configured default
	/// scope when `None`.
	fn delegate<'a>(
		&'a self,
		identity: &'a VerifiedIdentity,
		target_scope: Option<&'a str>,
	) -> DelegationFuture<'a>;
}

/// Performs on-behalf-of exchanges against a single tenant.
pub struct DelegatedCredentialExchanger<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	settings: DelegationSettings,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
}
impl<C, M> DelegatedCredentialExchanger<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an exchanger that reuses the caller-provided transport and mapper.
	pub fn with_http_client(
		settings: DelegationSettings,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self { settings, http_client: http_client.into(), transport_mapper: mapper.into() }
	}

	/// Settings in effect.
	pub fn settings(&self) -> &DelegationSettings {
		&self.settings
	}

	/// Exchanges `user_token` for an access token scoped to `target_scope`.
	///
	/// Fails with [`ConfigError::MissingDelegationSettings`] before any network call when a
	/// setting or argument is empty, and with [`DelegationError`](crate::error::DelegationError)
	/// when the provider rejects the exchange.
	pub async fn exchange(&self, user_token: &str, target_scope: &str) -> Result<DelegatedToken> {
		let result = OpSpan::start(Operation::Delegation, "exchange")
			.run(self.exchange_inner(user_token, target_scope))
			.await;

		match &result {
			Ok(token) => {
				obs::event!(
					debug,
					scope = target_scope,
					expires_at = %token.expires_at,
					"Acquired on-behalf-of token."
				);
			},
			Err(err) => {
				obs::event!(warn, scope = target_scope, error = %err, "On-behalf-of exchange failed.");
			},
		}

		result
	}

	/// Exchanges the bearer token an identity was verified from.
	pub async fn exchange_for(
		&self,
		identity: &VerifiedIdentity,
		target_scope: &str,
	) -> Result<DelegatedToken> {
		self.exchange(identity.assertion().expose(), target_scope).await
	}

	/// Exchanges the identity's token for the configured default scope.
	pub async fn exchange_default(&self, identity: &VerifiedIdentity) -> Result<DelegatedToken> {
		self.exchange_for(identity, &self.settings.default_scope).await
	}

	async fn exchange_inner(&self, user_token: &str, target_scope: &str) -> Result<DelegatedToken> {
		let request = self.settings.request(user_token, target_scope);
		let http_request =
			request.to_http_request(&self.settings.authority_host, self.settings.client_auth)?;

		obs::event!(
			debug,
			tenant_id = request.tenant_id.as_str(),
			client_id = request.client_id.as_str(),
			scope = request.target_scope.as_str(),
			"Starting on-behalf-of exchange."
		);

		let (response, meta) = http::send(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			Endpoint::Token,
			http_request,
		)
		.await?;

		response::parse_token_response(
			response.status().as_u16(),
			&meta,
			response.body(),
			request.target_scope.trim(),
			OffsetDateTime::now_utc(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl DelegatedCredentialExchanger<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an exchanger over a reqwest client bounded by `settings.timeout`.
	pub fn new(settings: DelegationSettings) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(settings.timeout)?;

		Ok(Self::with_http_client(settings, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Delegator for DelegatedCredentialExchanger<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn delegate<'a>(
		&'a self,
		identity: &'a VerifiedIdentity,
		target_scope: Option<&'a str>,
	) -> DelegationFuture<'a> {
		Box::pin(async move {
			let scope = target_scope.unwrap_or(&self.settings.default_scope);

			self.exchange_for(identity, scope).await
		})
	}
}
impl<C, M> Debug for DelegatedCredentialExchanger<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DelegatedCredentialExchanger")
			.field("authority_host", &self.settings.authority_host.as_str())
			.field("tenant_id", &self.settings.tenant_id)
			.field("client_id", &self.settings.client_id)
			.field("client_auth", &self.settings.client_auth)
			.finish()
	}
}

/// `{authority}/{tenant}/oauth2/v2.0/token`.
pub fn token_endpoint(authority_host: &Url, tenant_id: &str) -> Result<Url, ConfigError> {
	let tenant = TenantId::new(tenant_id.trim())?;
	let raw = format!(
		"{}/{}/oauth2/v2.0/token",
		authority_host.as_str().trim_end_matches('/'),
		tenant.as_ref()
	);

	Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { endpoint: "token endpoint", source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn settings() -> DelegationSettings {
		DelegationSettings::new("contoso", "api-client", "s3cr:et")
			.expect("Fixture settings should build.")
	}

	#[test]
	fn token_endpoint_follows_authority_layout() {
		let endpoint = settings().token_endpoint().expect("Token endpoint should build.");

		assert_eq!(endpoint.as_str(), "https://login.microsoftonline.com/contoso/oauth2/v2.0/token");

		let custom = settings()
			.with_authority_host(Url::parse("http://127.0.0.1:8080/").expect("Host should parse."));

		assert_eq!(
			custom.token_endpoint().expect("Token endpoint should build.").as_str(),
			"http://127.0.0.1:8080/contoso/oauth2/v2.0/token"
		);
		assert!(token_endpoint(&custom.authority_host, "con/toso").is_err());
	}

	#[test]
	fn validation_names_every_missing_field() {
		let mut request = settings().request("", " ");

		request.client_secret = TokenSecret::new("");

		let err = request.validate().expect_err("Empty fields must be rejected.");

		assert!(matches!(
			err,
			ConfigError::MissingDelegationSettings { ref fields }
				if fields == &["client_secret", "target_scope", "user_token"]
		));
	}

	#[test]
	fn form_body_carries_on_behalf_of_parameters() {
		let request = settings().request("user.jwt.sig", "https://graph.microsoft.com/.default");
		let pairs = form_urlencoded::parse(
			request.form_body(ClientAuthMethod::ClientSecretPost).as_bytes(),
		)
		.into_owned()
		.collect::<BTreeMap<_, _>>();

		assert_eq!(pairs["grant_type"], JWT_BEARER_GRANT);
		assert_eq!(pairs["client_secret"], "s3cr:et");
		assert_eq!(pairs["assertion"], "user.jwt.sig");
		assert_eq!(pairs["scope"], "https://graph.microsoft.com/.default");
		assert_eq!(pairs["requested_token_use"], "on_behalf_of");

		let basic = request.form_body(ClientAuthMethod::ClientSecretBasic);

		assert!(!basic.contains("client_secret"));
	}

	#[test]
	fn basic_auth_encodes_urlencoded_credentials() {
		let request = settings().request("user.jwt.sig", "scope");
		let http_request = request
			.to_http_request(&settings().authority_host, ClientAuthMethod::ClientSecretBasic)
			.expect("Request should build.");
		let header = http_request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.expect("Basic header should be present.");

		assert_eq!(header, format!("Basic {}", STANDARD.encode("api-client:s3cr%3Aet")));
		assert_eq!(*http_request.method(), Method::POST);
	}
}
