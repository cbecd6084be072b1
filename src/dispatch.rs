//! Thin tool dispatch on top of verification and delegation.
//!
//! A [`Gateway`] turns an `Authorization` header plus a tool name into a call on a registered
//! [`Tool`]. Tools are registered explicitly in a [`ToolRegistry`]; each may demand an app role,
//! which is checked against the verified `roles` claim before the tool runs.

pub mod tools;

pub use tools::*;

// self
use crate::{
	_prelude::*,
	auth::VerifiedIdentity,
	delegation::{DelegatedToken, Delegator},
	error::ConfigError,
	http::{IdpHttpClient, TransportErrorMapper},
	obs::{self, OpSpan, Operation},
	verify::TokenVerifier,
};

/// Boxed future returned by [`Tool::call`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<JsonValue, ToolError>> + 'a + Send>>;

/// Failures raised by tools.
#[derive(Debug, ThisError)]
pub enum ToolError {
	/// Arguments do not match what the tool expects.
	#[error("Tool arguments are invalid: {reason}.")]
	InvalidArguments {
		/// Explanation for the caller.
		reason: String,
	},
	/// The tool needs delegation but the gateway has no exchanger.
	#[error("Delegation is not configured for this server.")]
	DelegationUnavailable,
	/// Downstream failure while running the tool.
	#[error(transparent)]
	Failed(#[from] Error),
}

/// Per-call context handed to tools.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
	/// Verified caller.
	pub identity: &'a VerifiedIdentity,
	/// Delegation seam, when the gateway was built with one.
	pub delegator: Option<&'a dyn Delegator>,
}
impl ToolContext<'_> {
	/// Exchanges the caller's token for `target_scope` (or the configured default scope).
	pub async fn delegate(&self, target_scope: Option<&str>) -> Result<DelegatedToken, ToolError> {
		let delegator = self.delegator.ok_or(ToolError::DelegationUnavailable)?;

		Ok(delegator.delegate(self.identity, target_scope).await?)
	}
}
impl Debug for ToolContext<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ToolContext")
			.field("subject", &self.identity.subject())
			.field("delegation", &self.delegator.is_some())
			.finish()
	}
}

/// A named operation callable through a [`Gateway`].
pub trait Tool: Send + Sync {
	/// Unique tool name.
	fn name(&self) -> &str;

	/// Human-readable summary.
	fn description(&self) -> &str;

	/// App role the caller must hold, compared case-sensitively.
	fn required_role(&self) -> Option<&str> {
		None
	}

	/// Runs the tool for a verified caller.
	fn call<'a>(&'a self, ctx: ToolContext<'a>, args: JsonValue) -> ToolFuture<'a>;
}

/// Public listing entry for a registered tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolDescriptor {
	/// Tool name.
	pub name: String,
	/// Human-readable summary.
	pub description: String,
	/// Role required to call the tool.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub required_role: Option<String>,
}

/// Explicit registration table of tools, keyed by name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
	tools: BTreeMap<String, Arc<dyn Tool>>,
}
impl ToolRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a registry holding the built-in claim tools.
	pub fn with_builtin_tools() -> Self {
		let mut registry = Self::new();

		for tool in builtin_tools() {
			registry.tools.insert(tool.name().to_owned(), tool);
		}

		registry
	}

	/// Registers `tool`; names must be unique.
	pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ConfigError> {
		let name = tool.name().to_owned();

		if self.tools.contains_key(&name) {
			return Err(ConfigError::DuplicateTool { name });
		}

		self.tools.insert(name, tool);

		Ok(())
	}

	/// Looks up a tool by name.
	pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
		self.tools.get(name)
	}

	/// Number of registered tools.
	pub fn len(&self) -> usize {
		self.tools.len()
	}

	/// Returns true when no tool is registered.
	pub fn is_empty(&self) -> bool {
		self.tools.is_empty()
	}

	/// Listing of every registered tool, sorted by name.
	pub fn descriptors(&self) -> Vec<ToolDescriptor> {
		self.tools
			.values()
			.map(|tool| ToolDescriptor {
				name: tool.name().to_owned(),
				description: tool.description().to_owned(),
				required_role: tool.required_role().map(str::to_owned),
			})
			.collect()
	}
}
impl Debug for ToolRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_list().entries(self.tools.keys()).finish()
	}
}

/// Request rejection rendered as an HTTP status plus an OAuth-style error body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
#[error("{error} ({status}): {description}")]
pub struct Rejection {
	/// HTTP status code.
	pub status: u16,
	/// Machine-readable error code.
	pub error: String,
	/// Human-readable explanation.
	pub description: String,
}
impl Rejection {
	fn new(status: u16, error: &str, description: impl Into<String>) -> Self {
		Self { status, error: error.to_owned(), description: description.into() }
	}

	/// Maps a crate error onto the rejection a server should answer with.
	pub fn from_error(err: &Error) -> Self {
		let code = match err {
			Error::Verification(e) => e.oauth_error_code(),
			Error::KeyFetch(_) => "temporarily_unavailable",
			Error::Delegation(_) => "delegation_failed",
			Error::Transient(_) | Error::Transport(_) => "upstream_unavailable",
			Error::Config(_) => "server_error",
		};

		Self::new(err.status_code(), code, err.to_string())
	}

	/// Maps a tool failure onto a rejection.
	pub fn from_tool_error(err: &ToolError) -> Self {
		match err {
			ToolError::InvalidArguments { .. } => Self::new(400, "invalid_arguments", err.to_string()),
			ToolError::DelegationUnavailable => Self::new(500, "server_error", err.to_string()),
			ToolError::Failed(inner) => Self::from_error(inner),
		}
	}

	/// RFC 6750 `WWW-Authenticate` challenge for `401` and `403` rejections.
	pub fn www_authenticate(&self) -> Option<String> {
		match self.status {
			401 if self.error == "invalid_request" => Some("Bearer".into()),
			401 | 403 => Some(format!(
				"Bearer error=\"{}\", error_description=\"{}\"",
				self.error,
				self.description.replace(['"', '\\'], "'")
			)),
			_ => None,
		}
	}
}

/// Authenticates requests and routes them to registered tools.
pub struct Gateway<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	verifier: Arc<TokenVerifier<C, M>>,
	registry: ToolRegistry,
	delegator: Option<Arc<dyn Delegator>>,
}
impl<C, M> Gateway<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a gateway without delegation.
	pub fn new(verifier: Arc<TokenVerifier<C, M>>, registry: ToolRegistry) -> Self {
		Self { verifier, registry, delegator: None }
	}

	/// Enables delegation for tools.
	pub fn with_delegator(mut self, delegator: Arc<dyn Delegator>) -> Self {
		self.delegator = Some(delegator);

		self
	}

	/// Registered tools.
	pub fn registry(&self) -> &ToolRegistry {
		&self.registry
	}

	/// Verifier backing the gateway.
	pub fn verifier(&self) -> &Arc<TokenVerifier<C, M>> {
		&self.verifier
	}

	/// Verifies the bearer token in `authorization` and calls `tool` with `args`.
	///
	/// Authentication happens before the tool lookup, so unauthenticated callers cannot discover
	/// which tools exist.
	pub async fn dispatch(
		&self,
		authorization: Option<&str>,
		tool: &str,
		args: JsonValue,
	) -> Result<JsonValue, Rejection> {
		let result = OpSpan::start(Operation::Dispatch, "dispatch")
			.run(self.dispatch_inner(authorization, tool, args))
			.await;

		if let Err(rejection) = &result {
			obs::event!(
				info,
				tool,
				status = rejection.status,
				error = rejection.error.as_str(),
				"Rejected tool call."
			);
		}

		result
	}

	async fn dispatch_inner(
		&self,
		authorization: Option<&str>,
		name: &str,
		args: JsonValue,
	) -> Result<JsonValue, Rejection> {
		let token = authorization.and_then(bearer_token).ok_or_else(|| {
			Rejection::new(401, "invalid_request", "A bearer token is required.")
		})?;
		let identity = self.verifier.verify(token).await.map_err(|e| Rejection::from_error(&e))?;
		let tool = self
			.registry
			.get(name)
			.ok_or_else(|| Rejection::new(404, "unknown_tool", format!("Tool `{name}` is not registered.")))?;

		if let Some(role) = tool.required_role().filter(|role| !identity.has_role(role)) {
			obs::event!(
				warn,
				tool = name,
				subject = identity.subject(),
				required_role = role,
				"Caller lacks the role required by the tool."
			);

			return Err(Rejection::new(
				403,
				"insufficient_role",
				format!("Tool `{name}` requires the `{role}` role."),
			));
		}

		obs::event!(debug, tool = name, subject = identity.subject(), "Invoking tool.");

		let ctx = ToolContext { identity: &identity, delegator: self.delegator.as_deref() };

		tool.call(ctx, args).await.map_err(|e| Rejection::from_tool_error(&e))
	}
}
impl<C, M> Debug for Gateway<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gateway")
			.field("registry", &self.registry)
			.field("delegation", &self.delegator.is_some())
			.finish()
	}
}

/// Extracts the credential from a `Bearer` authorization header.
///
/// The scheme is case-insensitive and may be separated from the credential by any run of
/// spaces or tabs. A credential with embedded whitespace is not a bearer token.
pub fn bearer_token(header: &str) -> Option<&str> {
	let (scheme, token) = header.trim().split_once(char::is_whitespace)?;
	let token = token.trim_start();

	(scheme.eq_ignore_ascii_case("bearer")
		&& !token.is_empty()
		&& !token.contains(char::is_whitespace))
	.then_some(token)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::VerifyError;

	struct Echo;
	impl Tool for Echo {
		fn name(&self) -> &str {
			"echo"
		}

		fn description(&self) -> &str {
			"Echoes its arguments."
		}

		fn call<'a>(&'a self, _ctx: ToolContext<'a>, args: JsonValue) -> ToolFuture<'a> {
			Box::pin(async move { Ok(args) })
		}
	}

	#[test]
	fn bearer_scheme_is_case_insensitive() {
		assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
		assert_eq!(bearer_token("bearer   abc"), Some("abc"));
		assert_eq!(bearer_token("Basic abc"), None);
		assert_eq!(bearer_token("Bearer "), None);
		assert_eq!(bearer_token("Bearer"), None);
	}

	#[test]
	fn bearer_separator_tolerates_tabs_and_runs_of_spaces() {
		assert_eq!(bearer_token("Bearer\tabc.def.ghi"), Some("abc.def.ghi"));
		assert_eq!(bearer_token("Bearer \t  abc.def.ghi\t"), Some("abc.def.ghi"));
		assert_eq!(bearer_token("  BEARER    abc  "), Some("abc"));
		assert_eq!(bearer_token("Bearer\t"), None);
		assert_eq!(bearer_token("Bearer abc def"), None);
		assert_eq!(bearer_token("Bearerabc"), None);
	}

	#[test]
	fn registry_rejects_duplicate_names() {
		let mut registry = ToolRegistry::with_builtin_tools();
		let before = registry.len();

		registry.register(Arc::new(Echo)).expect("First registration should succeed.");

		let err = registry.register(Arc::new(Echo)).expect_err("Duplicate must be rejected.");

		assert!(matches!(err, ConfigError::DuplicateTool { ref name } if name == "echo"));
		assert_eq!(registry.len(), before + 1);
		assert!(registry.descriptors().windows(2).all(|pair| pair[0].name < pair[1].name));
	}

	#[test]
	fn rejections_map_error_statuses_and_challenges() {
		let scope = Rejection::from_error(&Error::from(VerifyError::InsufficientScope {
			missing: vec!["files.read".into()],
		}));

		assert_eq!(scope.status, 403);
		assert_eq!(
			scope.www_authenticate().as_deref(),
			Some(
				"Bearer error=\"insufficient_scope\", error_description=\"Token lacks the required scopes: files.read.\""
			)
		);

		let expired = Rejection::from_error(&Error::from(VerifyError::Expired));

		assert_eq!((expired.status, expired.error.as_str()), (401, "invalid_token"));

		let missing = Rejection::new(401, "invalid_request", "A bearer token is required.");

		assert_eq!(missing.www_authenticate().as_deref(), Some("Bearer"));

		let args = Rejection::from_tool_error(&ToolError::InvalidArguments { reason: "x".into() });

		assert_eq!(args.status, 400);
		assert_eq!(args.www_authenticate(), None);
	}
}
