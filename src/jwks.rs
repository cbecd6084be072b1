//! Signing key discovery with stale-but-valid refreshes.
//!
//! [`KeySetCache`] fetches the tenant's JWKS document once at construction (a failure there is
//! fatal) and afterwards only replaces the active [`SigningKeySet`] when a refresh succeeds.
//! Readers take an `Arc` snapshot under a short read lock, so a verification never observes a
//! half-built set. Writers (interval refreshes and forced refreshes for unknown `kid`s)
//! serialize on an async guard; concurrent callers for the same unknown key wait for the
//! in-flight fetch and re-check instead of issuing their own.

mod key;

pub use key::*;

// crates.io
use oauth2::http::{Method, Request, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, KeyFetchError, TransientError},
	http::{self, Endpoint, IdpHttpClient, TransportErrorMapper},
	obs::{self, OpSpan, Operation, RefreshMetrics},
};
#[cfg(feature = "reqwest")]
use crate::http::{ReqwestHttpClient, ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Key set cache specialized for the crate's default reqwest transport stack.
pub type ReqwestKeySetCache = KeySetCache<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Fetch and refresh tuning for a [`KeySetCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
	/// Per-attempt transport timeout.
	pub timeout: Duration,
	/// Additional attempts after the first failure; attempts are issued back to back.
	pub max_retries: u32,
	/// Age after which [`KeySetCache::refresh_if_stale`] re-fetches.
	pub refresh_interval: Duration,
	/// Minimum spacing between forced refreshes triggered by unknown key identifiers.
	pub forced_refresh_cooldown: Duration,
}
impl FetchPolicy {
	/// Total number of attempts a single fetch may make.
	pub fn attempts(&self) -> u32 {
		self.max_retries.saturating_add(1)
	}
}
impl Default for FetchPolicy {
	fn default() -> Self {
		Self {
			timeout: Duration::seconds(5),
			max_retries: 3,
			refresh_interval: Duration::hours(1),
			forced_refresh_cooldown: Duration::seconds(30),
		}
	}
}

/// Result of a refresh attempt. Failures keep the previous key set active.
#[derive(Debug)]
pub enum RefreshOutcome {
	/// A new key set was swapped in.
	Refreshed {
		/// Number of usable keys in the new set.
		key_count: usize,
	},
	/// The fetch failed and the previous key set remains active.
	KeptStale {
		/// Failure reported by the fetch.
		error: Error,
	},
}
impl RefreshOutcome {
	/// Returns true when a new key set is active.
	pub fn is_refreshed(&self) -> bool {
		matches!(self, Self::Refreshed { .. })
	}
}

/// Cached, refreshable view of the identity provider's signing keys.
pub struct KeySetCache<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	jwks_url: Url,
	policy: FetchPolicy,
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	current: RwLock<Arc<SigningKeySet>>,
	refresh_guard: AsyncMutex<()>,
	last_forced_refresh: Mutex<Option<OffsetDateTime>>,
	metrics: RefreshMetrics,
}
impl<C, M> KeySetCache<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Fetches the initial key set through a caller-provided transport.
	///
	/// The transport is responsible for enforcing `policy.timeout`. Fails when every attempt
	/// fails or the document yields no usable keys.
	pub async fn with_http_client(
		jwks_url: Url,
		policy: FetchPolicy,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let http_client = http_client.into();
		let transport_mapper = mapper.into();
		let metrics = RefreshMetrics::default();

		metrics.record_attempt();

		let initial = OpSpan::start(Operation::KeyRefresh, "initial_fetch")
			.run(fetch_key_set(
				http_client.as_ref(),
				transport_mapper.as_ref(),
				&jwks_url,
				&policy,
			))
			.await;
		let initial = match initial {
			Ok(set) => set,
			Err(err) => {
				metrics.record_failure();
				obs::event!(error, url = %jwks_url, error = %err, "Initial key set fetch failed.");

				return Err(err);
			},
		};

		metrics.record_success();
		obs::event!(
			info,
			url = %jwks_url,
			key_count = initial.len(),
			"Loaded signing key set."
		);

		Ok(Self {
			jwks_url,
			policy,
			http_client,
			transport_mapper,
			current: RwLock::new(Arc::new(initial)),
			refresh_guard: AsyncMutex::new(()),
			last_forced_refresh: Mutex::new(None),
			metrics,
		})
	}

	/// Snapshot of the active key set.
	pub fn current(&self) -> Arc<SigningKeySet> {
		self.current.read().clone()
	}

	/// Looks up a key in the active set without triggering a refresh.
	pub fn key(&self, kid: &str) -> Option<Arc<SigningKey>> {
		self.current.read().get(kid)
	}

	/// Key discovery URL.
	pub fn jwks_url(&self) -> &Url {
		&self.jwks_url
	}

	/// Fetch policy in effect.
	pub fn policy(&self) -> &FetchPolicy {
		&self.policy
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns true once the active set is older than the refresh interval.
	pub fn is_stale(&self, now: OffsetDateTime) -> bool {
		self.current.read().is_stale_at(now)
	}

	/// Fetches a fresh key set with retries without activating it.
	pub async fn fetch(&self) -> Result<SigningKeySet> {
		fetch_key_set(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			&self.jwks_url,
			&self.policy,
		)
		.await
	}

	/// Re-fetches the key set and swaps it in on success.
	///
	/// Failures are logged and reported through [`RefreshOutcome::KeptStale`]; the previous
	/// set stays active.
	pub async fn refresh(&self) -> RefreshOutcome {
		let _writer = self.refresh_guard.lock().await;

		self.refresh_locked("refresh").await
	}

	/// Refreshes only when the active set is older than the refresh interval.
	///
	/// Intended for an external interval scheduler; returns `None` when the set is fresh.
	pub async fn refresh_if_stale(&self, now: OffsetDateTime) -> Option<RefreshOutcome> {
		if !self.is_stale(now) {
			return None;
		}

		let _writer = self.refresh_guard.lock().await;

		// Another writer may have refreshed while this caller waited.
		if !self.is_stale(now) {
			return None;
		}

		Some(self.refresh_locked("refresh_if_stale").await)
	}

	/// Resolves a `kid` missing from the active set by forcing one refresh.
	///
	/// Concurrent callers share a single fetch. Forced refreshes are spaced by
	/// [`FetchPolicy::forced_refresh_cooldown`]; inside the cooldown the active set is
	/// consulted without contacting the provider.
	pub async fn refresh_for_unknown_key(&self, kid: &str) -> Option<Arc<SigningKey>> {
		let _writer = self.refresh_guard.lock().await;

		if let Some(key) = self.key(kid) {
			return Some(key);
		}

		let now = OffsetDateTime::now_utc();

		{
			let mut last = self.last_forced_refresh.lock();

			if last.is_some_and(|at| now - at < self.policy.forced_refresh_cooldown) {
				self.metrics.record_skipped();
				obs::event!(debug, kid, "Forced key refresh suppressed by cooldown.");

				return None;
			}

			*last = Some(now);
		}

		obs::event!(info, kid, "Unknown key identifier; forcing a key set refresh.");

		self.refresh_locked("refresh_for_unknown_key").await;

		self.key(kid)
	}

	async fn refresh_locked(&self, stage: &'static str) -> RefreshOutcome {
		self.metrics.record_attempt();

		match OpSpan::start(Operation::KeyRefresh, stage).run(self.fetch()).await {
			Ok(set) => {
				let key_count = set.len();

				*self.current.write() = Arc::new(set);

				self.metrics.record_success();
				obs::event!(info, url = %self.jwks_url, key_count, "Refreshed signing key set.");

				RefreshOutcome::Refreshed { key_count }
			},
			Err(error) => {
				self.metrics.record_failure();
				obs::event!(
					warn,
					url = %self.jwks_url,
					error = %error,
					"Key set refresh failed; keeping the previous key set."
				);

				RefreshOutcome::KeptStale { error }
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl KeySetCache<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Fetches the initial key set over a reqwest client bounded by `policy.timeout`.
	pub async fn connect(jwks_url: Url, policy: FetchPolicy) -> Result<Self> {
		let http_client = ReqwestHttpClient::with_timeout(policy.timeout)?;

		Self::with_http_client(jwks_url, policy, http_client, ReqwestTransportErrorMapper).await
	}
}
impl<C, M> Debug for KeySetCache<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let current = self.current();

		f.debug_struct("KeySetCache")
			.field("jwks_url", &self.jwks_url.as_str())
			.field("policy", &self.policy)
			.field("key_ids", &current.key_ids())
			.field("fetched_at", &current.fetched_at())
			.finish()
	}
}

/// Fetches and parses a JWKS document, retrying transport and upstream failures.
///
/// Makes up to `policy.attempts()` immediate attempts. Malformed documents are not retried.
pub async fn fetch_key_set<C, M>(
	http_client: &C,
	mapper: &M,
	jwks_url: &Url,
	policy: &FetchPolicy,
) -> Result<SigningKeySet>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let attempts = policy.attempts();
	let mut attempt = 0;

	loop {
		attempt += 1;

		let last = match fetch_once(http_client, mapper, jwks_url, policy).await {
			Ok(set) => return Ok(set),
			Err(err @ (Error::Transport(_) | Error::Transient(_))) => err,
			Err(err) => return Err(err),
		};

		obs::event!(debug, url = %jwks_url, attempt, error = %last, "Key discovery attempt failed.");

		if attempt >= attempts {
			return Err(KeyFetchError::Unavailable {
				url: jwks_url.to_string(),
				attempts: attempt,
				source: Box::new(last),
			}
			.into());
		}
	}
}

async fn fetch_once<C, M>(
	http_client: &C,
	mapper: &M,
	jwks_url: &Url,
	policy: &FetchPolicy,
) -> Result<SigningKeySet>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let request = Request::builder()
		.method(Method::GET)
		.uri(jwks_url.as_str())
		.header(ACCEPT, "application/json")
		.body(Vec::new())
		.map_err(ConfigError::from)?;
	let (response, meta) = http::send(http_client, mapper, Endpoint::KeyDiscovery, request).await?;

	if !response.status().is_success() {
		return Err(TransientError::Upstream {
			endpoint: Endpoint::KeyDiscovery,
			message: format!("HTTP {}", response.status().as_u16()),
			status: meta.status,
			retry_after: meta.retry_after,
		}
		.into());
	}

	Ok(SigningKeySet::from_document(
		response.body(),
		jwks_url.clone(),
		OffsetDateTime::now_utc(),
		policy.refresh_interval,
	)?)
}
