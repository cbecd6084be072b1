//! JWKS documents and the immutable signing key set built from them.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey};
// self
use crate::{_prelude::*, auth::KeyId, error::KeyFetchError};

/// Key families the verifier can check signatures with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyFamily {
	/// `kty: RSA` (RS256/384/512, PS256/384/512).
	Rsa,
	/// `kty: EC` on P-256 or P-384 (ES256/384).
	Ec,
}
impl KeyFamily {
	/// Returns true when `alg` produces signatures this key family verifies.
	pub fn supports(self, alg: Algorithm) -> bool {
		match self {
			KeyFamily::Rsa => matches!(
				alg,
				Algorithm::RS256
					| Algorithm::RS384
					| Algorithm::RS512
					| Algorithm::PS256
					| Algorithm::PS384
					| Algorithm::PS512
			),
			KeyFamily::Ec => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
		}
	}
}

/// One public verification key.
#[derive(Clone)]
pub struct SigningKey {
	/// Key identifier (`kid`).
	pub kid: KeyId,
	/// Key family derived from `kty`.
	pub family: KeyFamily,
	/// Algorithm the key is pinned to (`alg`), when the document advertises one.
	pub algorithm: Option<Algorithm>,
	decoding_key: DecodingKey,
}
impl SigningKey {
	/// Returns true when a token signed with `alg` may be checked against this key.
	pub fn accepts(&self, alg: Algorithm) -> bool {
		self.family.supports(alg) && self.algorithm.is_none_or(|pinned| pinned == alg)
	}

	pub(crate) fn decoding_key(&self) -> &DecodingKey {
		&self.decoding_key
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningKey")
			.field("kid", &self.kid)
			.field("family", &self.family)
			.field("algorithm", &self.algorithm)
			.finish_non_exhaustive()
	}
}

/// Immutable snapshot of the identity provider's signing keys.
///
/// A set is never empty: [`SigningKeySet::from_document`] fails instead of producing one
/// without usable keys. Refreshes build a new set and swap it in whole.
#[derive(Clone, Debug)]
pub struct SigningKeySet {
	keys: HashMap<KeyId, Arc<SigningKey>>,
	fetched_at: OffsetDateTime,
	source: Url,
	refresh_interval: Duration,
}
impl SigningKeySet {
	/// Parses a JWKS document body.
	///
	/// Encryption keys (`use: enc`), unsupported key types or curves, and keys without a valid
	/// `kid` are skipped.
	pub fn from_document(
		body: &[u8],
		source: Url,
		fetched_at: OffsetDateTime,
		refresh_interval: Duration,
	) -> Result<Self, KeyFetchError> {
		let mut deserializer = serde_json::Deserializer::from_slice(body);
		let document: JwkSet = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source_err| KeyFetchError::Malformed {
				url: source.to_string(),
				source: source_err,
			})?;
		let mut keys = HashMap::with_capacity(document.keys.len());

		for jwk in document.keys {
			match jwk.into_signing_key() {
				Ok(key) => {
					keys.insert(key.kid.clone(), Arc::new(key));
				},
				Err(reason) => {
					crate::obs::event!(debug, url = %source, reason, "Skipping unusable JWK.");
				},
			}
		}

		if keys.is_empty() {
			return Err(KeyFetchError::NoUsableKeys { url: source.to_string() });
		}

		Ok(Self { keys, fetched_at, source, refresh_interval })
	}

	/// Looks up a key by `kid`.
	pub fn get(&self, kid: &str) -> Option<Arc<SigningKey>> {
		self.keys.get(kid).cloned()
	}

	/// Returns true when a key with `kid` is present.
	pub fn contains(&self, kid: &str) -> bool {
		self.keys.contains_key(kid)
	}

	/// Number of usable keys.
	pub fn len(&self) -> usize {
		self.keys.len()
	}

	/// Always false for a constructed set; provided for API symmetry.
	pub fn is_empty(&self) -> bool {
		self.keys.is_empty()
	}

	/// Key identifiers in the set, sorted.
	pub fn key_ids(&self) -> Vec<&str> {
		let mut ids = self.keys.keys().map(|kid| kid.as_ref()).collect::<Vec<_>>();

		ids.sort_unstable();

		ids
	}

	/// Instant the set was fetched.
	pub fn fetched_at(&self) -> OffsetDateTime {
		self.fetched_at
	}

	/// URL the set was fetched from.
	pub fn source(&self) -> &Url {
		&self.source
	}

	/// Interval after which the set is considered stale.
	pub fn refresh_interval(&self) -> Duration {
		self.refresh_interval
	}

	/// Returns true once `refresh_interval` has elapsed since the fetch.
	pub fn is_stale_at(&self, now: OffsetDateTime) -> bool {
		now - self.fetched_at >= self.refresh_interval
	}
}

#[derive(Debug, Deserialize)]
struct JwkSet {
	keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
	kty: String,
	#[serde(default)]
	kid: Option<String>,
	#[serde(default, rename = "use")]
	key_use: Option<String>,
	#[serde(default)]
	alg: Option<String>,
	#[serde(default)]
	n: Option<String>,
	#[serde(default)]
	e: Option<String>,
	#[serde(default)]
	crv: Option<String>,
	#[serde(default)]
	x: Option<String>,
	#[serde(default)]
	y: Option<String>,
}
impl Jwk {
	fn into_signing_key(self) -> Result<SigningKey, &'static str> {
		if self.key_use.as_deref().is_some_and(|key_use| key_use != "sig") {
			return Err("key is not a signing key");
		}

		let kid = self.kid.as_deref().ok_or("key has no kid")?;
		let kid = KeyId::new(kid).map_err(|_| "key has an invalid kid")?;
		let algorithm = match self.alg.as_deref() {
			Some(alg) => Some(Algorithm::from_str(alg).map_err(|_| "key advertises an unknown alg")?),
			None => None,
		};
		let (family, decoding_key) = match self.kty.as_str() {
			"RSA" => {
				let n = self.n.as_deref().ok_or("RSA key is missing n")?;
				let e = self.e.as_deref().ok_or("RSA key is missing e")?;
				let key = DecodingKey::from_rsa_components(n, e)
					.map_err(|_| "RSA components are invalid")?;

				(KeyFamily::Rsa, key)
			},
			"EC" => {
				if !matches!(self.crv.as_deref(), Some("P-256" | "P-384")) {
					return Err("EC curve is unsupported");
				}

				let x = self.x.as_deref().ok_or("EC key is missing x")?;
				let y = self.y.as_deref().ok_or("EC key is missing y")?;
				let key = DecodingKey::from_ec_components(x, y)
					.map_err(|_| "EC components are invalid")?;

				(KeyFamily::Ec, key)
			},
			_ => return Err("key type is unsupported"),
		};

		if algorithm.is_some_and(|alg| !family.supports(alg)) {
			return Err("key alg does not match its kty");
		}

		Ok(SigningKey { kid, family, algorithm, decoding_key })
	}
}
