//! Verification policy and its validating builder.

// crates.io
use jsonwebtoken::{Algorithm, Validation};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, ScopeValidationError},
};

/// Largest clock skew a policy tolerates on `exp` and `nbf`.
pub const MAX_LEEWAY: Duration = Duration::minutes(10);

/// Errors raised while constructing a [`VerifierPolicy`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum VerifierPolicyError {
	/// Issuer is required for exact `iss` matching.
	#[error("Verifier policy requires an issuer.")]
	MissingIssuer,
	/// Audience is required for exact `aud` matching.
	#[error("Verifier policy requires an audience.")]
	MissingAudience,
	/// At least one algorithm must be accepted.
	#[error("Verifier policy must accept at least one algorithm.")]
	NoAlgorithms,
	/// Symmetric algorithms would let anyone holding a public key mint tokens.
	#[error("Algorithm {algorithm:?} is symmetric and cannot verify identity provider tokens.")]
	SymmetricAlgorithm {
		/// Rejected algorithm.
		algorithm: Algorithm,
	},
	/// Leeway cannot be negative.
	#[error("Clock leeway cannot be negative.")]
	NegativeLeeway,
	/// Leeway is capped at [`MAX_LEEWAY`].
	#[error("Clock leeway of {leeway} exceeds the {max} maximum.")]
	ExcessiveLeeway {
		/// Requested leeway.
		leeway: Duration,
		/// Largest accepted leeway.
		max: Duration,
	},
	/// Required scopes cannot be normalized.
	#[error("Required scopes are invalid.")]
	InvalidScope(#[from] ScopeValidationError),
}

/// What a token must satisfy to be accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierPolicy {
	issuer: String,
	audience: String,
	required_scopes: ScopeSet,
	algorithms: Vec<Algorithm>,
	leeway: Duration,
}
impl VerifierPolicy {
	/// Returns a builder for the given exact issuer and audience.
	pub fn builder(issuer: impl Into<String>, audience: impl Into<String>) -> VerifierPolicyBuilder {
		VerifierPolicyBuilder::new(issuer, audience)
	}

	/// Expected `iss`.
	pub fn issuer(&self) -> &str {
		&self.issuer
	}

	/// Expected `aud`.
	pub fn audience(&self) -> &str {
		&self.audience
	}

	/// Scopes every token must carry in `scp`.
	pub fn required_scopes(&self) -> &ScopeSet {
		&self.required_scopes
	}

	/// Accepted signature algorithms.
	pub fn algorithms(&self) -> &[Algorithm] {
		&self.algorithms
	}

	/// Clock skew tolerated on `exp` and `nbf`.
	pub fn leeway(&self) -> Duration {
		self.leeway
	}

	/// Returns true when `alg` is accepted.
	pub fn accepts(&self, alg: Algorithm) -> bool {
		self.algorithms.contains(&alg)
	}

	/// Builds the `jsonwebtoken` validation for a token signed with `alg`.
	pub(crate) fn validation(&self, alg: Algorithm) -> Validation {
		let mut validation = Validation::new(alg);

		validation.set_issuer(&[self.issuer.as_str()]);
		validation.set_audience(&[self.audience.as_str()]);
		validation.set_required_spec_claims(&["exp", "iss", "aud"]);
		validation.leeway = self.leeway.whole_seconds().unsigned_abs();
		validation.validate_exp = true;
		validation.validate_nbf = true;

		validation
	}
}

/// Builder for [`VerifierPolicy`] values.
#[derive(Clone, Debug)]
pub struct VerifierPolicyBuilder {
	/// Expected `iss`.
	pub issuer: String,
	/// Expected `aud`.
	pub audience: String,
	/// Scopes every token must carry.
	pub required_scopes: Vec<String>,
	/// Accepted signature algorithms; defaults to `RS256`.
	pub algorithms: Vec<Algorithm>,
	/// Clock skew tolerance; defaults to zero and is capped at [`MAX_LEEWAY`].
	pub leeway: Duration,
}
impl VerifierPolicyBuilder {
	/// Creates a builder seeded with the issuer and audience.
	pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
		Self {
			issuer: issuer.into(),
			audience: audience.into(),
			required_scopes: Vec::new(),
			algorithms: vec![Algorithm::RS256],
			leeway: Duration::ZERO,
		}
	}

	/// Replaces the required scopes.
	pub fn required_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the accepted algorithms.
	pub fn algorithms<I>(mut self, algorithms: I) -> Self
	where
		I: IntoIterator<Item = Algorithm>,
	{
		self.algorithms = algorithms.into_iter().collect();

		self
	}

	/// Sets the tolerated clock skew.
	pub fn leeway(mut self, leeway: Duration) -> Self {
		self.leeway = leeway;

		self
	}

	/// Consumes the builder and validates the resulting policy.
	pub fn build(self) -> Result<VerifierPolicy, VerifierPolicyError> {
		if self.issuer.trim().is_empty() {
			return Err(VerifierPolicyError::MissingIssuer);
		}
		if self.audience.trim().is_empty() {
			return Err(VerifierPolicyError::MissingAudience);
		}
		if self.algorithms.is_empty() {
			return Err(VerifierPolicyError::NoAlgorithms);
		}
		if let Some(algorithm) = self.algorithms.iter().copied().find(|alg| is_symmetric(*alg)) {
			return Err(VerifierPolicyError::SymmetricAlgorithm { algorithm });
		}
		if self.leeway.is_negative() {
			return Err(VerifierPolicyError::NegativeLeeway);
		}
		if self.leeway > MAX_LEEWAY {
			return Err(VerifierPolicyError::ExcessiveLeeway { leeway: self.leeway, max: MAX_LEEWAY });
		}

		let mut algorithms = self.algorithms;

		algorithms.dedup();

		Ok(VerifierPolicy {
			issuer: self.issuer,
			audience: self.audience,
			required_scopes: ScopeSet::new(self.required_scopes)?,
			algorithms,
			leeway: self.leeway,
		})
	}
}

fn is_symmetric(alg: Algorithm) -> bool {
	matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
