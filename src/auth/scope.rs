//! Scope modeling: the `scp` claim, configured required scopes, and missing-scope checks.

// std
use std::collections::HashSet;
// self
use crate::_prelude::*;

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Sorted set of scope strings, deduplicated ignoring ASCII case.
///
/// Identity providers do not guarantee the casing of delegated permission names (`User.Read`
/// vs `user.read`), so both membership checks and deduplication ignore ASCII case. When several
/// spellings of one scope are supplied, the first one wins.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ScopeSet {
	scopes: Arc<[String]>,
}
impl ScopeSet {
	/// Creates a normalized scope set from any iterator.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let scopes = scopes
			.into_iter()
			.map(|scope| {
				let scope = scope.into();

				if scope.is_empty() {
					return Err(ScopeValidationError::Empty);
				}
				if scope.chars().any(char::is_whitespace) {
					return Err(ScopeValidationError::ContainsWhitespace { scope });
				}

				Ok(scope)
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { scopes: dedup_ignoring_case(scopes) })
	}

	/// Builds a set from a whitespace-delimited `scp` claim value.
	pub fn from_claim(value: &str) -> Self {
		Self { scopes: dedup_ignoring_case(value.split_whitespace().map(str::to_owned)) }
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.scopes.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns true if the set contains `scope`, ignoring ASCII case.
	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.iter().any(|candidate| candidate.eq_ignore_ascii_case(scope))
	}

	/// Returns the members of `self` that `granted` does not contain, in sorted order.
	pub fn missing_from(&self, granted: &ScopeSet) -> Vec<String> {
		self.scopes.iter().filter(|scope| !granted.contains(scope)).cloned().collect()
	}

	/// Returns the scopes as a slice.
	pub fn as_slice(&self) -> &[String] {
		&self.scopes
	}
}
impl Debug for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ScopeSet").field(&self.scopes).finish()
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.scopes.join(" "))
	}
}

/// Parses a comma-separated scope list from configuration.
///
/// Entries are trimmed, empty entries dropped, and the result lowercased, deduplicated, and
/// sorted: `"User.Read,,files.read,"` yields `["files.read", "user.read"]`.
pub fn parse_scopes(raw: &str) -> Vec<String> {
	raw.split(',')
		.map(str::trim)
		.filter(|entry| !entry.is_empty())
		.map(str::to_ascii_lowercase)
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

fn dedup_ignoring_case<I>(scopes: I) -> Arc<[String]>
where
	I: IntoIterator<Item = String>,
{
	let mut seen = HashSet::new();
	let mut kept = scopes
		.into_iter()
		.filter(|scope| seen.insert(scope.to_ascii_lowercase()))
		.collect::<Vec<_>>();

	kept.sort_unstable();

	Arc::from(kept)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parse_scopes_normalizes_configuration_lists() {
		assert_eq!(parse_scopes("User.Read,,files.read,"), vec!["files.read", "user.read"]);
		assert_eq!(parse_scopes(" a , A ,b"), vec!["a", "b"]);
		assert!(parse_scopes(" , ,").is_empty());
	}

	#[test]
	fn claim_parsing_splits_on_whitespace_and_dedups() {
		let granted = ScopeSet::from_claim("User.Read  Files.Read\tuser.read User.Read");

		assert_eq!(granted.as_slice(), ["Files.Read", "User.Read"]);
		assert!(ScopeSet::from_claim("").is_empty());
	}

	#[test]
	fn case_variants_collapse_to_the_first_spelling() {
		let required = ScopeSet::new(["Files.Read", "files.read", "FILES.READ", "User.Read"])
			.expect("Mixed-case scope fixture should be valid.");

		assert_eq!(required.len(), 2);
		assert_eq!(required.as_slice(), ["Files.Read", "User.Read"]);
		assert_eq!(required.missing_from(&ScopeSet::default()), vec!["Files.Read", "User.Read"]);
	}

	#[test]
	fn missing_from_reports_uncovered_scopes_case_insensitively() {
		let required = ScopeSet::new(parse_scopes("user.read,files.read"))
			.expect("Required scope fixture should be valid.");
		let granted = ScopeSet::from_claim("User.Read");

		assert_eq!(required.missing_from(&granted), vec!["files.read"]);
		assert!(required.missing_from(&ScopeSet::from_claim("FILES.READ user.read extra")).is_empty());
		assert!(ScopeSet::default().missing_from(&granted).is_empty());
	}

	#[test]
	fn scopes_reject_empty_and_padded_entries() {
		let err = ScopeSet::new([" profile "]).expect_err("Padded scopes must be rejected.");

		assert!(matches!(err, ScopeValidationError::ContainsWhitespace { .. }));
		assert_eq!(ScopeSet::new([""]), Err(ScopeValidationError::Empty));
		assert!(ScopeSet::new(Vec::<String>::new()).is_ok_and(|scopes| scopes.is_empty()));
	}

	#[test]
	fn display_joins_in_sorted_order() {
		let scopes = ScopeSet::new(["profile", "email"]).expect("Scope fixture should be valid.");

		assert_eq!(scopes.to_string(), "email profile");
	}
}
