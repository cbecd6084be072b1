//! Strongly typed identifiers for tenants, applications, and signing keys.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $check:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				$check($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$check($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (tenant, client, key).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (tenant, client, key).
		kind: &'static str,
	},
	/// The identifier contains a character that is unsafe inside a URL path segment.
	#[error("{kind} identifier contains the disallowed character {character:?}.")]
	DisallowedCharacter {
		/// Kind of identifier (tenant, client, key).
		kind: &'static str,
		/// Offending character.
		character: char,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (tenant, client, key).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { TenantId, "Directory (tenant) identifier: a GUID or a verified domain name.", "Tenant", validate_path_segment }
def_id! { ClientId, "Application (client) identifier registered with the identity provider.", "Client", validate_view }
def_id! { KeyId, "Signing key identifier (`kid`) published in the key set.", "Key", validate_view }

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

// Tenants are interpolated into authority URLs.
fn validate_path_segment(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	validate_view(kind, view)?;

	if let Some(character) =
		view.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')))
	{
		return Err(IdentifierError::DisallowedCharacter { kind, character });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_padding_and_empty_values() {
		assert!(TenantId::new(" contoso").is_err(), "Leading whitespace must be rejected.");
		assert!(ClientId::new("client ").is_err(), "Trailing whitespace must be rejected.");
		assert!(KeyId::new("").is_err());

		let tenant = TenantId::new("contoso.onmicrosoft.com")
			.expect("Domain-style tenant fixture should be considered valid.");

		assert_eq!(tenant.as_ref(), "contoso.onmicrosoft.com");
	}

	#[test]
	fn tenant_rejects_path_separators() {
		let err = TenantId::new("contoso/../common").expect_err("Slashes must be rejected.");

		assert_eq!(err, IdentifierError::DisallowedCharacter { kind: "Tenant", character: '/' });
		assert!(TenantId::new("72f988bf-86f1-41af-91ab-2d7cd011db47").is_ok());
		assert!(KeyId::new("nOo3ZDrODXEK1jKWhXslHR_KXEg").is_ok());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let tenant: TenantId = serde_json::from_str("\"tenant-42\"")
			.expect("Tenant should deserialize successfully.");

		assert_eq!(tenant.as_ref(), "tenant-42");
		assert!(serde_json::from_str::<TenantId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<TenantId>("\"a?b\"").is_err());
	}

	#[test]
	fn length_limit_applies() {
		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		ClientId::new(&exact).expect("Exact length should succeed.");

		assert!(ClientId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)).is_err());
	}
}
