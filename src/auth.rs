//! Auth-domain identifiers, scope sets, secrets, and the verified caller identity.

pub mod id;
pub mod identity;
pub mod scope;
pub mod secret;

pub use id::*;
pub use identity::*;
pub use scope::*;
pub use secret::*;
