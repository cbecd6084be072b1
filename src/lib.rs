//! Bearer-token verification against a rotating Entra ID key set, plus on-behalf-of delegation
//! for tool servers that call downstream APIs as the signed-in user.
//!
//! The crate is organized leaves-first:
//!
//! - [`jwks`] fetches and caches the tenant's public signing keys.
//! - [`verify`] validates inbound bearer tokens and produces a [`auth::VerifiedIdentity`].
//! - [`delegation`] exchanges a verified token for a downstream-scoped access token.
//! - [`dispatch`] is a thin, explicit tool registry that consumes verified identities.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod delegation;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod jwks;
pub mod obs;
pub mod settings;
pub mod verify;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use jsonwebtoken;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _, tracing_subscriber as _};
