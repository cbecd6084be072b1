//! Verifies a bearer token against a live Entra ID tenant, runs the built-in claim tools for the
//! caller, and optionally performs an on-behalf-of exchange.
//!
//! Configuration comes from the variables documented in `entra_broker::settings`; the token to
//! check is read from `BEARER_TOKEN`. The exchange runs only when `ENTRA_APP_CLIENT_SECRET` is
//! set.

// std
use std::{env, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
// self
use entra_broker::{
	dispatch::{Gateway, ToolRegistry},
	settings::Settings,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let settings = Settings::from_env()?;

	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_new(settings.log_levels.directives())?)
		.init();

	let token = env::var("BEARER_TOKEN").map_err(|_| eyre!("Set BEARER_TOKEN to a user token."))?;
	let verifier = Arc::new(settings.connect_verifier().await?);
	let identity = verifier.verify(&token).await?;

	println!(
		"Verified {} (client {}).",
		identity.subject().unwrap_or("<no subject>"),
		identity.client_id().unwrap_or("<no client>")
	);

	let mut gateway = Gateway::new(verifier, ToolRegistry::with_builtin_tools());

	if settings.client_secret.is_some() {
		gateway = gateway.with_delegator(Arc::new(settings.exchanger()?));
	}

	let authorization = format!("Bearer {token}");

	for descriptor in gateway.registry().descriptors() {
		match gateway.dispatch(Some(&authorization), &descriptor.name, Value::Null).await {
			Ok(result) => println!("{}: {}", descriptor.name, serde_json::to_string_pretty(&result)?),
			Err(rejection) => println!("{}: rejected with {rejection}.", descriptor.name),
		}
	}

	if settings.client_secret.is_some() {
		let delegated = settings.exchanger()?.exchange_default(&identity).await?;

		println!(
			"Delegated token for {} expires at {}.",
			delegated.scope, delegated.expires_at
		);
	}

	Ok(())
}
