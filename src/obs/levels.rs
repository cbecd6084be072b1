// self
use crate::_prelude::*;

/// Error returned when a log level name is not recognized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Log level `{0}` is not one of trace, debug, info, warn, error.")]
pub struct LogLevelError(pub String);

/// Verbosity for one component.
#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	/// Most verbose.
	Trace,
	/// Diagnostic detail.
	Debug,
	/// Normal operation.
	#[default]
	Info,
	/// Recoverable problems.
	Warn,
	/// Failures only.
	Error,
}
impl LogLevel {
	/// Returns the filter directive spelling.
	pub const fn as_str(self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
		}
	}
}
impl Display for LogLevel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for LogLevel {
	type Err = LogLevelError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"trace" => Ok(Self::Trace),
			"debug" => Ok(Self::Debug),
			"info" => Ok(Self::Info),
			"warn" | "warning" => Ok(Self::Warn),
			"error" | "critical" => Ok(Self::Error),
			_ => Err(LogLevelError(s.to_owned())),
		}
	}
}

/// Per-component verbosity: the application default plus optional overrides for the auth
/// components and the tool server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLevels {
	/// Level for everything without an override.
	pub app: LogLevel,
	/// Level for key discovery, verification, and delegation; defaults to `app`.
	pub auth: Option<LogLevel>,
	/// Level for tool dispatch; defaults to `app`.
	pub server: Option<LogLevel>,
}
impl LogLevels {
	/// Effective level for the auth components.
	pub fn auth_level(&self) -> LogLevel {
		self.auth.unwrap_or(self.app)
	}

	/// Effective level for tool dispatch.
	pub fn server_level(&self) -> LogLevel {
		self.server.unwrap_or(self.app)
	}

	/// Most verbose of the configured levels.
	pub fn most_verbose(&self) -> LogLevel {
		self.app.min(self.auth_level()).min(self.server_level())
	}

	/// Renders an `EnvFilter`-compatible directive string.
	pub fn directives(&self) -> String {
		format!(
			"{},entra_broker={},entra_broker::dispatch={}",
			self.app,
			self.auth_level(),
			self.server_level()
		)
	}
}
