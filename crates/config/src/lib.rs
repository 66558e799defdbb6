//! Configuration for tessera.
//!
//! Configuration is a TOML file with one table per pipeline. Every key is
//! optional; missing keys fall back to the defaults shown here:
//!
//! ```toml
//! [document]
//! # Coalescing window between an edit and the background reparse.
//! parse-delay-ms = 600
//!
//! [build-output]
//! # Coalescing window for log reprocessing (0 = next context drain).
//! process-delay-ms = 0
//! # Start with the full diagnostic log instead of the reduced one.
//! show-diagnostics = false
//! # Match search text case-sensitively.
//! case-sensitive-search = false
//! ```
//!
//! The default location is `$XDG_CONFIG_HOME/tessera/config.toml` (see
//! [`Config::default_path`]).

pub mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::{ConfigError, Result};
use serde::Deserialize;

/// Upper bound accepted for any coalescing delay.
pub const MAX_DELAY: Duration = Duration::from_secs(60);

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
	/// Document reparse pipeline settings.
	pub document: DocumentConfig,
	/// Build-output log pipeline settings.
	pub build_output: BuildOutputConfig,
}

/// Document reparse pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DocumentConfig {
	/// Milliseconds between the first edit of a burst and the reparse.
	pub parse_delay_ms: u64,
}

impl Default for DocumentConfig {
	fn default() -> Self {
		Self { parse_delay_ms: 600 }
	}
}

impl DocumentConfig {
	/// Parse delay as a [`Duration`].
	pub fn parse_delay(&self) -> Duration {
		Duration::from_millis(self.parse_delay_ms)
	}
}

/// Build-output log pipeline settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct BuildOutputConfig {
	/// Milliseconds to coalesce reprocessing requests; `0` means immediate.
	pub process_delay_ms: u64,
	/// Whether the view opens with diagnostic verbosity.
	pub show_diagnostics: bool,
	/// Whether search matches case-sensitively.
	pub case_sensitive_search: bool,
}

impl BuildOutputConfig {
	/// Process delay as a [`Duration`].
	pub fn process_delay(&self) -> Duration {
		Duration::from_millis(self.process_delay_ms)
	}
}

impl Config {
	/// Parses a TOML string into a validated [`Config`].
	pub fn parse(input: &str) -> Result<Self> {
		let config: Config = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads configuration from a file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
			path: path.to_path_buf(),
			error: e,
		})?;
		Self::parse(&content)
	}

	/// Default configuration file location, if a config directory is known.
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("tessera").join("config.toml"))
	}

	/// Loads the default file, or defaults when it does not exist.
	pub fn load_or_default() -> Result<Self> {
		match Self::default_path() {
			Some(path) if path.exists() => Self::load(path),
			_ => Ok(Self::default()),
		}
	}

	fn validate(&self) -> Result<()> {
		check_delay("document.parse-delay-ms", self.document.parse_delay())?;
		check_delay("build-output.process-delay-ms", self.build_output.process_delay())
	}
}

fn check_delay(key: &'static str, delay: Duration) -> Result<()> {
	if delay > MAX_DELAY {
		return Err(ConfigError::InvalidValue {
			key,
			reason: format!("{}ms exceeds the {}ms limit", delay.as_millis(), MAX_DELAY.as_millis()),
		});
	}
	Ok(())
}
