use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading, writing or processing a build log.
#[derive(Debug, Error)]
pub enum BuildLogError {
	#[error("malformed build log at event {index}: {reason}")]
	Malformed { index: usize, reason: String },
	#[error("failed to access build log {}: {error}", path.display())]
	Io {
		path: PathBuf,
		#[source]
		error: std::io::Error,
	},
	#[error("invalid build log file {}: {error}", path.display())]
	Format {
		path: PathBuf,
		#[source]
		error: serde_json::Error,
	},
	#[error("unsupported build log version {found} (expected {expected})")]
	Version { found: u32, expected: u32 },
}

pub type Result<T> = std::result::Result<T, BuildLogError>;
