use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by document operations.
#[derive(Debug, Error)]
pub enum DocumentError {
	#[error("document is closed")]
	Closed,
	#[error("invalid edit: {0}")]
	Edit(#[from] ropey::Error),
}

/// Failure reported by a [`DocumentParser`](crate::DocumentParser).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("no parser for {mime}")]
	Unsupported { mime: String },
	#[error("{}: {message}", file.display())]
	Failed { file: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, DocumentError>;
