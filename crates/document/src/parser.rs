use std::path::PathBuf;

use tessera_tree::{NodeTag, NodeTree};

use crate::error::ParseError;
use crate::text::TextSnapshot;

/// Kind of a node in a document outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
	Namespace,
	Type,
	Function,
	Field,
	/// Region the parser could not make sense of.
	Error,
}

impl NodeTag for SymbolKind {
	fn is_error(self) -> bool {
		self == Self::Error
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Error,
	Warning,
	Info,
}

/// One entry of the document's error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
	pub severity: Severity,
	/// Zero-based line.
	pub line: usize,
	pub message: String,
}

/// Result of parsing one snapshot.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
	/// Buffer version of the parsed snapshot.
	pub version: u64,
	pub diagnostics: Vec<Diagnostic>,
	pub outline: NodeTree<SymbolKind>,
}

impl ParsedDocument {
	pub fn new(version: u64) -> Self {
		Self {
			version,
			..Self::default()
		}
	}

	pub fn count(&self, severity: Severity) -> usize {
		self.diagnostics.iter().filter(|d| d.severity == severity).count()
	}

	pub fn has_errors(&self) -> bool {
		self.count(Severity::Error) > 0
	}
}

/// Embedded-language view produced alongside a projected parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
	pub mime: String,
	pub text: String,
}

/// Output of [`DocumentParser::parse_projection`].
#[derive(Debug, Clone)]
pub struct ProjectedParse {
	pub document: ParsedDocument,
	pub projection: Projection,
}

/// Input handed to a parser on a worker thread.
#[derive(Debug, Clone)]
pub struct ParseRequest {
	pub file: PathBuf,
	pub snapshot: TextSnapshot,
}

/// Language service that parses document snapshots.
///
/// Calls run on the blocking pool and may take arbitrarily long; a result that
/// arrives after a newer request was issued is discarded by the caller.
pub trait DocumentParser: Send + Sync + 'static {
	fn parse_file(&self, request: &ParseRequest) -> Result<ParsedDocument, ParseError>;

	fn parse_projection(&self, request: &ParseRequest) -> Result<ProjectedParse, ParseError>;
}
