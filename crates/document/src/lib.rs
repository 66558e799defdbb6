//! Editor documents whose parse results are produced in the background.
//!
//! The crate supplies the [`Document`] session plus the seams it talks to:
//! a [`DocumentParser`] that runs on worker threads and an optional
//! [`ProjectContext`] that decides the parse strategy.

mod document;
mod error;
mod parser;
mod project;
mod text;

pub use document::{Document, DocumentEvent, DocumentOptions};
pub use error::{DocumentError, ParseError, Result};
pub use parser::{Diagnostic, DocumentParser, ParseRequest, ParsedDocument, ProjectedParse, Projection, Severity, SymbolKind};
pub use project::{ProjectChange, ProjectContext};
pub use text::{TextBuffer, TextSnapshot};
