//! Editor document session.
//!
//! A [`Document`] owns the text buffer and the last good parse, and lives on a
//! [`UiContext`](tessera_worker::UiContext). Text edits arm a debounce window;
//! focus, project and explicit requests parse right away. Either way the parse
//! runs on the blocking pool and only the newest one is applied.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashSet;
use tessera_config::DocumentConfig;
use tessera_tree::NodeId;
use tessera_worker::{ContextHandle, DebounceTrigger, PipelinePhase, TaskCoordinator, TaskFailure};
use tokio::sync::mpsc;

use crate::error::{DocumentError, ParseError, Result};
use crate::parser::{Diagnostic, DocumentParser, ParseRequest, ParsedDocument, Projection, Severity};
use crate::project::{ProjectChange, ProjectContext};
use crate::text::{TextBuffer, TextSnapshot};

/// Notification for whatever presents a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
	/// A parse result was applied.
	Parsed { version: u64, errors: usize, warnings: usize },
	ParseFailed { message: String },
	DirtyChanged { dirty: bool },
	/// Emitted once, by the first [`Document::close`].
	Closed,
}

/// How a document was opened.
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
	/// Backing file; documents without one are never parsed.
	pub file_name: Option<PathBuf>,
	/// Not yet saved under a real name. Untitled documents count as dirty.
	pub untitled: bool,
	/// Read-only view; never dirty.
	pub view_only: bool,
	pub mime: String,
}

enum ParseOutcome {
	Plain(ParsedDocument),
	Projected(ParsedDocument, Projection),
}

/// One open document.
pub struct Document {
	file_name: Option<PathBuf>,
	untitled: bool,
	view_only: bool,
	buffer: TextBuffer,
	dirty: bool,
	parser: Arc<dyn DocumentParser>,
	project: Option<Arc<dyn ProjectContext>>,
	parsed: Option<Arc<ParsedDocument>>,
	parse_stale: bool,
	projections: Vec<Projection>,
	error_list: Vec<Diagnostic>,
	outline_expanded: FxHashSet<NodeId>,
	undo_depth: u32,
	edited_in_group: bool,
	closed: bool,
	coordinator: TaskCoordinator<Document, ParseOutcome, ParseError>,
	trigger: DebounceTrigger<Document>,
	events: mpsc::UnboundedSender<DocumentEvent>,
}

impl std::fmt::Debug for Document {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Document")
			.field("file_name", &self.file_name)
			.field("version", &self.buffer.version())
			.field("dirty", &self.dirty)
			.field("parse_stale", &self.parse_stale)
			.field("closed", &self.closed)
			.field("coordinator", &self.coordinator)
			.finish_non_exhaustive()
	}
}

impl Document {
	pub fn new(
		options: DocumentOptions, text: &str, parser: Arc<dyn DocumentParser>, config: &DocumentConfig, context: ContextHandle<Document>,
	) -> (Self, mpsc::UnboundedReceiver<DocumentEvent>) {
		let (events, rx) = mpsc::unbounded_channel();
		let coordinator = TaskCoordinator::new("document", context.clone(), Self::apply_parse).on_error(Self::report_parse_failure);
		let trigger = DebounceTrigger::new("document", config.parse_delay(), context, Self::on_debounce_fired);

		let document = Self {
			file_name: options.file_name,
			untitled: options.untitled,
			view_only: options.view_only,
			buffer: TextBuffer::new(text, options.mime),
			dirty: false,
			parser,
			project: None,
			parsed: None,
			parse_stale: true,
			projections: Vec::new(),
			error_list: Vec::new(),
			outline_expanded: FxHashSet::default(),
			undo_depth: 0,
			edited_in_group: false,
			closed: false,
			coordinator,
			trigger,
			events,
		};
		(document, rx)
	}

	pub fn file_name(&self) -> Option<&Path> {
		self.file_name.as_deref()
	}

	pub fn text(&self) -> String {
		self.buffer.text()
	}

	pub fn version(&self) -> u64 {
		self.buffer.version()
	}

	pub fn snapshot(&self) -> TextSnapshot {
		self.buffer.snapshot()
	}

	/// Debounce window applied to text edits.
	pub fn parse_delay(&self) -> Duration {
		self.trigger.delay()
	}

	pub fn insert(&mut self, at: usize, text: &str) -> Result<()> {
		self.ensure_open()?;
		self.buffer.insert(at, text)?;
		self.text_changed();
		Ok(())
	}

	pub fn delete(&mut self, range: Range<usize>) -> Result<()> {
		self.ensure_open()?;
		self.buffer.remove(range)?;
		self.text_changed();
		Ok(())
	}

	pub fn replace(&mut self, range: Range<usize>, text: &str) -> Result<()> {
		self.ensure_open()?;
		self.buffer.replace(range, text)?;
		self.text_changed();
		Ok(())
	}

	fn ensure_open(&self) -> Result<()> {
		if self.closed {
			return Err(DocumentError::Closed);
		}
		Ok(())
	}

	fn text_changed(&mut self) {
		self.parse_stale = true;
		self.set_dirty(true);
		if self.undo_depth > 0 {
			self.edited_in_group = true;
		} else {
			self.request_reparse();
		}
	}

	/// Opens an atomic undo group. Groups nest; edits inside them reparse once
	/// the outermost group ends.
	pub fn begin_undo_group(&mut self) {
		if self.undo_depth == 0 {
			self.edited_in_group = false;
		}
		self.undo_depth += 1;
	}

	pub fn end_undo_group(&mut self) {
		let Some(depth) = self.undo_depth.checked_sub(1) else {
			tracing::warn!("document.unbalanced_undo_group");
			return;
		};
		self.undo_depth = depth;
		if depth == 0 && std::mem::take(&mut self.edited_in_group) {
			self.request_reparse();
		}
	}

	pub fn is_in_undo_group(&self) -> bool {
		self.undo_depth > 0
	}

	/// Arms the debounced reparse used for text edits.
	pub fn request_reparse(&self) {
		if self.closed {
			return;
		}
		let armed = self.trigger.request();
		tracing::trace!(armed, version = self.buffer.version(), "document.reparse_requested");
	}

	/// Reparses immediately, superseding any pending or running parse.
	pub fn reparse_now(&mut self) {
		self.reparse_immediately("explicit");
	}

	/// The editor showing this document became active.
	pub fn on_focus_gained(&mut self) {
		self.reparse_immediately("focus");
	}

	/// Attaches or detaches the owning project and reparses against it.
	pub fn set_project(&mut self, project: Option<Arc<dyn ProjectContext>>) {
		self.project = project;
		self.reparse_immediately("project_attached");
	}

	/// Reacts to a project modification. Returns true if it caused a reparse.
	pub fn on_project_modified(&mut self, changes: &[ProjectChange]) -> bool {
		if !changes.iter().any(ProjectChange::affects_parsing) {
			return false;
		}
		self.reparse_immediately("project_modified");
		true
	}

	fn reparse_immediately(&mut self, reason: &'static str) {
		if self.closed {
			return;
		}
		self.trigger.cancel_pending();
		self.schedule_parse(reason);
	}

	fn on_debounce_fired(&mut self) {
		self.schedule_parse("edit");
	}

	fn schedule_parse(&mut self, reason: &'static str) {
		if self.closed {
			return;
		}
		let Some(file) = self.file_name.clone() else {
			tracing::trace!(reason, "document.parse_skipped_no_file");
			return;
		};
		if self.project.as_ref().is_some_and(|project| project.is_in_update()) {
			tracing::debug!(reason, file = %file.display(), "document.parse_skipped_project_updating");
			return;
		}

		let snapshot = self.buffer.snapshot();
		let projected = self.project.as_ref().is_some_and(|project| project.can_parse_projections(snapshot.mime(), &file));
		let version = snapshot.version();
		let parser = Arc::clone(&self.parser);
		let request = ParseRequest { file, snapshot };

		let scheduled = self.coordinator.schedule(move || {
			if projected {
				parser.parse_projection(&request).map(|parse| ParseOutcome::Projected(parse.document, parse.projection))
			} else {
				parser.parse_file(&request).map(ParseOutcome::Plain)
			}
		});
		if let Some(generation) = scheduled {
			tracing::debug!(reason, %generation, version, projected, "document.parse_scheduled");
		}
	}

	fn apply_parse(&mut self, outcome: ParseOutcome) {
		let document = match outcome {
			ParseOutcome::Plain(document) => document,
			ParseOutcome::Projected(document, projection) => {
				self.projections = vec![projection];
				document
			}
		};

		let version = document.version;
		let errors = document.count(Severity::Error);
		let warnings = document.count(Severity::Warning);
		self.parse_stale = version != self.buffer.version();
		self.outline_expanded = document.outline.error_expansion();
		self.error_list.clone_from(&document.diagnostics);
		self.parsed = Some(Arc::new(document));

		tracing::debug!(version, errors, warnings, stale = self.parse_stale, "document.parsed");
		self.emit(DocumentEvent::Parsed { version, errors, warnings });
	}

	fn report_parse_failure(&mut self, failure: TaskFailure<ParseError>) {
		tracing::debug!(file = ?self.file_name, error = %failure, "document.parse_failed");
		self.emit(DocumentEvent::ParseFailed { message: failure.to_string() });
	}

	/// Last successfully applied parse, kept across edits until replaced.
	pub fn parsed(&self) -> Option<&Arc<ParsedDocument>> {
		self.parsed.as_ref()
	}

	/// True if the text changed since [`Self::parsed`] was produced.
	pub fn is_parse_stale(&self) -> bool {
		self.parse_stale
	}

	pub fn projections(&self) -> &[Projection] {
		&self.projections
	}

	/// Diagnostics currently published to the error list.
	pub fn diagnostics(&self) -> &[Diagnostic] {
		&self.error_list
	}

	/// Outline nodes to show expanded: roots and paths to errors.
	pub fn outline_expanded(&self) -> &FxHashSet<NodeId> {
		&self.outline_expanded
	}

	pub fn project(&self) -> Option<&Arc<dyn ProjectContext>> {
		self.project.as_ref()
	}

	/// True if the document's file takes part in its project's build.
	pub fn can_build(&self) -> bool {
		match (&self.project, &self.file_name) {
			(Some(project), Some(file)) => project.can_build(file),
			_ => false,
		}
	}

	pub fn is_dirty(&self) -> bool {
		!self.view_only && (self.untitled || self.dirty)
	}

	fn set_dirty(&mut self, dirty: bool) {
		let before = self.is_dirty();
		self.dirty = dirty;
		let after = self.is_dirty();
		if before != after {
			self.emit(DocumentEvent::DirtyChanged { dirty: after });
		}
	}

	/// Records that the text was written to `file_name`.
	pub fn mark_saved(&mut self) {
		self.set_dirty(false);
	}

	/// Records a save under a new name; the document stops being untitled.
	pub fn mark_saved_as(&mut self, file_name: PathBuf) {
		self.file_name = Some(file_name);
		let before = self.is_dirty();
		self.untitled = false;
		self.dirty = false;
		if before {
			self.emit(DocumentEvent::DirtyChanged { dirty: false });
		}
	}

	pub fn phase(&self) -> PipelinePhase {
		PipelinePhase::observe(self.trigger.is_pending(), self.coordinator.is_in_flight(), self.coordinator.is_publishing())
	}

	/// Ends the session: cancels pending and running parses and clears the
	/// error list. Returns false if the document was already closed.
	pub fn close(&mut self) -> bool {
		if std::mem::replace(&mut self.closed, true) {
			return false;
		}
		self.trigger.cancel_pending();
		self.coordinator.dispose();
		self.error_list.clear();
		self.outline_expanded.clear();
		self.projections.clear();
		self.parsed = None;
		tracing::debug!(file = ?self.file_name, "document.closed");
		self.emit(DocumentEvent::Closed);
		true
	}

	pub fn is_closed(&self) -> bool {
		self.closed
	}

	fn emit(&self, event: DocumentEvent) {
		if self.events.send(event).is_err() {
			tracing::trace!("document.event_dropped");
		}
	}
}

#[cfg(test)]
mod tests;
