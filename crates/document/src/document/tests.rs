use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use tessera_tree::NodeTree;
use tessera_worker::UiContext;

use super::*;
use crate::parser::{ProjectedParse, SymbolKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
	Plain,
	Projected,
}

/// Parser treating every `error:`/`warning:` line as a diagnostic.
#[derive(Default)]
struct MockParser {
	calls: Mutex<Vec<(Strategy, u64)>>,
	fail: AtomicBool,
	finished: AtomicUsize,
}

impl MockParser {
	fn calls(&self) -> Vec<(Strategy, u64)> {
		self.calls.lock().unwrap().clone()
	}

	fn parse(&self, strategy: Strategy, request: &ParseRequest) -> std::result::Result<ParsedDocument, ParseError> {
		self.calls.lock().unwrap().push((strategy, request.snapshot.version()));
		let result = if self.fail.load(Ordering::SeqCst) {
			Err(ParseError::Failed {
				file: request.file.clone(),
				message: "unexpected end of input".into(),
			})
		} else {
			Ok(outline(request))
		};
		self.finished.fetch_add(1, Ordering::SeqCst);
		result
	}
}

fn outline(request: &ParseRequest) -> ParsedDocument {
	let mut parsed = ParsedDocument::new(request.snapshot.version());
	let mut tree = NodeTree::new();
	let root = tree.add_root(SymbolKind::Namespace, "file");
	for (line, text) in request.snapshot.text().lines().enumerate() {
		let severity = if text.starts_with("error:") {
			Severity::Error
		} else if text.starts_with("warning:") {
			Severity::Warning
		} else {
			tree.add_child(root, SymbolKind::Function, text);
			continue;
		};
		if severity == Severity::Error {
			tree.add_child(root, SymbolKind::Error, text);
		}
		parsed.diagnostics.push(Diagnostic {
			severity,
			line,
			message: text.to_owned(),
		});
	}
	parsed.outline = tree;
	parsed
}

impl DocumentParser for MockParser {
	fn parse_file(&self, request: &ParseRequest) -> std::result::Result<ParsedDocument, ParseError> {
		self.parse(Strategy::Plain, request)
	}

	fn parse_projection(&self, request: &ParseRequest) -> std::result::Result<ProjectedParse, ParseError> {
		Ok(ProjectedParse {
			document: self.parse(Strategy::Projected, request)?,
			projection: Projection {
				mime: "text/x-csharp".into(),
				text: request.snapshot.text(),
			},
		})
	}
}

#[derive(Default)]
struct MockProject {
	projections: bool,
	updating: AtomicBool,
}

impl ProjectContext for MockProject {
	fn can_parse_projections(&self, _mime: &str, _file: &Path) -> bool {
		self.projections
	}

	fn is_in_update(&self) -> bool {
		self.updating.load(Ordering::SeqCst)
	}

	fn can_build(&self, file: &Path) -> bool {
		file.extension().is_some_and(|ext| ext == "cs")
	}
}

struct Harness {
	ctx: UiContext<Document>,
	doc: Document,
	events: mpsc::UnboundedReceiver<DocumentEvent>,
	parser: Arc<MockParser>,
}

fn options() -> DocumentOptions {
	DocumentOptions {
		file_name: Some(PathBuf::from("Program.cs")),
		mime: "text/x-csharp".into(),
		..DocumentOptions::default()
	}
}

fn harness(options: DocumentOptions, text: &str) -> Harness {
	let ctx = UiContext::new();
	let parser = Arc::new(MockParser::default());
	let config = DocumentConfig { parse_delay_ms: 40 };
	let (doc, events) = Document::new(options, text, parser.clone(), &config, ctx.handle());
	Harness { ctx, doc, events, parser }
}

impl Harness {
	async fn settle(&mut self) {
		let Self { ctx, doc, .. } = self;
		tokio::time::timeout(Duration::from_secs(5), async {
			while doc.phase() != PipelinePhase::Idle {
				ctx.run_next(doc).await;
			}
		})
		.await
		.expect("document never went idle");
	}

	fn take_events(&mut self) -> Vec<DocumentEvent> {
		let mut out = Vec::new();
		while let Ok(event) = self.events.try_recv() {
			out.push(event);
		}
		out
	}

	async fn wait_finished(&self, n: usize) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while self.parser.finished.load(Ordering::SeqCst) < n {
				tokio::time::sleep(Duration::from_millis(1)).await;
			}
		})
		.await
		.expect("parser never finished");
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
}

#[tokio::test]
async fn default_config_debounces_edits_for_600ms() {
	let ctx = UiContext::new();
	let (doc, _events) = Document::new(options(), "", Arc::new(MockParser::default()), &DocumentConfig::default(), ctx.handle());
	assert_eq!(doc.parse_delay(), Duration::from_millis(600));
}

#[tokio::test]
async fn burst_of_edits_parses_once_at_the_latest_version() {
	let mut h = harness(options(), "");
	for i in 0..5 {
		h.doc.insert(i, "x").unwrap();
	}
	assert_eq!(h.doc.phase(), PipelinePhase::Debouncing);
	h.settle().await;

	assert_eq!(h.parser.calls(), vec![(Strategy::Plain, 5)]);
	assert!(!h.doc.is_parse_stale());
	assert_eq!(h.doc.parsed().map(|p| p.version), Some(5));
	assert_eq!(
		h.take_events(),
		vec![
			DocumentEvent::DirtyChanged { dirty: true },
			DocumentEvent::Parsed {
				version: 5,
				errors: 0,
				warnings: 0
			},
		]
	);
}

#[tokio::test]
async fn edits_invalidate_the_last_good_parse() {
	let mut h = harness(options(), "main\n");
	h.doc.reparse_now();
	h.settle().await;
	assert!(!h.doc.is_parse_stale());

	h.doc.insert(0, "// ").unwrap();
	assert!(h.doc.is_parse_stale());
	assert_eq!(h.doc.parsed().map(|p| p.version), Some(0));
}

#[tokio::test]
async fn undo_groups_defer_the_reparse_until_the_outermost_end() {
	let mut h = harness(options(), "");
	h.doc.begin_undo_group();
	h.doc.begin_undo_group();
	h.doc.insert(0, "a").unwrap();
	h.doc.end_undo_group();
	h.doc.insert(1, "b").unwrap();
	assert_eq!(h.doc.phase(), PipelinePhase::Idle);
	assert!(h.doc.is_parse_stale());

	h.doc.end_undo_group();
	assert!(!h.doc.is_in_undo_group());
	assert_eq!(h.doc.phase(), PipelinePhase::Debouncing);
	h.settle().await;
	assert_eq!(h.parser.calls(), vec![(Strategy::Plain, 2)]);

	h.doc.begin_undo_group();
	h.doc.end_undo_group();
	h.doc.end_undo_group();
	assert_eq!(h.doc.phase(), PipelinePhase::Idle);
}

#[tokio::test]
async fn focus_parses_immediately_and_absorbs_the_pending_edit() {
	let mut h = harness(options(), "");
	h.doc.insert(0, "a").unwrap();
	assert_eq!(h.doc.phase(), PipelinePhase::Debouncing);

	h.doc.on_focus_gained();
	assert_eq!(h.doc.phase(), PipelinePhase::Running);
	h.settle().await;
	tokio::time::sleep(Duration::from_millis(80)).await;
	h.ctx.drain(&mut h.doc);

	assert_eq!(h.parser.calls(), vec![(Strategy::Plain, 1)]);
}

#[tokio::test]
async fn only_framework_and_reference_changes_reparse() {
	let mut h = harness(options(), "");
	assert!(!h.doc.on_project_modified(&[ProjectChange::Files, ProjectChange::Other("Name".into())]));
	assert_eq!(h.doc.phase(), PipelinePhase::Idle);

	assert!(h.doc.on_project_modified(&[ProjectChange::Files, ProjectChange::References]));
	h.settle().await;
	assert!(h.doc.on_project_modified(&[ProjectChange::TargetFramework]));
	h.settle().await;
	assert_eq!(h.parser.calls().len(), 2);
}

#[tokio::test]
async fn documents_without_a_file_name_are_never_parsed() {
	let mut h = harness(
		DocumentOptions {
			file_name: None,
			..options()
		},
		"",
	);
	h.doc.insert(0, "a").unwrap();
	h.settle().await;
	h.doc.reparse_now();
	assert_eq!(h.doc.phase(), PipelinePhase::Idle);
	assert!(h.parser.calls().is_empty());
}

#[tokio::test]
async fn updating_project_skips_the_parse() {
	let mut h = harness(options(), "");
	let project = Arc::new(MockProject::default());
	project.updating.store(true, Ordering::SeqCst);
	h.doc.set_project(Some(project.clone()));
	assert_eq!(h.doc.phase(), PipelinePhase::Idle);

	project.updating.store(false, Ordering::SeqCst);
	h.doc.reparse_now();
	h.settle().await;
	assert_eq!(h.parser.calls(), vec![(Strategy::Plain, 0)]);
	assert!(h.doc.can_build());
}

#[tokio::test]
async fn projection_capable_projects_use_the_projected_parse() {
	let mut h = harness(options(), "@page\n");
	h.doc.set_project(Some(Arc::new(MockProject {
		projections: true,
		..MockProject::default()
	})));
	h.settle().await;

	assert_eq!(h.parser.calls(), vec![(Strategy::Projected, 0)]);
	assert_eq!(h.doc.projections().len(), 1);
	assert_eq!(h.doc.projections()[0].text, "@page\n");
}

#[tokio::test]
async fn publish_fills_the_error_list_and_expands_errors() {
	let mut h = harness(options(), "main\nerror: missing ;\nwarning: unused\n");
	h.doc.reparse_now();
	h.settle().await;

	assert_eq!(
		h.take_events(),
		vec![DocumentEvent::Parsed {
			version: 0,
			errors: 1,
			warnings: 1
		}]
	);
	assert_eq!(h.doc.diagnostics().len(), 2);
	let parsed = h.doc.parsed().unwrap().clone();
	let error = parsed.outline.search_first(None, SymbolKind::Error, "error: missing ;").unwrap();
	let function = parsed.outline.search_first(None, SymbolKind::Function, "main").unwrap();
	assert!(h.doc.outline_expanded().contains(&error));
	assert!(!h.doc.outline_expanded().contains(&function));
}

#[tokio::test]
async fn failures_are_reported_and_keep_the_previous_parse() {
	let mut h = harness(options(), "main\n");
	h.doc.reparse_now();
	h.settle().await;
	h.take_events();

	h.parser.fail.store(true, Ordering::SeqCst);
	h.doc.reparse_now();
	h.settle().await;
	assert_eq!(
		h.take_events(),
		vec![DocumentEvent::ParseFailed {
			message: "Program.cs: unexpected end of input".into()
		}]
	);
	assert_eq!(h.doc.parsed().map(|p| p.version), Some(0));
}

#[tokio::test]
async fn close_is_idempotent_and_drops_the_running_parse() {
	let mut h = harness(options(), "error: boom\n");
	h.doc.reparse_now();
	h.settle().await;
	assert_eq!(h.doc.diagnostics().len(), 1);
	h.take_events();

	h.doc.insert(0, "x").unwrap();
	assert_eq!(h.take_events(), vec![DocumentEvent::DirtyChanged { dirty: true }]);
	h.doc.reparse_now();
	assert!(h.doc.close());
	assert!(!h.doc.close());
	assert_eq!(h.doc.phase(), PipelinePhase::Idle);

	h.wait_finished(2).await;
	h.ctx.drain(&mut h.doc);
	assert_eq!(h.take_events(), vec![DocumentEvent::Closed]);
	assert!(h.doc.diagnostics().is_empty());
	assert!(h.doc.parsed().is_none());
	assert!(matches!(h.doc.insert(0, "y"), Err(DocumentError::Closed)));

	h.doc.reparse_now();
	h.doc.request_reparse();
	assert_eq!(h.ctx.pending(), 0);
}

#[tokio::test]
async fn dirty_tracking_respects_untitled_and_view_only() {
	let mut h = harness(options(), "");
	assert!(!h.doc.is_dirty());
	h.doc.insert(0, "a").unwrap();
	h.doc.insert(0, "b").unwrap();
	assert!(h.doc.is_dirty());
	h.doc.mark_saved();
	assert!(!h.doc.is_dirty());
	assert_eq!(
		h.take_events(),
		vec![DocumentEvent::DirtyChanged { dirty: true }, DocumentEvent::DirtyChanged { dirty: false }]
	);

	let mut untitled = harness(
		DocumentOptions {
			untitled: true,
			..options()
		},
		"",
	);
	assert!(untitled.doc.is_dirty());
	untitled.doc.mark_saved();
	assert!(untitled.doc.is_dirty());
	untitled.doc.mark_saved_as(PathBuf::from("Saved.cs"));
	assert!(!untitled.doc.is_dirty());
	assert_eq!(untitled.doc.file_name(), Some(Path::new("Saved.cs")));

	let mut view_only = harness(
		DocumentOptions {
			view_only: true,
			..options()
		},
		"",
	);
	view_only.doc.insert(0, "a").unwrap();
	assert!(!view_only.doc.is_dirty());
	assert!(view_only.take_events().is_empty());
}
