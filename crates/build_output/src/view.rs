//! Build output view state and its processing pipeline.
//!
//! [`BuildOutputView`] is the state owned by a [`UiContext`](tessera_worker::UiContext).
//! Processing requests go through a zero-delay [`DebounceTrigger`] into a
//! [`TaskCoordinator`]; the processed tree is applied on the context only if
//! it belongs to the latest request. Navigation and search always operate on
//! the last published tree.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tessera_config::BuildOutputConfig;
use tessera_tree::{NodeId, NodeTree, TreeSearch};
use tessera_worker::{ContextHandle, DebounceTrigger, PipelinePhase, TaskCoordinator, TaskFailure};
use tokio::sync::mpsc;

use crate::error::BuildLogError;
use crate::kind::NodeKind;
use crate::log::BuildLog;
use crate::status::{SearchDirection, SearchStatus};

/// Label of the single path entry shown when nothing is selected.
pub const NO_SELECTION: &str = "No selection";

/// Notification for whatever presents a [`BuildOutputView`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutputEvent {
	/// A new tree replaced the previous one.
	ResultPublished { nodes: usize, errors: usize },
	/// Processing the log failed.
	Error { message: String },
	/// The view moved its selection to `node` and expanded the path to it.
	Focused { node: NodeId },
	MatchFound { node: NodeId, index: usize, count: usize },
	MatchNotFound,
	SearchWrapped { direction: SearchDirection },
	SearchCleared,
	/// The user asked to open the selected error or warning.
	TaskSelected(TaskReference),
}

/// Error or warning selected for the task list, with its owning project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReference {
	pub message: String,
	pub project: Option<String>,
}

/// One segment of the selection path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
	/// `None` for the [`NO_SELECTION`] placeholder.
	pub node: Option<NodeId>,
	pub kind: Option<NodeKind>,
	pub label: String,
}

#[derive(Debug, Clone)]
struct GoTo {
	kind: NodeKind,
	description: String,
	project: String,
}

/// State of one build output pane.
pub struct BuildOutputView {
	log: Arc<dyn BuildLog>,
	show_diagnostics: bool,
	tree: Arc<NodeTree<NodeKind>>,
	published: bool,
	search: TreeSearch<NodeKind>,
	search_text: String,
	status: SearchStatus,
	expanded: FxHashSet<NodeId>,
	selected: Option<NodeId>,
	deferred: Option<GoTo>,
	coordinator: TaskCoordinator<BuildOutputView, NodeTree<NodeKind>, BuildLogError>,
	trigger: DebounceTrigger<BuildOutputView>,
	events: mpsc::UnboundedSender<BuildOutputEvent>,
}

impl std::fmt::Debug for BuildOutputView {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BuildOutputView")
			.field("show_diagnostics", &self.show_diagnostics)
			.field("nodes", &self.tree.len())
			.field("published", &self.published)
			.field("selected", &self.selected)
			.field("status", &self.status)
			.field("coordinator", &self.coordinator)
			.finish_non_exhaustive()
	}
}

impl BuildOutputView {
	/// Creates an empty view over `log`. Nothing is processed until [`Self::load`].
	pub fn new(
		log: Arc<dyn BuildLog>, config: &BuildOutputConfig, context: ContextHandle<BuildOutputView>,
	) -> (Self, mpsc::UnboundedReceiver<BuildOutputEvent>) {
		let (events, rx) = mpsc::unbounded_channel();
		let tree = Arc::new(NodeTree::new());
		let coordinator = TaskCoordinator::new("build_output", context.clone(), Self::apply_result).on_error(Self::report_failure);
		let trigger = DebounceTrigger::new("build_output", config.process_delay(), context, Self::start_processing);

		let view = Self {
			log,
			show_diagnostics: config.show_diagnostics,
			search: TreeSearch::new(Arc::clone(&tree)).with_case_sensitive(config.case_sensitive_search),
			tree,
			published: false,
			search_text: String::new(),
			status: SearchStatus::Idle,
			expanded: FxHashSet::default(),
			selected: None,
			deferred: None,
			coordinator,
			trigger,
			events,
		};
		(view, rx)
	}

	/// Processes the log for the first time.
	pub fn load(&self) {
		self.request("load");
	}

	/// Reprocesses after the underlying log received more output.
	pub fn output_changed(&self) {
		self.request("output_changed");
	}

	/// Switches between the reduced and the diagnostic view.
	pub fn set_show_diagnostics(&mut self, show: bool) {
		if self.show_diagnostics == show {
			return;
		}
		self.show_diagnostics = show;
		self.request("show_diagnostics");
	}

	pub fn show_diagnostics(&self) -> bool {
		self.show_diagnostics
	}

	fn request(&self, reason: &'static str) {
		if self.coordinator.is_disposed() {
			return;
		}
		let armed = self.trigger.request();
		tracing::trace!(reason, armed, "build_output.request");
	}

	fn start_processing(&mut self) {
		let log = Arc::clone(&self.log);
		let show_diagnostics = self.show_diagnostics;
		if let Some(generation) = self.coordinator.schedule(move || log.process(show_diagnostics)) {
			tracing::debug!(%generation, show_diagnostics, "build_output.process");
		}
	}

	fn apply_result(&mut self, tree: NodeTree<NodeKind>) {
		let tree = Arc::new(tree);
		self.expanded = tree.error_expansion();
		self.search.reset(Arc::clone(&tree));
		self.status = SearchStatus::Idle;
		self.selected = None;
		self.tree = tree;
		self.published = true;

		let nodes = self.tree.len();
		let errors = self.tree.preorder().filter(|&id| self.tree[id].kind() == NodeKind::Error).count();
		tracing::debug!(nodes, errors, "build_output.published");
		self.emit(BuildOutputEvent::ResultPublished { nodes, errors });

		if let Some(go_to) = self.deferred.take() {
			self.resolve(&go_to);
		}
	}

	fn report_failure(&mut self, failure: TaskFailure<BuildLogError>) {
		if let Some(go_to) = self.deferred.take() {
			tracing::debug!(description = %go_to.description, "build_output.go_to_dropped");
		}
		self.emit(BuildOutputEvent::Error { message: failure.to_string() });
	}

	/// Last published tree; empty before the first publish.
	pub fn tree(&self) -> &Arc<NodeTree<NodeKind>> {
		&self.tree
	}

	/// True once at least one tree has been published.
	pub fn has_result(&self) -> bool {
		self.published
	}

	/// True while a request is waiting or processing is running.
	pub fn is_processing(&self) -> bool {
		self.trigger.is_pending() || self.coordinator.is_in_flight()
	}

	pub fn phase(&self) -> PipelinePhase {
		PipelinePhase::observe(self.trigger.is_pending(), self.coordinator.is_in_flight(), self.coordinator.is_publishing())
	}

	pub fn is_expanded(&self, node: NodeId) -> bool {
		self.expanded.contains(&node)
	}

	pub fn expanded(&self) -> &FxHashSet<NodeId> {
		&self.expanded
	}

	/// Records a user expand/collapse.
	pub fn set_expanded(&mut self, node: NodeId, expanded: bool) {
		if !self.tree.contains(node) {
			return;
		}
		if expanded {
			self.expanded.insert(node);
		} else {
			self.expanded.remove(&node);
		}
	}

	/// Focuses the error `description` reported by `project`.
	///
	/// While processing is pending the request is kept and applied right after
	/// the next publish; only the latest such request survives.
	pub fn go_to_error(&mut self, description: &str, project: &str) -> Option<NodeId> {
		self.go_to(NodeKind::Error, description, project)
	}

	pub fn go_to_warning(&mut self, description: &str, project: &str) -> Option<NodeId> {
		self.go_to(NodeKind::Warning, description, project)
	}

	pub fn go_to_message(&mut self, description: &str, project: &str) -> Option<NodeId> {
		self.go_to(NodeKind::Message, description, project)
	}

	fn go_to(&mut self, kind: NodeKind, description: &str, project: &str) -> Option<NodeId> {
		let request = GoTo {
			kind,
			description: description.to_owned(),
			project: project.to_owned(),
		};
		if !self.published || self.is_processing() {
			tracing::debug!(kind = kind.as_str(), description, project, "build_output.go_to_deferred");
			self.deferred = Some(request);
			return None;
		}
		self.resolve(&request)
	}

	fn resolve(&mut self, request: &GoTo) -> Option<NodeId> {
		let node = self
			.tree
			.search_first(None, NodeKind::Project, &request.project)
			.and_then(|project| self.tree.search_first(Some(project), request.kind, &request.description));
		match node {
			Some(node) => self.focus(node),
			None => tracing::debug!(kind = request.kind.as_str(), description = %request.description, project = %request.project, "build_output.go_to_missing"),
		}
		node
	}

	fn focus(&mut self, node: NodeId) {
		let path = self.tree.ancestors(node);
		if let Some((_, above)) = path.split_last() {
			self.expanded.extend(above.iter().copied());
		}
		self.selected = Some(node);
		self.emit(BuildOutputEvent::Focused { node });
	}

	/// Records a selection made by the user. Unknown nodes clear it.
	pub fn select(&mut self, node: Option<NodeId>) {
		self.selected = node.filter(|&id| self.tree.contains(id));
	}

	pub fn selected(&self) -> Option<NodeId> {
		self.selected
	}

	/// Path from the root to the selection, or the [`NO_SELECTION`] placeholder.
	pub fn path_entries(&self) -> Vec<PathEntry> {
		let Some(selected) = self.selected else {
			return vec![PathEntry {
				node: None,
				kind: None,
				label: NO_SELECTION.to_owned(),
			}];
		};
		self.tree
			.ancestors(selected)
			.into_iter()
			.map(|id| PathEntry {
				node: Some(id),
				kind: Some(self.tree[id].kind()),
				label: self.tree[id].message().to_owned(),
			})
			.collect()
	}

	/// Alternatives offered for path entry `index`: the entry's siblings, or the
	/// roots for a root entry or the placeholder.
	pub fn path_siblings(&self, index: usize) -> Vec<NodeId> {
		match self.path_entries().get(index) {
			None => Vec::new(),
			Some(PathEntry { node: None, .. }) => self.tree.roots().to_vec(),
			Some(PathEntry { node: Some(node), .. }) => self.tree.siblings(*node).to_vec(),
		}
	}

	/// Focuses the node behind path entry `index`.
	pub fn activate_path_entry(&mut self, index: usize) -> Option<NodeId> {
		let node = self.path_entries().get(index)?.node?;
		self.focus(node);
		Some(node)
	}

	/// Focuses `node`, e.g. one picked from [`Self::path_siblings`].
	pub fn activate_node(&mut self, node: NodeId) -> bool {
		if !self.tree.contains(node) {
			return false;
		}
		self.focus(node);
		true
	}

	/// The selected error or warning with its owning project.
	pub fn selected_task(&self) -> Option<TaskReference> {
		let selected = self.selected?;
		let node = &self.tree[selected];
		if !node.kind().is_task_entry() {
			return None;
		}
		let project = self.tree.inverse_search_first(selected, NodeKind::Project);
		Some(TaskReference {
			message: node.message().to_owned(),
			project: project.map(|id| self.tree[id].message().to_owned()),
		})
	}

	/// Emits [`BuildOutputEvent::TaskSelected`] for the selected error or warning.
	pub fn jump_to_selected_task(&self) -> bool {
		let Some(task) = self.selected_task() else {
			return false;
		};
		self.emit(BuildOutputEvent::TaskSelected(task));
		true
	}

	/// Starts a new search for `text` over the published tree.
	pub fn find_first(&mut self, text: &str) -> Option<NodeId> {
		self.search_text = text.to_owned();
		let found = self.search.first_match(text);
		self.report_search(found, None)
	}

	pub fn find_next(&mut self) -> Option<NodeId> {
		self.step(SearchDirection::Forward)
	}

	pub fn find_previous(&mut self) -> Option<NodeId> {
		self.step(SearchDirection::Backward)
	}

	fn step(&mut self, direction: SearchDirection) -> Option<NodeId> {
		if !self.search.is_active() && !self.search_text.is_empty() {
			// The tree was replaced since the last query: start over on the new one.
			let found = self.search.first_match(&self.search_text);
			return self.report_search(found, None);
		}
		let found = match direction {
			SearchDirection::Forward => self.search.next_match(),
			SearchDirection::Backward => self.search.previous_match(),
		};
		let wrapped = self.search.search_wrapped().then_some(direction);
		self.report_search(found, wrapped)
	}

	fn report_search(&mut self, found: Option<NodeId>, wrapped: Option<SearchDirection>) -> Option<NodeId> {
		match found {
			Some(node) => {
				let index = self.search.current_absolute_match_index();
				let count = self.search.matches_count();
				self.status = SearchStatus::Match { index, count, wrapped };
				self.focus(node);
				self.emit(BuildOutputEvent::MatchFound { node, index, count });
				if let Some(direction) = wrapped {
					self.emit(BuildOutputEvent::SearchWrapped { direction });
				}
			}
			None if self.search_text.is_empty() => {
				self.status = SearchStatus::Idle;
				self.emit(BuildOutputEvent::SearchCleared);
			}
			None => {
				self.status = SearchStatus::NotFound;
				self.emit(BuildOutputEvent::MatchNotFound);
			}
		}
		found
	}

	pub fn set_case_sensitive_search(&mut self, case_sensitive: bool) {
		self.search.set_case_sensitive(case_sensitive);
	}

	pub fn search_text(&self) -> &str {
		&self.search_text
	}

	pub fn search_status(&self) -> SearchStatus {
		self.status
	}

	/// True while the last search step landed on a match.
	pub fn is_search_in_progress(&self) -> bool {
		matches!(self.status, SearchStatus::Match { .. })
	}

	/// Stops processing for good. Idempotent.
	pub fn dispose(&mut self) {
		if self.coordinator.is_disposed() {
			return;
		}
		self.trigger.cancel_pending();
		self.coordinator.dispose();
		self.deferred = None;
		tracing::debug!("build_output.disposed");
	}

	pub fn is_disposed(&self) -> bool {
		self.coordinator.is_disposed()
	}

	fn emit(&self, event: BuildOutputEvent) {
		if self.events.send(event).is_err() {
			tracing::trace!("build_output.event_dropped");
		}
	}
}
