//! Build-log sources and the recorded log format.
//!
//! A [`BuildLog`] turns whatever it has recorded so far into a fresh
//! [`NodeTree`]. Processing is pure with respect to the view: it runs on a
//! blocking worker and hands back an owned tree.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tessera_tree::{NodeId, NodeTree};

use crate::error::{BuildLogError, Result};
use crate::kind::NodeKind;

/// File extension enforced by [`RecordedBuildLog::save`].
pub const EXTENSION: &str = "buildlog";

const FORMAT_VERSION: u32 = 1;

/// Source of build output that can be processed into a node tree.
pub trait BuildLog: Send + Sync + 'static {
	/// Builds the tree for the current log contents.
	///
	/// With `show_diagnostics` false, targets and tasks are folded into their
	/// enclosing node and low-importance messages are dropped.
	fn process(&self, show_diagnostics: bool) -> Result<NodeTree<NodeKind>>;
}

/// Importance attached to a build message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageImportance {
	High,
	#[default]
	Normal,
	Low,
}

/// One recorded build event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BuildEvent {
	BuildStarted {
		message: String,
	},
	BuildFinished {
		message: String,
	},
	ProjectStarted {
		project: String,
	},
	ProjectFinished {
		project: String,
	},
	TargetStarted {
		target: String,
	},
	TargetFinished {
		target: String,
	},
	TaskStarted {
		task: String,
	},
	TaskFinished {
		task: String,
	},
	Message {
		text: String,
		#[serde(default)]
		importance: MessageImportance,
	},
	Warning {
		text: String,
	},
	Error {
		text: String,
	},
}

impl BuildEvent {
	pub fn message(text: impl Into<String>, importance: MessageImportance) -> Self {
		Self::Message {
			text: text.into(),
			importance,
		}
	}
}

#[derive(Serialize)]
struct LogFileRef<'a> {
	version: u32,
	events: &'a [BuildEvent],
}

#[derive(Deserialize)]
struct LogFile {
	version: u32,
	events: Vec<BuildEvent>,
}

/// In-memory build log that can grow while a build runs and round-trips
/// through a `.buildlog` JSON file.
#[derive(Debug, Default)]
pub struct RecordedBuildLog {
	events: RwLock<Vec<BuildEvent>>,
}

impl RecordedBuildLog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_events(events: Vec<BuildEvent>) -> Self {
		Self {
			events: RwLock::new(events),
		}
	}

	/// Appends an event. Views pick it up on their next processing pass.
	pub fn push(&self, event: BuildEvent) {
		self.events.write().push(event);
	}

	pub fn extend(&self, events: impl IntoIterator<Item = BuildEvent>) {
		self.events.write().extend(events);
	}

	pub fn len(&self) -> usize {
		self.events.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.read().is_empty()
	}

	/// Copy of the recorded events.
	pub fn snapshot(&self) -> Vec<BuildEvent> {
		self.events.read().clone()
	}

	/// Reads a log written by [`Self::save`].
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let bytes = std::fs::read(path).map_err(|error| BuildLogError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let file: LogFile = serde_json::from_slice(&bytes).map_err(|error| BuildLogError::Format {
			path: path.to_path_buf(),
			error,
		})?;
		if file.version != FORMAT_VERSION {
			return Err(BuildLogError::Version {
				found: file.version,
				expected: FORMAT_VERSION,
			});
		}
		tracing::debug!(path = %path.display(), events = file.events.len(), "build_log.loaded");
		Ok(Self::from_events(file.events))
	}

	/// Writes the log as JSON, appending the `.buildlog` extension when the
	/// path does not already carry it. Returns the path actually written.
	pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
		let path = with_log_extension(path.as_ref());
		let events = self.events.read();
		let bytes = serde_json::to_vec_pretty(&LogFileRef {
			version: FORMAT_VERSION,
			events: &events,
		})
		.map_err(|error| BuildLogError::Format { path: path.clone(), error })?;
		std::fs::write(&path, bytes).map_err(|error| BuildLogError::Io { path: path.clone(), error })?;
		tracing::debug!(path = %path.display(), events = events.len(), "build_log.saved");
		Ok(path)
	}
}

impl BuildLog for RecordedBuildLog {
	fn process(&self, show_diagnostics: bool) -> Result<NodeTree<NodeKind>> {
		let events = self.events.read();
		let tree = build_tree(&events, show_diagnostics)?;
		tracing::debug!(events = events.len(), nodes = tree.len(), show_diagnostics, "build_log.processed");
		Ok(tree)
	}
}

/// `path` with the `.buildlog` extension appended unless already present.
pub fn with_log_extension(path: &Path) -> PathBuf {
	if path.extension().is_some_and(|ext| ext == EXTENSION) {
		return path.to_path_buf();
	}
	let mut name = OsString::from(path.as_os_str());
	name.push(".");
	name.push(EXTENSION);
	PathBuf::from(name)
}

struct Frame<'a> {
	kind: NodeKind,
	name: &'a str,
	/// `None` when the container is folded away in the reduced view.
	node: Option<NodeId>,
}

fn build_tree(events: &[BuildEvent], show_diagnostics: bool) -> Result<NodeTree<NodeKind>> {
	let mut tree = NodeTree::new();
	let mut open: Vec<Frame<'_>> = Vec::new();

	for (index, event) in events.iter().enumerate() {
		match event {
			BuildEvent::BuildStarted { message } | BuildEvent::BuildFinished { message } => {
				tree.add_root(NodeKind::Build, message.as_str());
			}
			BuildEvent::ProjectStarted { project } => open_frame(&mut tree, &mut open, NodeKind::Project, project, true),
			BuildEvent::TargetStarted { target } => open_frame(&mut tree, &mut open, NodeKind::Target, target, show_diagnostics),
			BuildEvent::TaskStarted { task } => open_frame(&mut tree, &mut open, NodeKind::Task, task, show_diagnostics),
			BuildEvent::ProjectFinished { project } => close_frame(&mut open, index, NodeKind::Project, project)?,
			BuildEvent::TargetFinished { target } => close_frame(&mut open, index, NodeKind::Target, target)?,
			BuildEvent::TaskFinished { task } => close_frame(&mut open, index, NodeKind::Task, task)?,
			BuildEvent::Message { text, importance } => {
				let kind = match importance {
					MessageImportance::Low if !show_diagnostics => continue,
					MessageImportance::Low => NodeKind::Diagnostics,
					MessageImportance::Normal | MessageImportance::High => NodeKind::Message,
				};
				attach(&mut tree, &open, kind, text);
			}
			BuildEvent::Warning { text } => {
				attach(&mut tree, &open, NodeKind::Warning, text);
			}
			BuildEvent::Error { text } => {
				attach(&mut tree, &open, NodeKind::Error, text);
			}
		}
	}

	if let Some(frame) = open.last() {
		tracing::trace!(open = open.len(), innermost = %frame.name, "build_log.in_progress");
	}
	Ok(tree)
}

fn attach(tree: &mut NodeTree<NodeKind>, open: &[Frame<'_>], kind: NodeKind, message: &str) -> NodeId {
	match open.iter().rev().find_map(|frame| frame.node) {
		Some(parent) => tree.add_child(parent, kind, message),
		None => tree.add_root(kind, message),
	}
}

fn open_frame<'a>(tree: &mut NodeTree<NodeKind>, open: &mut Vec<Frame<'a>>, kind: NodeKind, name: &'a str, visible: bool) {
	let node = visible.then(|| attach(tree, open, kind, name));
	open.push(Frame { kind, name, node });
}

fn close_frame(open: &mut Vec<Frame<'_>>, index: usize, kind: NodeKind, name: &str) -> Result<()> {
	match open.last() {
		Some(top) if top.kind == kind && top.name == name => {
			open.pop();
			Ok(())
		}
		Some(top) => Err(BuildLogError::Malformed {
			index,
			reason: format!("{} `{name}` finished while {} `{}` is open", kind.as_str(), top.kind.as_str(), top.name),
		}),
		None => Err(BuildLogError::Malformed {
			index,
			reason: format!("{} `{name}` finished but was never started", kind.as_str()),
		}),
	}
}
