use serde::{Deserialize, Serialize};
use tessera_tree::NodeTag;

/// Kind of a build-output tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
	Build,
	Project,
	Target,
	Task,
	Error,
	Warning,
	Message,
	/// Low-importance message, only present in the diagnostic view.
	Diagnostics,
}

impl NodeKind {
	/// Kinds that can be opened as an entry of the task list.
	pub const fn is_task_entry(self) -> bool {
		matches!(self, Self::Error | Self::Warning)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Build => "build",
			Self::Project => "project",
			Self::Target => "target",
			Self::Task => "task",
			Self::Error => "error",
			Self::Warning => "warning",
			Self::Message => "message",
			Self::Diagnostics => "diagnostics",
		}
	}
}

impl NodeTag for NodeKind {
	fn is_error(self) -> bool {
		self == Self::Error
	}
}
