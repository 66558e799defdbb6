use std::path::Path;

/// Project a document belongs to, as far as reparsing is concerned.
pub trait ProjectContext: Send + Sync + 'static {
	/// True if files of `mime` at `file` are parsed through a projection.
	fn can_parse_projections(&self, mime: &str, file: &Path) -> bool;

	/// True while the project is reloading; parses are skipped until it settles.
	fn is_in_update(&self) -> bool;

	/// True if `file` takes part in the project build.
	fn can_build(&self, file: &Path) -> bool;
}

/// Hint attached to a project modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectChange {
	TargetFramework,
	References,
	Files,
	Other(String),
}

impl ProjectChange {
	/// Only framework and reference changes can alter how a document parses.
	pub fn affects_parsing(&self) -> bool {
		matches!(self, Self::TargetFramework | Self::References)
	}
}
