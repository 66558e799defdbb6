/// Direction of a search navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
	Forward,
	Backward,
}

/// Outcome of the last search action, rendered for the search bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchStatus {
	/// No search text.
	#[default]
	Idle,
	Match {
		index: usize,
		count: usize,
		/// Set when the step crossed the end of the match sequence.
		wrapped: Option<SearchDirection>,
	},
	NotFound,
}

impl SearchStatus {
	/// Label shown next to the search entry.
	pub fn result_text(&self) -> String {
		match self {
			Self::Idle => String::new(),
			Self::Match { index, count, .. } => format!("{index} of {count}"),
			Self::NotFound => "Not found".to_owned(),
		}
	}

	/// Transient status-bar message for a wrapped step.
	pub fn wrap_message(&self) -> Option<&'static str> {
		match self {
			Self::Match {
				wrapped: Some(SearchDirection::Forward),
				..
			} => Some("Reached bottom, continued from top"),
			Self::Match {
				wrapped: Some(SearchDirection::Backward),
				..
			} => Some("Reached top, continued from bottom"),
			_ => None,
		}
	}
}
